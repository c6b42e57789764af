use std::{collections::BTreeSet, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use notas_auth::{CredentialStore, OpaqueToken, Principal, Role, StoreError};
use notas_core::{EmailAddress, UserId};

use super::is_unique_violation;

const SELECT_USER: &str = "SELECT id, email, password_hash, enabled, roles, \
    verification_token, verification_expires_at, reset_token, reset_expires_at, created_at \
    FROM users";

/// Credential store over the `users` table.
///
/// One-shot token operations are single conditional `UPDATE` statements, so
/// two requests racing on the same token cannot both succeed.
#[derive(Clone)]
pub struct PostgresCredentialStore {
    pool: Arc<PgPool>,
}

impl PostgresCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    async fn fetch_one_where(&self, clause: &str, value: &str) -> Result<Option<Principal>, StoreError> {
        let row = sqlx::query(&format!("{SELECT_USER} WHERE {clause} = $1"))
            .bind(value)
            .fetch_optional(&*self.pool)
            .await
            .map_err(unavailable)?;
        row.as_ref().map(principal_from_row).transpose()
    }
}

fn unavailable(err: sqlx::Error) -> StoreError {
    tracing::error!(error = %err, "credential store query failed");
    StoreError::Unavailable(err.to_string())
}

fn principal_from_row(row: &PgRow) -> Result<Principal, StoreError> {
    let get_err = |e: sqlx::Error| StoreError::Unavailable(format!("bad users row: {e}"));

    let email: String = row.try_get("email").map_err(get_err)?;
    let email = EmailAddress::parse(&email)
        .map_err(|e| StoreError::Unavailable(format!("bad stored email: {e}")))?;

    let role_names: Vec<String> = row.try_get("roles").map_err(get_err)?;
    let roles = role_names
        .iter()
        .filter_map(|r| match r.parse::<Role>() {
            Ok(role) => Some(role),
            Err(_) => {
                tracing::warn!(role = %r, "ignoring unknown stored role");
                None
            }
        })
        .collect::<BTreeSet<_>>();

    let token = |value: &str, expires: &str| -> Result<Option<OpaqueToken>, StoreError> {
        let value: Option<String> = row.try_get(value).map_err(get_err)?;
        let expires: Option<DateTime<Utc>> = row.try_get(expires).map_err(get_err)?;
        Ok(match (value, expires) {
            (Some(value), Some(expires_at)) => Some(OpaqueToken { value, expires_at }),
            _ => None,
        })
    };

    Ok(Principal {
        id: UserId::from_uuid(row.try_get::<Uuid, _>("id").map_err(get_err)?),
        email,
        password_hash: row.try_get("password_hash").map_err(get_err)?,
        enabled: row.try_get("enabled").map_err(get_err)?,
        roles,
        verification: token("verification_token", "verification_expires_at")?,
        password_reset: token("reset_token", "reset_expires_at")?,
        created_at: row.try_get("created_at").map_err(get_err)?,
    })
}

#[async_trait]
impl CredentialStore for PostgresCredentialStore {
    async fn find_by_email(&self, email: &EmailAddress) -> Result<Option<Principal>, StoreError> {
        self.fetch_one_where("email", email.as_str()).await
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<Principal>, StoreError> {
        let row = sqlx::query(&format!("{SELECT_USER} WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(unavailable)?;
        row.as_ref().map(principal_from_row).transpose()
    }

    async fn find_by_verification_token(&self, token: &str) -> Result<Option<Principal>, StoreError> {
        self.fetch_one_where("verification_token", token).await
    }

    async fn find_by_reset_token(&self, token: &str) -> Result<Option<Principal>, StoreError> {
        self.fetch_one_where("reset_token", token).await
    }

    async fn list(&self) -> Result<Vec<Principal>, StoreError> {
        let rows = sqlx::query(&format!("{SELECT_USER} ORDER BY created_at"))
            .fetch_all(&*self.pool)
            .await
            .map_err(unavailable)?;
        rows.iter().map(principal_from_row).collect()
    }

    async fn insert(&self, principal: Principal) -> Result<(), StoreError> {
        let roles: Vec<String> = principal.roles.iter().map(|r| r.as_str().to_string()).collect();
        let (v_token, v_expires) = split_token(principal.verification);
        let (r_token, r_expires) = split_token(principal.password_reset);

        let result = sqlx::query(
            r#"
            INSERT INTO users (id, email, password_hash, enabled, roles,
                               verification_token, verification_expires_at,
                               reset_token, reset_expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(principal.id.as_uuid())
        .bind(principal.email.as_str())
        .bind(&principal.password_hash)
        .bind(principal.enabled)
        .bind(&roles)
        .bind(v_token)
        .bind(v_expires)
        .bind(r_token)
        .bind(r_expires)
        .bind(principal.created_at)
        .execute(&*self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(StoreError::DuplicateEmail(principal.email.to_string())),
            Err(e) => Err(unavailable(e)),
        }
    }

    async fn delete(&self, id: UserId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(unavailable)?;
        Ok(result.rows_affected() == 1)
    }

    async fn complete_verification(
        &self,
        id: UserId,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE users
               SET enabled = TRUE, verification_token = NULL, verification_expires_at = NULL
             WHERE id = $1 AND verification_token = $2 AND verification_expires_at >= $3
            "#,
        )
        .bind(id.as_uuid())
        .bind(token)
        .bind(now)
        .execute(&*self.pool)
        .await
        .map_err(unavailable)?;
        Ok(result.rows_affected() == 1)
    }

    async fn replace_verification_token(&self, id: UserId, token: OpaqueToken) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE users
               SET verification_token = $2, verification_expires_at = $3
             WHERE id = $1 AND enabled = FALSE
            "#,
        )
        .bind(id.as_uuid())
        .bind(&token.value)
        .bind(token.expires_at)
        .execute(&*self.pool)
        .await
        .map_err(unavailable)?;
        Ok(result.rows_affected() == 1)
    }

    async fn replace_password_reset_token(&self, id: UserId, token: OpaqueToken) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE users SET reset_token = $2, reset_expires_at = $3 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(&token.value)
            .bind(token.expires_at)
            .execute(&*self.pool)
            .await
            .map_err(unavailable)?;
        Ok(result.rows_affected() == 1)
    }

    async fn complete_password_reset(
        &self,
        id: UserId,
        token: &str,
        new_hash: String,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE users
               SET password_hash = $3, reset_token = NULL, reset_expires_at = NULL
             WHERE id = $1 AND reset_token = $2 AND reset_expires_at >= $4
            "#,
        )
        .bind(id.as_uuid())
        .bind(token)
        .bind(new_hash)
        .bind(now)
        .execute(&*self.pool)
        .await
        .map_err(unavailable)?;
        Ok(result.rows_affected() == 1)
    }
}

fn split_token(token: Option<OpaqueToken>) -> (Option<String>, Option<DateTime<Utc>>) {
    match token {
        Some(t) => (Some(t.value), Some(t.expires_at)),
        None => (None, None),
    }
}
