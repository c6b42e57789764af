//! Credential lifecycle: signup, verification, login, password reset.
//!
//! State per principal is `UNVERIFIED -> VERIFIED`, with an orthogonal
//! password-reset sub-flow. Every state change is persisted before any email
//! goes out, so a delivery failure never leaves a half-applied transition.

use std::{collections::BTreeSet, sync::Arc};

use chrono::{Duration, Utc};

use notas_core::{DomainError, DomainResult, EmailAddress};

use crate::{
    CredentialStore, EmailError, EmailSender, OpaqueToken, PasswordHasher, Principal,
    PrincipalSummary, Role, TokenCodec,
};

pub const VERIFICATION_TOKEN_TTL_HOURS: i64 = 24;
pub const RESET_TOKEN_TTL_HOURS: i64 = 1;

const INVALID_CREDENTIALS: &str = "invalid credentials";

/// Successful sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginResult {
    pub email: EmailAddress,
    pub roles: BTreeSet<Role>,
    pub token: String,
}

#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    hasher: Arc<PasswordHasher>,
    codec: Arc<TokenCodec>,
    email: Arc<dyn EmailSender>,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        hasher: Arc<PasswordHasher>,
        codec: Arc<TokenCodec>,
        email: Arc<dyn EmailSender>,
    ) -> Self {
        Self { store, hasher, codec, email }
    }

    /// Create a disabled account holding role USER and mail its verification token.
    pub async fn register(&self, email: &str, password: &str) -> DomainResult<PrincipalSummary> {
        let email = EmailAddress::parse(email)?;

        // Fast path only; the store's uniqueness check is the final arbiter.
        if self.store.find_by_email(&email).await?.is_some() {
            return Err(DomainError::conflict("email is already registered"));
        }

        let hash = self.hash(password)?;
        let now = Utc::now();
        let token = OpaqueToken::generate(now, Duration::hours(VERIFICATION_TOKEN_TTL_HOURS));
        let token_value = token.value.clone();
        let principal = Principal::unverified(email.clone(), hash, token, now);
        let summary = principal.summary();

        self.store.insert(principal).await?;
        tracing::info!(email = %email, user_id = %summary.id, "account registered");

        self.email
            .send_verification(&email, &token_value)
            .await
            .map_err(|e| delivery_failed(&email, e))?;

        Ok(summary)
    }

    /// Consume a verification token and enable the account.
    pub async fn verify(&self, token: &str) -> DomainResult<()> {
        let principal = self
            .store
            .find_by_verification_token(token)
            .await?
            .ok_or_else(|| DomainError::not_found("invalid verification token"))?;

        let now = Utc::now();
        let expired = principal
            .verification
            .as_ref()
            .is_none_or(|t| t.is_expired_at(now));
        if expired {
            return Err(DomainError::not_found("verification token expired"));
        }

        if !self.store.complete_verification(principal.id, token, now).await? {
            return Err(DomainError::not_found("invalid verification token"));
        }

        tracing::info!(email = %principal.email, "account verified");
        Ok(())
    }

    /// Issue a fresh verification token, invalidating the previous one.
    pub async fn resend_verification(&self, email: &str) -> DomainResult<()> {
        let principal = self.find_existing(email).await?;
        if principal.enabled {
            return Err(DomainError::invalid_state("account is already verified"));
        }

        let token = OpaqueToken::generate(Utc::now(), Duration::hours(VERIFICATION_TOKEN_TTL_HOURS));
        let token_value = token.value.clone();
        if !self.store.replace_verification_token(principal.id, token).await? {
            return Err(DomainError::invalid_state("account is already verified"));
        }

        self.email
            .send_verification(&principal.email, &token_value)
            .await
            .map_err(|e| delivery_failed(&principal.email, e))
    }

    /// Wrong email and wrong password are indistinguishable; an unverified
    /// account is reported as such once the password matched.
    pub async fn login(&self, email: &str, password: &str) -> DomainResult<LoginResult> {
        let email = EmailAddress::parse(email)
            .map_err(|_| DomainError::unauthenticated(INVALID_CREDENTIALS))?;

        let principal = self
            .store
            .find_by_email(&email)
            .await?
            .ok_or_else(|| DomainError::unauthenticated(INVALID_CREDENTIALS))?;

        if !self.hasher.verify(password, &principal.password_hash) {
            tracing::debug!(email = %email, "login rejected: bad credentials");
            return Err(DomainError::unauthenticated(INVALID_CREDENTIALS));
        }
        if !principal.enabled {
            tracing::debug!(email = %email, "login rejected: account not verified");
            return Err(DomainError::unauthenticated("account not verified"));
        }

        let token = self
            .codec
            .issue(&principal)
            .map_err(|e| DomainError::internal(e.to_string()))?;

        tracing::info!(email = %email, "login succeeded");
        Ok(LoginResult {
            email: principal.email,
            roles: principal.roles,
            token,
        })
    }

    /// Exchange a refresh token for a new access token.
    pub async fn refresh_session(&self, refresh_token: &str) -> DomainResult<LoginResult> {
        let claims = self
            .codec
            .parse_and_validate(refresh_token)
            .map_err(|_| DomainError::unauthenticated(INVALID_CREDENTIALS))?;
        let email = EmailAddress::parse(claims.subject())
            .map_err(|_| DomainError::unauthenticated(INVALID_CREDENTIALS))?;

        let principal = self
            .store
            .find_by_email(&email)
            .await?
            .filter(|p| p.enabled)
            .ok_or_else(|| DomainError::unauthenticated(INVALID_CREDENTIALS))?;

        let token = self
            .codec
            .refresh_access(refresh_token, &principal)
            .map_err(|_| DomainError::unauthenticated(INVALID_CREDENTIALS))?;

        Ok(LoginResult {
            email: principal.email,
            roles: principal.roles,
            token,
        })
    }

    /// Start the password-reset sub-flow. Only verified accounts qualify.
    pub async fn request_password_reset(&self, email: &str) -> DomainResult<()> {
        let principal = self.find_existing(email).await?;
        if !principal.enabled {
            return Err(DomainError::invalid_state("account is not verified"));
        }

        let token = OpaqueToken::generate(Utc::now(), Duration::hours(RESET_TOKEN_TTL_HOURS));
        let token_value = token.value.clone();
        if !self.store.replace_password_reset_token(principal.id, token).await? {
            return Err(DomainError::not_found("user not found"));
        }

        self.email
            .send_password_reset(&principal.email, &token_value)
            .await
            .map_err(|e| delivery_failed(&principal.email, e))
    }

    /// Consume a reset token and store the new password.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> DomainResult<()> {
        let principal = self
            .store
            .find_by_reset_token(token)
            .await?
            .ok_or_else(|| DomainError::not_found("invalid reset token"))?;

        let expired = principal
            .password_reset
            .as_ref()
            .is_none_or(|t| t.is_expired_at(Utc::now()));
        if expired {
            return Err(DomainError::not_found("reset token expired"));
        }

        if self.hasher.verify(new_password, &principal.password_hash) {
            return Err(DomainError::invalid_argument(
                "new password must differ from the current password",
            ));
        }

        let hash = self.hash(new_password)?;
        if !self.store.complete_password_reset(principal.id, token, hash, Utc::now()).await? {
            return Err(DomainError::not_found("invalid reset token"));
        }

        tracing::info!(email = %principal.email, "password reset completed");
        Ok(())
    }

    async fn find_existing(&self, email: &str) -> DomainResult<Principal> {
        let not_found = || DomainError::not_found("user not found");
        let email = EmailAddress::parse(email).map_err(|_| not_found())?;
        self.store.find_by_email(&email).await?.ok_or_else(not_found)
    }

    fn hash(&self, password: &str) -> DomainResult<String> {
        self.hasher
            .hash(password)
            .map_err(|e| DomainError::internal(e.to_string()))
    }
}

fn delivery_failed(email: &EmailAddress, err: EmailError) -> DomainError {
    tracing::error!(email = %email, error = %err, "email delivery failed");
    DomainError::email_delivery("the email could not be delivered, please retry later")
}
