use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use notas_core::{EmailAddress, Entity, UserId};

use crate::Role;

/// One-shot opaque token (verification or password reset) embedded in a principal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpaqueToken {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl OpaqueToken {
    /// Random, unguessable value valid for `ttl` from `now`.
    pub fn generate(now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            value: Uuid::new_v4().to_string(),
            expires_at: now + ttl,
        }
    }

    /// Strictly-before comparison: at exactly `expires_at` the token is still valid.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

/// The authenticated identity record: email, credentials and roles.
///
/// The password hash and the opaque tokens never leave the service layer;
/// use [`Principal::summary`] for anything returned to clients.
#[derive(Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: UserId,
    pub email: EmailAddress,
    pub password_hash: String,
    pub enabled: bool,
    pub roles: BTreeSet<Role>,
    pub verification: Option<OpaqueToken>,
    pub password_reset: Option<OpaqueToken>,
    pub created_at: DateTime<Utc>,
}

impl Principal {
    /// Self-registered account: disabled until the verification token is consumed.
    pub fn unverified(
        email: EmailAddress,
        password_hash: String,
        verification: OpaqueToken,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: UserId::new(),
            email,
            password_hash,
            enabled: false,
            roles: BTreeSet::from([Role::User]),
            verification: Some(verification),
            password_reset: None,
            created_at: now,
        }
    }

    /// Admin-created account: enabled immediately, no verification flow.
    pub fn provisioned(
        email: EmailAddress,
        password_hash: String,
        roles: BTreeSet<Role>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: UserId::new(),
            email,
            password_hash,
            enabled: true,
            roles,
            verification: None,
            password_reset: None,
            created_at: now,
        }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn summary(&self) -> PrincipalSummary {
        PrincipalSummary {
            id: self.id,
            email: self.email.to_string(),
            enabled: self.enabled,
            roles: self.roles.iter().copied().collect(),
            created_at: self.created_at,
        }
    }
}

impl Entity for Principal {
    type Id = UserId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl core::fmt::Debug for Principal {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Principal")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("password_hash", &"<redacted>")
            .field("enabled", &self.enabled)
            .field("roles", &self.roles)
            .field("verification_pending", &self.verification.is_some())
            .field("reset_pending", &self.password_reset.is_some())
            .finish()
    }
}

/// Public-safe view of a principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrincipalSummary {
    pub id: UserId,
    pub email: String,
    pub enabled: bool,
    pub roles: Vec<Role>,
    pub created_at: DateTime<Utc>,
}
