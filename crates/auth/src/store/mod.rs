//! Credential persistence contract.
//!
//! One-shot tokens are made safe by the conditional operations
//! (`complete_verification`, `complete_password_reset`, ...): each checks and
//! mutates in a single store-level step, so no application lock is needed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use notas_core::{DomainError, EmailAddress, UserId};

use crate::{OpaqueToken, Principal};

mod memory;

pub use memory::InMemoryCredentialStore;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("email already registered: {0}")]
    DuplicateEmail(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<StoreError> for DomainError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateEmail(_) => DomainError::conflict("email is already registered"),
            StoreError::Unavailable(msg) => DomainError::internal(msg),
        }
    }
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_email(&self, email: &EmailAddress) -> Result<Option<Principal>, StoreError>;

    async fn find_by_id(&self, id: UserId) -> Result<Option<Principal>, StoreError>;

    async fn find_by_verification_token(&self, token: &str) -> Result<Option<Principal>, StoreError>;

    async fn find_by_reset_token(&self, token: &str) -> Result<Option<Principal>, StoreError>;

    async fn list(&self) -> Result<Vec<Principal>, StoreError>;

    /// Persist a new principal. Email uniqueness is enforced here.
    async fn insert(&self, principal: Principal) -> Result<(), StoreError>;

    async fn delete(&self, id: UserId) -> Result<bool, StoreError>;

    /// If the stored verification token equals `token` and has not expired at
    /// `now`: enable the account and clear the token. Returns whether it applied.
    async fn complete_verification(
        &self,
        id: UserId,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Overwrite the verification token, only while the account is disabled.
    async fn replace_verification_token(&self, id: UserId, token: OpaqueToken) -> Result<bool, StoreError>;

    /// Overwrite any outstanding password-reset token.
    async fn replace_password_reset_token(&self, id: UserId, token: OpaqueToken) -> Result<bool, StoreError>;

    /// If the stored reset token equals `token` and has not expired at `now`:
    /// store `new_hash` and clear the token. Returns whether it applied.
    async fn complete_password_reset(
        &self,
        id: UserId,
        token: &str,
        new_hash: String,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError>;
}
