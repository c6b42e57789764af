//! Domain error model.

use thiserror::Error;

/// Result type used across the service layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error taxonomy.
///
/// Services raise these; the HTTP boundary owns the mapping to status codes.
/// Messages are safe to show to clients except for `Internal`, whose text is
/// only logged.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Input failed validation.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A uniqueness rule was violated (e.g. duplicate email).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Bad credentials, unverified account, or missing/invalid token.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// The caller is authenticated but not allowed (role or ownership).
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Missing resource, or an opaque token that is unknown or expired.
    #[error("not found: {0}")]
    NotFound(String),

    /// The operation does not apply in the current state (e.g. already verified).
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// An argument is well-formed but not acceptable (e.g. reused password).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Outbound email could not be delivered after retries.
    #[error("email delivery failed: {0}")]
    EmailDeliveryFailed(String),

    /// Anything else (store outage, hashing failure, ...).
    #[error("internal error: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn unauthenticated(msg: impl Into<String>) -> Self {
        Self::Unauthenticated(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn email_delivery(msg: impl Into<String>) -> Self {
        Self::EmailDeliveryFailed(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Client-facing message (without the variant prefix).
    pub fn message(&self) -> &str {
        match self {
            Self::Validation(m)
            | Self::Conflict(m)
            | Self::Unauthenticated(m)
            | Self::Forbidden(m)
            | Self::NotFound(m)
            | Self::InvalidState(m)
            | Self::InvalidArgument(m)
            | Self::EmailDeliveryFailed(m)
            | Self::Internal(m) => m,
        }
    }
}
