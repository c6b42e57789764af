use std::sync::Arc;

use thiserror::Error;

use notas_core::{DomainError, EmailAddress};

use crate::{AuthenticatedIdentity, CredentialStore, StoreError, TokenCodec, TokenError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("invalid token: {0}")]
    InvalidToken(#[from] TokenError),

    #[error("no account for token subject")]
    UnknownPrincipal,

    #[error("account not verified")]
    NotVerified,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<ResolveError> for DomainError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::NotVerified => DomainError::unauthenticated("account not verified"),
            ResolveError::Store(e) => e.into(),
            ResolveError::InvalidToken(_) | ResolveError::UnknownPrincipal => {
                DomainError::unauthenticated("invalid credentials")
            }
        }
    }
}

/// Maps a bearer token to the current principal and its authorities.
///
/// Read-only: resolution never mutates the principal.
#[derive(Clone)]
pub struct IdentityResolver {
    codec: Arc<TokenCodec>,
    store: Arc<dyn CredentialStore>,
}

impl IdentityResolver {
    pub fn new(codec: Arc<TokenCodec>, store: Arc<dyn CredentialStore>) -> Self {
        Self { codec, store }
    }

    pub async fn resolve(&self, token: &str) -> Result<AuthenticatedIdentity, ResolveError> {
        let claims = self.codec.parse_and_validate(token)?;
        if claims.is_refresh() {
            return Err(TokenError::Unsupported("refresh token used as bearer".into()).into());
        }

        let email = EmailAddress::parse(claims.subject())
            .map_err(|e| TokenError::Malformed(e.message().to_string()))?;

        let principal = self
            .store
            .find_by_email(&email)
            .await?
            .ok_or(ResolveError::UnknownPrincipal)?;

        // A token minted for a deleted account must not carry over to a new
        // account registered later with the same email.
        if claims.user_id().is_some_and(|id| id != principal.id) {
            return Err(ResolveError::UnknownPrincipal);
        }
        if !principal.enabled {
            return Err(ResolveError::NotVerified);
        }

        Ok(AuthenticatedIdentity::new(principal.id, principal.email, principal.roles))
    }
}
