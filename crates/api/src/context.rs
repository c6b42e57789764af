use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use notas_auth::AuthenticatedIdentity;

use crate::app::errors::ApiError;

/// The caller's identity for this request.
///
/// Inserted by the authentication middleware; handlers receive it as an
/// explicit argument and pass it on to the services.
#[derive(Debug, Clone)]
pub struct CurrentIdentity(pub AuthenticatedIdentity);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentIdentity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedIdentity>()
            .cloned()
            .map(CurrentIdentity)
            .ok_or_else(ApiError::authentication_required)
    }
}
