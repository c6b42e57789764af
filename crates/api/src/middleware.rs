//! Request authentication and authorization.
//!
//! Composition (outermost first): `authenticate` populates the identity when
//! a valid bearer token is present and never rejects; `authorize` consults the
//! access policy and is the single place that answers 401/403.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Method, Request, header},
    middleware::Next,
    response::{IntoResponse, Response},
};

use notas_auth::{AccessPolicy, AuthenticatedIdentity, Decision, IdentityResolver};

use crate::app::errors::{ApiError, ErrorBody};

/// Signup, login, verification and password reset live here.
pub const PUBLIC_AUTH_PREFIX: &str = "/api/auth/";

const PLAIN_ERROR_LIMIT: usize = 16 * 1024;

#[derive(Clone)]
pub struct AuthState {
    pub resolver: IdentityResolver,
    pub policy: Arc<AccessPolicy>,
}

pub async fn authenticate(
    State(state): State<AuthState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    if req.method() == Method::OPTIONS || req.uri().path().starts_with(PUBLIC_AUTH_PREFIX) {
        return next.run(req).await;
    }

    let Some(token) = extract_bearer(req.headers()).map(str::to_owned) else {
        return next.run(req).await;
    };

    match state.resolver.resolve(&token).await {
        Ok(identity) => {
            tracing::debug!(email = %identity.email, "request authenticated");
            req.extensions_mut().insert(identity);
        }
        Err(e) => {
            tracing::debug!(error = %e, path = %req.uri().path(), "bearer token not accepted");
        }
    }

    next.run(req).await
}

/// The unauthorized entry point.
pub async fn authorize(
    State(state): State<AuthState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let decision = state.policy.evaluate(
        req.method().as_str(),
        req.uri().path(),
        req.extensions().get::<AuthenticatedIdentity>(),
    );

    match decision {
        Decision::Allow => next.run(req).await,
        Decision::Unauthenticated => {
            tracing::warn!(method = %req.method(), path = %req.uri().path(), "unauthenticated access rejected");
            ApiError::authentication_required().into_response()
        }
        Decision::Forbidden => {
            tracing::warn!(method = %req.method(), path = %req.uri().path(), "insufficient role");
            ApiError::access_denied().into_response()
        }
    }
}

/// Stamps the request path into error bodies produced further in. Error
/// responses that bypass `ApiError` (axum's own 405, extractor rejections)
/// are rewritten into the same shape.
pub async fn error_path(req: Request<Body>, next: Next) -> Response {
    let path = req.uri().path().to_string();
    let response = next.run(req).await;
    let status = response.status();

    if let Some(mut body) = response.extensions().get::<ErrorBody>().cloned() {
        body.path = path;
        return body.into_response_with(status);
    }
    if !status.is_client_error() && !status.is_server_error() {
        return response;
    }

    let (parts, raw) = response.into_parts();
    let text = match axum::body::to_bytes(raw, PLAIN_ERROR_LIMIT).await {
        Ok(bytes) if status.is_client_error() => String::from_utf8_lossy(&bytes).trim().to_string(),
        _ => String::new(),
    };
    let message = if text.is_empty() {
        status.canonical_reason().unwrap_or("Error").to_string()
    } else {
        text
    };

    let mut body = ErrorBody::from(ApiError::new(status, message));
    body.path = path;
    let mut rendered = body.into_response_with(status);
    for (name, value) in &parts.headers {
        if name != header::CONTENT_TYPE && name != header::CONTENT_LENGTH {
            rendered.headers_mut().append(name.clone(), value.clone());
        }
    }
    rendered
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = header.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}
