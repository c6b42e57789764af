//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store/email selection and service construction
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response DTOs and validation rules
//! - `extract.rs`: validating extractors
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use notas_auth::AccessPolicy;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod extract;
pub mod routes;
pub mod services;

pub use services::AppServices;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
///
/// Request path: CORS, tracing, error-path stamping, authentication,
/// authorization, then the handler.
pub fn build_app(services: Arc<AppServices>) -> Router {
    let auth_state = middleware::AuthState {
        resolver: services.resolver.clone(),
        policy: Arc::new(AccessPolicy::standard()),
    };

    Router::new()
        .route("/health", get(routes::system::health))
        .nest("/api", routes::router())
        .fallback(routes::system::not_found)
        .layer(Extension(services))
        .layer(axum::middleware::from_fn_with_state(
            auth_state.clone(),
            middleware::authorize,
        ))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::authenticate,
        ))
        .layer(axum::middleware::from_fn(middleware::error_path))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
