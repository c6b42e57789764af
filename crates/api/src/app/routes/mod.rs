use axum::{Router, routing::get};

pub mod admin;
pub mod auth;
pub mod notes;
pub mod profiles;
pub mod system;
pub mod users;

/// Router for everything under `/api`.
pub fn router() -> Router {
    Router::new()
        .route("/me", get(system::me))
        .nest("/auth", auth::router())
        .nest("/notas", notes::router())
        .nest("/perfiles", profiles::router())
        .nest("/usuarios", users::router())
        .nest("/admin", admin::router())
}

/// Parse a path identifier, answering 400 on garbage.
pub(crate) fn parse_id<T>(raw: &str) -> Result<T, crate::app::errors::ApiError>
where
    T: core::str::FromStr<Err = notas_core::DomainError>,
{
    raw.parse::<T>().map_err(Into::into)
}
