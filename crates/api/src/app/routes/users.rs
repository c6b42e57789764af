use std::{collections::BTreeSet, sync::Arc};

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    routing::get,
};

use notas_auth::{PrincipalSummary, Role};
use notas_core::UserId;

use crate::app::{
    dto::CreateUserRequest, errors::ApiError, extract::ValidJson, routes::parse_id,
    services::AppServices,
};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/:id", get(get_user).delete(delete_user))
}

pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
) -> Result<Json<Vec<PrincipalSummary>>, ApiError> {
    Ok(Json(services.accounts.list().await?))
}

/// Admin-created accounts skip email verification.
pub async fn create_user(
    Extension(services): Extension<Arc<AppServices>>,
    ValidJson(body): ValidJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<PrincipalSummary>), ApiError> {
    let roles = body
        .roles
        .map(|names| {
            names
                .iter()
                .map(|n| n.parse::<Role>())
                .collect::<Result<BTreeSet<_>, _>>()
        })
        .transpose()?;

    let summary = services.accounts.provision(&body.email, &body.password, roles).await?;
    Ok((StatusCode::CREATED, Json(summary)))
}

pub async fn get_user(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<Json<PrincipalSummary>, ApiError> {
    let id: UserId = parse_id(&id)?;
    Ok(Json(services.accounts.get(id).await?))
}

pub async fn delete_user(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id: UserId = parse_id(&id)?;
    services.accounts.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
