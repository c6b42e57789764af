use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    routing::{get, post},
};

use notas_auth::AuthenticatedIdentity;
use notas_core::{NoteId, UserId};
use notas_notes::Profile;

use crate::app::{
    dto::ProfileRequest, errors::ApiError, extract::ValidJson, routes::parse_id,
    services::AppServices,
};
use crate::context::CurrentIdentity;

pub fn router() -> Router {
    Router::new()
        .route("/:user_id", get(get_profile).put(update_profile))
        .route("/:user_id/favoritas/:note_id", post(add_favorite).delete(remove_favorite))
}

/// Admins may address any existing user; everyone else only themselves
/// (enforced by the note service).
async fn target_user(
    services: &AppServices,
    caller: &AuthenticatedIdentity,
    raw: &str,
) -> Result<UserId, ApiError> {
    let user: UserId = parse_id(raw)?;
    if caller.is_admin() && caller.user_id != user {
        services.accounts.get(user).await?;
    }
    Ok(user)
}

pub async fn get_profile(
    Extension(services): Extension<Arc<AppServices>>,
    CurrentIdentity(caller): CurrentIdentity,
    Path(user_id): Path<String>,
) -> Result<Json<Profile>, ApiError> {
    let user = target_user(&services, &caller, &user_id).await?;
    Ok(Json(services.notes.profile(&caller, user).await?))
}

pub async fn update_profile(
    Extension(services): Extension<Arc<AppServices>>,
    CurrentIdentity(caller): CurrentIdentity,
    Path(user_id): Path<String>,
    ValidJson(body): ValidJson<ProfileRequest>,
) -> Result<Json<Profile>, ApiError> {
    let user = target_user(&services, &caller, &user_id).await?;
    Ok(Json(services.notes.update_profile(&caller, user, body.display_name).await?))
}

pub async fn add_favorite(
    Extension(services): Extension<Arc<AppServices>>,
    CurrentIdentity(caller): CurrentIdentity,
    Path((user_id, note_id)): Path<(String, String)>,
) -> Result<Json<Profile>, ApiError> {
    let user = target_user(&services, &caller, &user_id).await?;
    let note: NoteId = parse_id(&note_id)?;
    Ok(Json(services.notes.add_favorite(&caller, user, note).await?))
}

pub async fn remove_favorite(
    Extension(services): Extension<Arc<AppServices>>,
    CurrentIdentity(caller): CurrentIdentity,
    Path((user_id, note_id)): Path<(String, String)>,
) -> Result<Json<Profile>, ApiError> {
    let user = target_user(&services, &caller, &user_id).await?;
    let note: NoteId = parse_id(&note_id)?;
    Ok(Json(services.notes.remove_favorite(&caller, user, note).await?))
}
