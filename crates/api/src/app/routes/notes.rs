use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    routing::get,
};

use notas_core::NoteId;
use notas_notes::{Note, NoteDraft};

use crate::app::{
    dto::NoteRequest, errors::ApiError, extract::ValidJson, routes::parse_id,
    services::AppServices,
};
use crate::context::CurrentIdentity;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_notes).post(create_note))
        .route("/:id", get(get_note).put(update_note).delete(delete_note))
}

pub async fn list_notes(
    Extension(services): Extension<Arc<AppServices>>,
    CurrentIdentity(caller): CurrentIdentity,
) -> Result<Json<Vec<Note>>, ApiError> {
    Ok(Json(services.notes.list(&caller).await?))
}

pub async fn create_note(
    Extension(services): Extension<Arc<AppServices>>,
    CurrentIdentity(caller): CurrentIdentity,
    ValidJson(body): ValidJson<NoteRequest>,
) -> Result<(StatusCode, Json<Note>), ApiError> {
    let draft = NoteDraft::new(&body.title, &body.content)?;
    let note = services.notes.create(&caller, draft).await?;
    Ok((StatusCode::CREATED, Json(note)))
}

pub async fn get_note(
    Extension(services): Extension<Arc<AppServices>>,
    CurrentIdentity(caller): CurrentIdentity,
    Path(id): Path<String>,
) -> Result<Json<Note>, ApiError> {
    let id: NoteId = parse_id(&id)?;
    Ok(Json(services.notes.get(&caller, id).await?))
}

pub async fn update_note(
    Extension(services): Extension<Arc<AppServices>>,
    CurrentIdentity(caller): CurrentIdentity,
    Path(id): Path<String>,
    ValidJson(body): ValidJson<NoteRequest>,
) -> Result<Json<Note>, ApiError> {
    let id: NoteId = parse_id(&id)?;
    let draft = NoteDraft::new(&body.title, &body.content)?;
    Ok(Json(services.notes.update(&caller, id, draft).await?))
}

pub async fn delete_note(
    Extension(services): Extension<Arc<AppServices>>,
    CurrentIdentity(caller): CurrentIdentity,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id: NoteId = parse_id(&id)?;
    services.notes.delete(&caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
