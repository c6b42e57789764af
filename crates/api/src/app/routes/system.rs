use axum::{Json, http::StatusCode};

use crate::app::{dto::MeResponse, errors::ApiError};
use crate::context::CurrentIdentity;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn me(CurrentIdentity(identity): CurrentIdentity) -> Json<MeResponse> {
    Json(MeResponse::from(&identity))
}

pub async fn not_found() -> ApiError {
    ApiError::new(StatusCode::NOT_FOUND, "No handler for this path")
}
