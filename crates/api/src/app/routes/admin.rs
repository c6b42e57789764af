use std::sync::Arc;

use axum::{Json, Router, extract::Extension, routing::get};
use serde_json::{Value, json};

use crate::app::{errors::ApiError, services::AppServices};
use crate::context::CurrentIdentity;

pub fn router() -> Router {
    Router::new().route("/", get(dashboard))
}

pub async fn dashboard(
    Extension(services): Extension<Arc<AppServices>>,
    CurrentIdentity(caller): CurrentIdentity,
) -> Result<Json<Value>, ApiError> {
    let users = services.accounts.list().await?;
    Ok(Json(json!({
        "message": format!("Welcome, {}", caller.email),
        "users": users.len(),
    })))
}
