use std::sync::Arc;

use axum::{
    Json, Router,
    extract::Extension,
    http::StatusCode,
    routing::{get, post},
};

use notas_core::DomainError;

use crate::app::{
    dto::{
        EmailQuery, LoginResponse, MessageResponse, ResetPasswordRequest, SigninRequest,
        SignupRequest, SignupResponse, TokenQuery,
    },
    errors::ApiError,
    extract::{ValidJson, ValidQuery},
    services::AppServices,
};

pub fn router() -> Router {
    Router::new()
        .route("/signup", post(signup))
        .route("/signin", post(signin))
        .route("/verify", get(verify))
        .route("/resend-verification", post(resend_verification))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
}

pub async fn signup(
    Extension(services): Extension<Arc<AppServices>>,
    ValidJson(body): ValidJson<SignupRequest>,
) -> Result<(StatusCode, Json<SignupResponse>), ApiError> {
    let summary = services.auth.register(&body.email, &body.password).await?;
    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            message: "Account created. Check your email to verify it.".into(),
            email: summary.email,
        }),
    ))
}

pub async fn signin(
    Extension(services): Extension<Arc<AppServices>>,
    ValidJson(body): ValidJson<SigninRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let login = services.auth.login(&body.email, &body.password).await?;
    Ok(Json(login.into()))
}

pub async fn verify(
    Extension(services): Extension<Arc<AppServices>>,
    ValidQuery(query): ValidQuery<TokenQuery>,
) -> Result<Json<MessageResponse>, ApiError> {
    services.auth.verify(&query.token).await?;
    Ok(Json(MessageResponse::new("Account verified. You can now sign in.")))
}

pub async fn resend_verification(
    Extension(services): Extension<Arc<AppServices>>,
    ValidQuery(query): ValidQuery<EmailQuery>,
) -> Result<Json<MessageResponse>, ApiError> {
    services.auth.resend_verification(&query.email).await?;
    Ok(Json(MessageResponse::new("Verification email sent.")))
}

/// Always 200 for unknown, unverified or undeliverable addresses so the
/// response does not reveal whether an account exists.
pub async fn forgot_password(
    Extension(services): Extension<Arc<AppServices>>,
    ValidQuery(query): ValidQuery<EmailQuery>,
) -> Result<Json<MessageResponse>, ApiError> {
    match services.auth.request_password_reset(&query.email).await {
        Ok(()) => {}
        Err(DomainError::NotFound(_) | DomainError::InvalidState(_)) => {
            tracing::debug!("password reset requested for unknown or unverified account");
        }
        Err(DomainError::EmailDeliveryFailed(msg)) => {
            tracing::error!(error = %msg, "password reset email not delivered");
        }
        Err(e) => return Err(e.into()),
    }
    Ok(Json(MessageResponse::new(
        "If an account exists for that email, a reset link has been sent.",
    )))
}

pub async fn reset_password(
    Extension(services): Extension<Arc<AppServices>>,
    ValidJson(body): ValidJson<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    services.auth.reset_password(&body.token, &body.new_password).await?;
    Ok(Json(MessageResponse::new("Password updated.")))
}
