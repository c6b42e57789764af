//! The boundary error translator: every failure leaves the API as the same
//! JSON shape.

use std::collections::BTreeMap;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};

use notas_core::DomainError;

const AUTHENTICATION_REQUIRED: &str = "Full authentication is required to access this resource";
const ACCESS_DENIED: &str = "Access denied";
const INTERNAL_MESSAGE: &str = "An unexpected error occurred";

/// Uniform error body. `path` is filled in by the `error_path` middleware.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    #[serde(serialize_with = "rfc3339")]
    pub timestamp: DateTime<Utc>,
    pub status: u16,
    pub error: String,
    pub message: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_errors: Option<BTreeMap<String, String>>,
}

fn rfc3339<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Millis, true))
}

#[derive(Debug, Clone)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    validation_errors: Option<BTreeMap<String, String>>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            validation_errors: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn authentication_required() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, AUTHENTICATION_REQUIRED)
    }

    pub fn access_denied() -> Self {
        Self::new(StatusCode::FORBIDDEN, ACCESS_DENIED)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        let status = match &err {
            DomainError::Validation(_) => StatusCode::BAD_REQUEST,
            DomainError::Conflict(_) => StatusCode::CONFLICT,
            DomainError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            DomainError::Forbidden(_) => StatusCode::FORBIDDEN,
            DomainError::NotFound(_) => StatusCode::NOT_FOUND,
            DomainError::InvalidState(_) | DomainError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            DomainError::EmailDeliveryFailed(_) => StatusCode::SERVICE_UNAVAILABLE,
            DomainError::Internal(msg) => {
                tracing::error!(error = %msg, "internal error");
                return Self::new(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE);
            }
        };
        Self::new(status, err.message())
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields = BTreeMap::new();
        for (field, errs) in errors.field_errors() {
            let message = errs
                .iter()
                .map(|e| {
                    e.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("invalid ({})", e.code))
                })
                .collect::<Vec<_>>()
                .join("; ");
            fields.insert(field.to_string(), message);
        }

        Self {
            status: StatusCode::BAD_REQUEST,
            message: "Validation failed".to_string(),
            validation_errors: Some(fields),
        }
    }
}

impl ErrorBody {
    /// Serialize with the given status, keeping a copy in the extensions.
    pub fn into_response_with(self, status: StatusCode) -> Response {
        let mut response = (status, Json(&self)).into_response();
        response.extensions_mut().insert(self);
        response
    }
}

impl From<ApiError> for ErrorBody {
    fn from(err: ApiError) -> Self {
        Self {
            timestamp: Utc::now(),
            status: err.status.as_u16(),
            error: err.status.canonical_reason().unwrap_or("Error").to_string(),
            message: err.message,
            path: String::new(),
            validation_errors: err.validation_errors,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status;
        ErrorBody::from(self).into_response_with(status)
    }
}
