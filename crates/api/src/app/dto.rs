use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use notas_auth::{AuthenticatedIdentity, LoginResult};

pub const PASSWORD_MIN: u64 = 8;
pub const PASSWORD_MAX: u64 = 64;

const SPECIAL_CHARACTERS: &str = "@$!%*?&#^()_+-=[]{};':\"\\|,.<>/~`";

/// Upper, lower, digit and special character, all required.
pub fn validate_password_strength(password: &str) -> Result<(), ValidationError> {
    let has_upper = password.chars().any(|c| c.is_uppercase());
    let has_lower = password.chars().any(|c| c.is_lowercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_special = password.chars().any(|c| SPECIAL_CHARACTERS.contains(c));

    if has_upper && has_lower && has_digit && has_special {
        return Ok(());
    }
    let mut err = ValidationError::new("password_strength");
    err.message = Some(Cow::Borrowed(
        "password must contain an uppercase letter, a lowercase letter, a digit and a special character",
    ));
    Err(err)
}

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct SignupRequest {
    #[validate(email(message = "must be a well-formed email address"))]
    pub email: String,

    #[validate(
        length(min = 8, max = 64, message = "password must be between 8 and 64 characters"),
        custom(function = "validate_password_strength")
    )]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SigninRequest {
    #[validate(length(min = 1, message = "email is required"))]
    pub email: String,

    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    #[validate(length(min = 1, message = "token is required"))]
    pub token: String,

    #[validate(
        length(min = 8, max = 64, message = "password must be between 8 and 64 characters"),
        custom(function = "validate_password_strength")
    )]
    pub new_password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct TokenQuery {
    #[validate(length(min = 1, message = "token is required"))]
    pub token: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct EmailQuery {
    #[validate(length(min = 1, message = "email is required"))]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct NoteRequest {
    #[validate(length(min = 1, max = 255, message = "title must be between 1 and 255 characters"))]
    pub title: String,

    #[validate(length(min = 1, message = "content is required"))]
    pub content: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRequest {
    #[validate(length(max = 100, message = "displayName must be at most 100 characters"))]
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(email(message = "must be a well-formed email address"))]
    pub email: String,

    #[validate(
        length(min = 8, max = 64, message = "password must be between 8 and 64 characters"),
        custom(function = "validate_password_strength")
    )]
    pub password: String,

    /// Role names (`USER`, `ADMIN`, optionally `ROLE_`-prefixed). Defaults to USER.
    pub roles: Option<Vec<String>>,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub message: String,
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub email: String,
    pub roles: Vec<String>,
    pub token: String,
}

impl From<LoginResult> for LoginResponse {
    fn from(login: LoginResult) -> Self {
        Self {
            email: login.email.to_string(),
            roles: login.roles.iter().map(|r| r.authority()).collect(),
            token: login.token,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub user_id: String,
    pub email: String,
    pub authorities: Vec<String>,
}

impl From<&AuthenticatedIdentity> for MeResponse {
    fn from(identity: &AuthenticatedIdentity) -> Self {
        Self {
            user_id: identity.user_id.to_string(),
            email: identity.email.to_string(),
            authorities: identity.authorities(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signup(email: &str, password: &str) -> SignupRequest {
        SignupRequest { email: email.into(), password: password.into() }
    }

    #[test]
    fn password_policy() {
        assert!(signup("a@x.com", "Abcdef1!").validate().is_ok());

        let too_long = format!("Aa1!{}", "x".repeat(61));
        for weak in ["Ab1!", "abcdefg1!", "ABCDEFG1!", "Abcdefgh!", "Abcdefgh1", too_long.as_str()] {
            let errors = signup("a@x.com", weak).validate().unwrap_err();
            assert!(errors.field_errors().contains_key("password"), "{weak} should be rejected");
        }
    }

    #[test]
    fn email_must_be_well_formed() {
        let errors = signup("not-an-email", "Abcdef1!").validate().unwrap_err();
        assert!(errors.field_errors().contains_key("email"));
    }
}
