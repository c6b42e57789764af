//! Application configuration.
//!
//! Built-in defaults merged with `NOTAS_`-prefixed environment variables
//! (`NOTAS_JWT_SECRET`, `NOTAS_DATABASE_URL`, ...). Invalid settings fail at
//! startup rather than on first use.

use std::time::Duration;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use figment::{
    Figment,
    providers::{Env, Serialized},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use notas_auth::{PasswordHasher, RetryPolicy, TokenCodec, TokenError};
use notas_observability::LogFormat;

pub const ENV_PREFIX: &str = "NOTAS_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("jwt_secret is required")]
    MissingSecret,

    #[error("jwt_secret is not usable: {0}")]
    InvalidSecret(#[from] TokenError),

    #[error("{0} must be positive")]
    NonPositive(&'static str),

    #[error("email_provider 'resend' requires resend_api_key and email_from")]
    IncompleteResend,

    #[error("invalid password hashing cost: {0}")]
    InvalidHashCost(String),

    #[error("admin_email and admin_password must be set together")]
    IncompleteAdmin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailProvider {
    /// Logs links instead of sending mail.
    #[default]
    Console,
    Resend,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub bind_addr: String,
    pub jwt_secret: Option<String>,
    pub jwt_expiration_ms: i64,
    pub jwt_refresh_expiration_ms: i64,
    pub base_url: String,
    pub database_url: Option<String>,
    pub email_provider: EmailProvider,
    pub resend_api_key: Option<String>,
    pub email_from: Option<String>,
    pub email_from_name: String,
    pub email_max_attempts: u32,
    pub email_base_delay_ms: u64,
    pub email_multiplier: f64,
    pub email_max_delay_ms: u64,
    pub log_format: LogFormat,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
    pub password_hash_memory_kib: u32,
    pub password_hash_iterations: u32,
    pub password_hash_parallelism: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".into(),
            jwt_secret: None,
            jwt_expiration_ms: 3_600_000,
            jwt_refresh_expiration_ms: 86_400_000,
            base_url: "http://localhost:8080".into(),
            database_url: None,
            email_provider: EmailProvider::Console,
            resend_api_key: None,
            email_from: None,
            email_from_name: "Notas".into(),
            email_max_attempts: 3,
            email_base_delay_ms: 2000,
            email_multiplier: 2.0,
            email_max_delay_ms: 10_000,
            log_format: LogFormat::Json,
            admin_email: None,
            admin_password: None,
            password_hash_memory_kib: argon2_defaults::M_COST,
            password_hash_iterations: argon2_defaults::T_COST,
            password_hash_parallelism: argon2_defaults::P_COST,
        }
    }
}

/// Argon2id defaults (RFC 9106 second recommendation, as the argon2 crate uses).
mod argon2_defaults {
    pub const M_COST: u32 = 19 * 1024;
    pub const T_COST: u32 = 2;
    pub const P_COST: u32 = 1;
}

impl core::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AppConfig")
            .field("bind_addr", &self.bind_addr)
            .field("base_url", &self.base_url)
            .field("database", &self.database_url.as_ref().map(|_| "<set>"))
            .field("email_provider", &self.email_provider)
            .field("log_format", &self.log_format)
            .field("admin_email", &self.admin_email)
            .finish_non_exhaustive()
    }
}

impl AppConfig {
    /// Defaults merged with the process environment, validated.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_figment(
            Figment::from(Serialized::defaults(AppConfig::default())).merge(Env::prefixed(ENV_PREFIX)),
        )
    }

    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: AppConfig = figment.extract().map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.token_codec()?;
        self.password_hasher()?;

        if self.jwt_refresh_expiration_ms <= 0 {
            return Err(ConfigError::NonPositive("jwt_refresh_expiration_ms"));
        }
        if self.email_provider == EmailProvider::Resend
            && (blank(&self.resend_api_key) || blank(&self.email_from))
        {
            return Err(ConfigError::IncompleteResend);
        }
        if blank(&self.admin_email) != blank(&self.admin_password) {
            return Err(ConfigError::IncompleteAdmin);
        }
        Ok(())
    }

    pub fn token_codec(&self) -> Result<TokenCodec, ConfigError> {
        let secret = self
            .jwt_secret
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or(ConfigError::MissingSecret)?;
        if self.jwt_expiration_ms <= 0 {
            return Err(ConfigError::NonPositive("jwt_expiration_ms"));
        }

        Ok(TokenCodec::from_base64_secret(
            secret,
            chrono::Duration::milliseconds(self.jwt_expiration_ms),
            chrono::Duration::milliseconds(self.jwt_refresh_expiration_ms),
        )?)
    }

    pub fn password_hasher(&self) -> Result<PasswordHasher, ConfigError> {
        PasswordHasher::with_cost(
            self.password_hash_memory_kib,
            self.password_hash_iterations,
            self.password_hash_parallelism,
        )
        .map_err(|e| ConfigError::InvalidHashCost(e.to_string()))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.email_max_attempts,
            base_delay: Duration::from_millis(self.email_base_delay_ms),
            multiplier: self.email_multiplier,
            max_delay: Duration::from_millis(self.email_max_delay_ms),
        }
    }

    /// Bootstrap administrator credentials, when both are configured.
    pub fn admin_credentials(&self) -> Option<(&str, &str)> {
        match (self.admin_email.as_deref(), self.admin_password.as_deref()) {
            (Some(email), Some(password)) if !email.trim().is_empty() => Some((email, password)),
            _ => None,
        }
    }

    /// A valid random-looking secret for tests and local runs.
    pub fn encode_secret(raw: &[u8]) -> String {
        STANDARD.encode(raw)
    }
}

fn blank(value: &Option<String>) -> bool {
    value.as_deref().is_none_or(|v| v.trim().is_empty())
}
