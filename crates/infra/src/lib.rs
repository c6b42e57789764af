//! Infrastructure layer: configuration, PostgreSQL stores, outbound email.

pub mod config;
pub mod email;
pub mod postgres;

pub use config::{AppConfig, ConfigError, EmailProvider};
pub use email::ResendEmailSender;
pub use postgres::{PostgresCredentialStore, PostgresNoteStore};
