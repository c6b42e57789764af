//! PostgreSQL-backed stores.
//!
//! Expected tables (schema management is handled outside this crate):
//!
//! ```sql
//! CREATE TABLE users (
//!     id                       UUID PRIMARY KEY,
//!     email                    TEXT NOT NULL UNIQUE,
//!     password_hash            TEXT NOT NULL,
//!     enabled                  BOOLEAN NOT NULL,
//!     roles                    TEXT[] NOT NULL,
//!     verification_token       TEXT UNIQUE,
//!     verification_expires_at  TIMESTAMPTZ,
//!     reset_token              TEXT UNIQUE,
//!     reset_expires_at         TIMESTAMPTZ,
//!     created_at               TIMESTAMPTZ NOT NULL
//! );
//!
//! CREATE TABLE notes (
//!     id          UUID PRIMARY KEY,
//!     owner_id    UUID NOT NULL,
//!     title       VARCHAR(255) NOT NULL,
//!     content     TEXT NOT NULL,
//!     created_at  TIMESTAMPTZ NOT NULL,
//!     updated_at  TIMESTAMPTZ NOT NULL
//! );
//!
//! CREATE TABLE profiles (
//!     user_id         UUID PRIMARY KEY,
//!     display_name    TEXT,
//!     favorite_notes  UUID[] NOT NULL,
//!     updated_at      TIMESTAMPTZ NOT NULL
//! );
//! ```

mod credentials;
mod notes;

pub use credentials::PostgresCredentialStore;
pub use notes::PostgresNoteStore;

/// SQLSTATE for unique-constraint violations.
const UNIQUE_VIOLATION: &str = "23505";

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|e| e.code())
        .is_some_and(|code| code == UNIQUE_VIOLATION)
}
