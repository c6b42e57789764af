//! `notas-auth`: authentication and authorization core.
//!
//! Token codec, password hashing, the credential lifecycle and the access
//! policy. This crate is intentionally decoupled from HTTP; storage and email
//! delivery are consumed through the [`CredentialStore`] and [`EmailSender`]
//! traits.

pub mod accounts;
pub mod claims;
pub mod email;
pub mod identity;
pub mod password;
pub mod policy;
pub mod principal;
pub mod resolver;
pub mod roles;
pub mod service;
pub mod store;
pub mod token;

pub use accounts::{AccountCleanup, AccountService};
pub use claims::Claims;
pub use email::{
    ConsoleEmailSender, EmailError, EmailKind, EmailSender, OutboundEmail, RetryPolicy,
    RetryingEmailSender, send_with_retry,
};
pub use identity::AuthenticatedIdentity;
pub use password::{PasswordError, PasswordHasher};
pub use policy::{AccessPolicy, Decision, PathPattern, Requirement};
pub use principal::{OpaqueToken, Principal, PrincipalSummary};
pub use resolver::{IdentityResolver, ResolveError};
pub use roles::Role;
pub use service::{AuthService, LoginResult};
pub use store::{CredentialStore, InMemoryCredentialStore, StoreError};
pub use token::{TokenCodec, TokenError};
