//! Session token codec (HMAC-signed JWT).

use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde_json::{Value, json};
use thiserror::Error;

use crate::{Claims, Principal};

/// Token integrity failures. Callers treat every variant as "unauthenticated".
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token is empty")]
    BadArgument,

    #[error("token is malformed: {0}")]
    Malformed(String),

    #[error("token has expired")]
    Expired,

    #[error("token signature does not match")]
    InvalidSignature,

    #[error("unsupported token: {0}")]
    Unsupported(String),

    #[error("signing secret is not valid base64")]
    InvalidSecret,

    #[error("signing secret must decode to at least 32 bytes (got {0})")]
    WeakKey(usize),

    #[error("refresh token required")]
    NotRefreshToken,

    #[error("failed to sign token: {0}")]
    Signing(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidSignature => TokenError::InvalidSignature,
            ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                TokenError::Unsupported(err.to_string())
            }
            _ => TokenError::Malformed(err.to_string()),
        }
    }
}

/// Issues and validates session tokens with a single server-held secret.
///
/// The HMAC variant follows the decoded key length: 64+ bytes sign with
/// HS512, 48+ with HS384, 32+ with HS256. Tokens are stateless and carry no
/// revocation mechanism; expiry is enforced at parse time with zero leeway.
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    algorithm: Algorithm,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl core::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("algorithm", &self.algorithm)
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    /// Build a codec from a base64-encoded secret.
    pub fn from_base64_secret(
        secret: &str,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Result<Self, TokenError> {
        let key = STANDARD
            .decode(secret.trim())
            .map_err(|_| TokenError::InvalidSecret)?;
        Self::from_key(&key, access_ttl, refresh_ttl)
    }

    pub fn from_key(key: &[u8], access_ttl: Duration, refresh_ttl: Duration) -> Result<Self, TokenError> {
        let algorithm = match key.len() {
            n if n >= 64 => Algorithm::HS512,
            n if n >= 48 => Algorithm::HS384,
            n if n >= 32 => Algorithm::HS256,
            n => return Err(TokenError::WeakKey(n)),
        };

        Ok(Self {
            encoding: EncodingKey::from_secret(key),
            decoding: DecodingKey::from_secret(key),
            algorithm,
            access_ttl,
            refresh_ttl,
        })
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    /// Access token: subject, role names, user id.
    pub fn issue(&self, principal: &Principal) -> Result<String, TokenError> {
        self.issue_at(principal, Utc::now(), self.access_ttl, true)
    }

    /// Refresh token: longer TTL and no `roles` claim.
    pub fn issue_refresh(&self, principal: &Principal) -> Result<String, TokenError> {
        self.issue_at(principal, Utc::now(), self.refresh_ttl, false)
    }

    pub(crate) fn issue_at(
        &self,
        principal: &Principal,
        issued_at: DateTime<Utc>,
        ttl: Duration,
        with_roles: bool,
    ) -> Result<String, TokenError> {
        let roles = with_roles.then(|| {
            Value::Array(
                principal
                    .roles
                    .iter()
                    .map(|r| Value::String(r.as_str().to_string()))
                    .collect(),
            )
        });

        let claims = Claims {
            sub: principal.email.to_string(),
            roles,
            user_id: Some(json!(principal.id.to_string())),
            iat: issued_at.timestamp(),
            exp: (issued_at + ttl).timestamp(),
        };

        encode(&Header::new(self.algorithm), &claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Verify signature, algorithm and expiry, returning the decoded claims.
    pub fn parse_and_validate(&self, token: &str) -> Result<Claims, TokenError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(TokenError::BadArgument);
        }

        let mut validation = Validation::new(self.algorithm);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["sub", "exp"]);

        let data = decode::<Claims>(token, &self.decoding, &validation)?;

        // `exp` is whole seconds; compare against the clock in millis so a
        // token is dead from the first instant of its expiry second.
        if Utc::now().timestamp_millis() >= data.claims.exp.saturating_mul(1000) {
            return Err(TokenError::Expired);
        }
        Ok(data.claims)
    }

    /// Mint a fresh access token for `principal` from one of its refresh tokens.
    pub fn refresh_access(&self, refresh_token: &str, principal: &Principal) -> Result<String, TokenError> {
        let claims = self.parse_and_validate(refresh_token)?;
        if !claims.is_refresh() {
            return Err(TokenError::NotRefreshToken);
        }
        if claims.subject() != principal.email.as_str() {
            return Err(TokenError::Malformed("subject does not match principal".into()));
        }
        self.issue(principal)
    }
}
