use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use notas_core::UserId;

/// Session token claims.
///
/// `roles` and `userId` are kept as raw JSON so a token with an unexpected
/// claim shape still decodes; the extractors below tolerate missing or
/// wrong-typed values by returning an empty result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the principal's email.
    pub sub: String,

    /// Role names. Present on access tokens only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<Value>,

    #[serde(rename = "userId", default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Value>,

    #[serde(default)]
    pub iat: i64,

    pub exp: i64,
}

impl Claims {
    pub fn subject(&self) -> &str {
        &self.sub
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user_id.as_ref()?.as_str()?.parse().ok()
    }

    pub fn roles(&self) -> Vec<String> {
        match &self.roles {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_owned))
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn expiry(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }

    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.iat, 0)
    }

    /// Refresh tokens are the ones minted without a `roles` claim.
    pub fn is_refresh(&self) -> bool {
        self.roles.is_none()
    }
}
