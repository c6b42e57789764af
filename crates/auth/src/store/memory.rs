use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use notas_core::{EmailAddress, UserId};

use super::{CredentialStore, StoreError};
use crate::{OpaqueToken, Principal};

#[derive(Debug, Default)]
struct Inner {
    by_id: HashMap<UserId, Principal>,
    by_email: HashMap<String, UserId>,
}

/// In-memory credential store (development and tests).
///
/// Every operation runs under the write or read half of one lock, which gives
/// the conditional updates the same atomicity a single SQL statement would.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    inner: RwLock<Inner>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn find_by_email(&self, email: &EmailAddress) -> Result<Option<Principal>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .by_email
            .get(email.as_str())
            .and_then(|id| inner.by_id.get(id))
            .cloned())
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<Principal>, StoreError> {
        Ok(self.inner.read().await.by_id.get(&id).cloned())
    }

    async fn find_by_verification_token(&self, token: &str) -> Result<Option<Principal>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .by_id
            .values()
            .find(|p| p.verification.as_ref().is_some_and(|t| t.value == token))
            .cloned())
    }

    async fn find_by_reset_token(&self, token: &str) -> Result<Option<Principal>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .by_id
            .values()
            .find(|p| p.password_reset.as_ref().is_some_and(|t| t.value == token))
            .cloned())
    }

    async fn list(&self) -> Result<Vec<Principal>, StoreError> {
        let mut all: Vec<Principal> = self.inner.read().await.by_id.values().cloned().collect();
        all.sort_by_key(|p| p.created_at);
        Ok(all)
    }

    async fn insert(&self, principal: Principal) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let key = principal.email.as_str().to_string();
        if inner.by_email.contains_key(&key) {
            return Err(StoreError::DuplicateEmail(key));
        }
        inner.by_email.insert(key, principal.id);
        inner.by_id.insert(principal.id, principal);
        Ok(())
    }

    async fn delete(&self, id: UserId) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        match inner.by_id.remove(&id) {
            Some(p) => {
                inner.by_email.remove(p.email.as_str());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn complete_verification(
        &self,
        id: UserId,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        let Some(p) = inner.by_id.get_mut(&id) else {
            return Ok(false);
        };
        if p.verification.as_ref().is_some_and(|t| t.value == token && !t.is_expired_at(now)) {
            p.enabled = true;
            p.verification = None;
            return Ok(true);
        }
        Ok(false)
    }

    async fn replace_verification_token(&self, id: UserId, token: OpaqueToken) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        match inner.by_id.get_mut(&id) {
            Some(p) if !p.enabled => {
                p.verification = Some(token);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn replace_password_reset_token(&self, id: UserId, token: OpaqueToken) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        match inner.by_id.get_mut(&id) {
            Some(p) => {
                p.password_reset = Some(token);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn complete_password_reset(
        &self,
        id: UserId,
        token: &str,
        new_hash: String,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        let Some(p) = inner.by_id.get_mut(&id) else {
            return Ok(false);
        };
        if p.password_reset.as_ref().is_some_and(|t| t.value == token && !t.is_expired_at(now)) {
            p.password_hash = new_hash;
            p.password_reset = None;
            return Ok(true);
        }
        Ok(false)
    }
}
