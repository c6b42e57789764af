//! Admin-provisioned accounts (the user-management surface).

use std::{collections::BTreeSet, sync::Arc};

use async_trait::async_trait;
use chrono::Utc;

use notas_core::{DomainError, DomainResult, EmailAddress, UserId};

use crate::{CredentialStore, PasswordHasher, Principal, PrincipalSummary, Role};

/// Data owned by a user that must go when the account goes.
#[async_trait]
pub trait AccountCleanup: Send + Sync {
    async fn purge_user_data(&self, user_id: UserId) -> DomainResult<()>;
}

#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn CredentialStore>,
    hasher: Arc<PasswordHasher>,
    cleanup: Vec<Arc<dyn AccountCleanup>>,
}

impl AccountService {
    pub fn new(store: Arc<dyn CredentialStore>, hasher: Arc<PasswordHasher>) -> Self {
        Self { store, hasher, cleanup: Vec::new() }
    }

    pub fn with_cleanup(mut self, cleanup: Arc<dyn AccountCleanup>) -> Self {
        self.cleanup.push(cleanup);
        self
    }

    /// Enabled immediately, no verification token. Roles default to USER.
    pub async fn provision(
        &self,
        email: &str,
        password: &str,
        roles: Option<BTreeSet<Role>>,
    ) -> DomainResult<PrincipalSummary> {
        let email = EmailAddress::parse(email)?;
        if self.store.find_by_email(&email).await?.is_some() {
            return Err(DomainError::conflict("email is already registered"));
        }

        let roles = roles
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| BTreeSet::from([Role::User]));
        let hash = self
            .hasher
            .hash(password)
            .map_err(|e| DomainError::internal(e.to_string()))?;

        let principal = Principal::provisioned(email, hash, roles, Utc::now());
        let summary = principal.summary();
        self.store.insert(principal).await?;

        tracing::info!(email = %summary.email, roles = ?summary.roles, "account provisioned");
        Ok(summary)
    }

    pub async fn get(&self, id: UserId) -> DomainResult<PrincipalSummary> {
        self.store
            .find_by_id(id)
            .await?
            .map(|p| p.summary())
            .ok_or_else(|| DomainError::not_found(format!("user {id} not found")))
    }

    pub async fn list(&self) -> DomainResult<Vec<PrincipalSummary>> {
        Ok(self.store.list().await?.iter().map(Principal::summary).collect())
    }

    pub async fn delete(&self, id: UserId) -> DomainResult<()> {
        if self.store.find_by_id(id).await?.is_none() {
            return Err(DomainError::not_found(format!("user {id} not found")));
        }
        for cleanup in &self.cleanup {
            cleanup.purge_user_data(id).await?;
        }
        if !self.store.delete(id).await? {
            return Err(DomainError::not_found(format!("user {id} not found")));
        }
        tracing::info!(user_id = %id, "account deleted");
        Ok(())
    }

    /// Provision an ADMIN account unless one already exists for `email`.
    /// Returns whether an account was created.
    pub async fn ensure_admin(&self, email: &str, password: &str) -> DomainResult<bool> {
        let parsed = EmailAddress::parse(email)?;
        if self.store.find_by_email(&parsed).await?.is_some() {
            return Ok(false);
        }
        match self.provision(email, password, Some(BTreeSet::from([Role::Admin]))).await {
            Ok(_) => Ok(true),
            Err(DomainError::Conflict(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::InMemoryCredentialStore;

    #[derive(Default)]
    struct RecordingCleanup(Mutex<Vec<UserId>>);

    #[async_trait]
    impl AccountCleanup for RecordingCleanup {
        async fn purge_user_data(&self, user_id: UserId) -> DomainResult<()> {
            self.0.lock().unwrap().push(user_id);
            Ok(())
        }
    }

    fn service() -> (AccountService, Arc<RecordingCleanup>) {
        let cleanup = Arc::new(RecordingCleanup::default());
        let svc = AccountService::new(
            Arc::new(InMemoryCredentialStore::new()),
            Arc::new(PasswordHasher::with_cost(64, 1, 1).unwrap()),
        )
        .with_cleanup(cleanup.clone());
        (svc, cleanup)
    }

    #[tokio::test]
    async fn provisioned_accounts_are_enabled_with_default_role() {
        let (svc, _) = service();
        let summary = svc.provision("New@X.com", "Abcdef1!", None).await.unwrap();
        assert!(summary.enabled);
        assert_eq!(summary.email, "new@x.com");
        assert_eq!(summary.roles, vec![Role::User]);

        let err = svc.provision("new@x.com", "Abcdef1!", None).await.unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[tokio::test]
    async fn delete_purges_owned_data() {
        let (svc, cleanup) = service();
        let summary = svc.provision("a@x.com", "Abcdef1!", None).await.unwrap();

        svc.delete(summary.id).await.unwrap();
        assert_eq!(*cleanup.0.lock().unwrap(), vec![summary.id]);
        assert!(matches!(svc.get(summary.id).await, Err(DomainError::NotFound(_))));
        assert!(matches!(svc.delete(summary.id).await, Err(DomainError::NotFound(_))));
    }

    #[tokio::test]
    async fn ensure_admin_is_idempotent() {
        let (svc, _) = service();
        assert!(svc.ensure_admin("root@x.com", "Abcdef1!").await.unwrap());
        assert!(!svc.ensure_admin("root@x.com", "Abcdef1!").await.unwrap());

        let all = svc.list().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].roles, vec![Role::Admin]);
    }
}
