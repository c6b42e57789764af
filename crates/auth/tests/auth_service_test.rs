use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use notas_auth::{
    AuthService, ConsoleEmailSender, CredentialStore, EmailError, EmailKind, EmailSender,
    InMemoryCredentialStore, OpaqueToken, PasswordHasher, Principal, Role, StoreError, TokenCodec,
};
use notas_core::{DomainError, EmailAddress, UserId};

/// Delegates to the in-memory store and counts mutating calls.
#[derive(Default)]
struct CountingStore {
    inner: InMemoryCredentialStore,
    writes: AtomicUsize,
}

impl CountingStore {
    fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn bump(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl CredentialStore for CountingStore {
    async fn find_by_email(&self, email: &EmailAddress) -> Result<Option<Principal>, StoreError> {
        self.inner.find_by_email(email).await
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<Principal>, StoreError> {
        self.inner.find_by_id(id).await
    }

    async fn find_by_verification_token(&self, token: &str) -> Result<Option<Principal>, StoreError> {
        self.inner.find_by_verification_token(token).await
    }

    async fn find_by_reset_token(&self, token: &str) -> Result<Option<Principal>, StoreError> {
        self.inner.find_by_reset_token(token).await
    }

    async fn list(&self) -> Result<Vec<Principal>, StoreError> {
        self.inner.list().await
    }

    async fn insert(&self, principal: Principal) -> Result<(), StoreError> {
        self.bump();
        self.inner.insert(principal).await
    }

    async fn delete(&self, id: UserId) -> Result<bool, StoreError> {
        self.bump();
        self.inner.delete(id).await
    }

    async fn complete_verification(
        &self,
        id: UserId,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        self.bump();
        self.inner.complete_verification(id, token, now).await
    }

    async fn replace_verification_token(&self, id: UserId, token: OpaqueToken) -> Result<bool, StoreError> {
        self.bump();
        self.inner.replace_verification_token(id, token).await
    }

    async fn replace_password_reset_token(&self, id: UserId, token: OpaqueToken) -> Result<bool, StoreError> {
        self.bump();
        self.inner.replace_password_reset_token(id, token).await
    }

    async fn complete_password_reset(
        &self,
        id: UserId,
        token: &str,
        new_hash: String,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        self.bump();
        self.inner.complete_password_reset(id, token, new_hash, now).await
    }
}

struct FailingSender;

#[async_trait]
impl EmailSender for FailingSender {
    async fn send_verification(&self, _to: &EmailAddress, _token: &str) -> Result<(), EmailError> {
        Err(EmailError::Exhausted { attempts: 3, last: "503".into() })
    }

    async fn send_password_reset(&self, _to: &EmailAddress, _token: &str) -> Result<(), EmailError> {
        Err(EmailError::Exhausted { attempts: 3, last: "503".into() })
    }
}

struct Harness {
    service: AuthService,
    store: Arc<CountingStore>,
    outbox: Arc<ConsoleEmailSender>,
    codec: Arc<TokenCodec>,
}

fn harness() -> Harness {
    let store = Arc::new(CountingStore::default());
    let outbox = Arc::new(ConsoleEmailSender::new("http://localhost:8080"));
    let codec = Arc::new(TokenCodec::from_key(&[42; 32], Duration::hours(1), Duration::hours(24)).unwrap());
    let service = AuthService::new(
        store.clone(),
        Arc::new(PasswordHasher::with_cost(64, 1, 1).unwrap()),
        codec.clone(),
        outbox.clone(),
    );
    Harness { service, store, outbox, codec }
}

fn addr(raw: &str) -> EmailAddress {
    EmailAddress::parse(raw).unwrap()
}

impl Harness {
    async fn verification_token(&self, email: &str) -> String {
        self.outbox.last_token(&addr(email), EmailKind::Verification).await.unwrap()
    }

    async fn reset_token(&self, email: &str) -> String {
        self.outbox.last_token(&addr(email), EmailKind::PasswordReset).await.unwrap()
    }

    async fn principal(&self, email: &str) -> Principal {
        self.store.find_by_email(&addr(email)).await.unwrap().unwrap()
    }

    async fn verified(&self, email: &str, password: &str) {
        self.service.register(email, password).await.unwrap();
        let token = self.verification_token(email).await;
        self.service.verify(&token).await.unwrap();
    }
}

#[tokio::test]
async fn signup_creates_disabled_user_and_mails_persisted_token() {
    let h = harness();
    let summary = h.service.register("a@x.com", "Abcdef1!").await.unwrap();
    assert!(!summary.enabled);
    assert_eq!(summary.roles, vec![Role::User]);

    let stored = h.principal("a@x.com").await;
    assert!(!stored.enabled);
    assert_eq!(stored.roles.len(), 1);
    assert_ne!(stored.password_hash, "Abcdef1!");

    let mailed = h.verification_token("a@x.com").await;
    assert_eq!(stored.verification.unwrap().value, mailed);
}

#[tokio::test]
async fn duplicate_signup_is_a_conflict() {
    let h = harness();
    h.service.register("a@x.com", "Abcdef1!").await.unwrap();
    let err = h.service.register("A@x.com", "Abcdef1!").await.unwrap_err();
    assert!(matches!(err, DomainError::Conflict(_)));
}

#[tokio::test]
async fn expired_verification_token_is_not_found() {
    let h = harness();
    h.service.register("a@x.com", "Abcdef1!").await.unwrap();
    let p = h.principal("a@x.com").await;

    let expired = OpaqueToken {
        value: "expired-token".into(),
        expires_at: Utc::now() - Duration::seconds(1),
    };
    h.store.replace_verification_token(p.id, expired).await.unwrap();

    let err = h.service.verify("expired-token").await.unwrap_err();
    assert_eq!(err, DomainError::not_found("verification token expired"));
    assert!(!h.principal("a@x.com").await.enabled);
}

#[tokio::test]
async fn verification_token_is_single_use() {
    let h = harness();
    h.service.register("a@x.com", "Abcdef1!").await.unwrap();
    let token = h.verification_token("a@x.com").await;

    h.service.verify(&token).await.unwrap();
    let p = h.principal("a@x.com").await;
    assert!(p.enabled);
    assert!(p.verification.is_none());

    assert!(matches!(h.service.verify(&token).await, Err(DomainError::NotFound(_))));
}

#[tokio::test]
async fn resend_replaces_the_token() {
    let h = harness();
    h.service.register("a@x.com", "Abcdef1!").await.unwrap();
    let first = h.verification_token("a@x.com").await;

    h.service.resend_verification("a@x.com").await.unwrap();
    let second = h.verification_token("a@x.com").await;
    assert_ne!(first, second);

    assert!(matches!(h.service.verify(&first).await, Err(DomainError::NotFound(_))));
    h.service.verify(&second).await.unwrap();

    let err = h.service.resend_verification("a@x.com").await.unwrap_err();
    assert!(matches!(err, DomainError::InvalidState(_)));
    let err = h.service.resend_verification("nobody@x.com").await.unwrap_err();
    assert!(matches!(err, DomainError::NotFound(_)));
}

#[tokio::test]
async fn login_requires_verification_and_reports_roles() {
    let h = harness();
    h.service.register("a@x.com", "Abcdef1!").await.unwrap();

    let err = h.service.login("a@x.com", "Abcdef1!").await.unwrap_err();
    assert_eq!(err, DomainError::unauthenticated("account not verified"));

    let token = h.verification_token("a@x.com").await;
    h.service.verify(&token).await.unwrap();

    let login = h.service.login("a@x.com", "Abcdef1!").await.unwrap();
    let stored = h.principal("a@x.com").await;
    assert_eq!(login.roles, stored.roles);

    let claims = h.codec.parse_and_validate(&login.token).unwrap();
    assert_eq!(claims.subject(), "a@x.com");
    assert_eq!(claims.roles(), vec!["USER".to_string()]);
    assert_eq!(claims.user_id(), Some(stored.id));
}

#[tokio::test]
async fn wrong_email_and_wrong_password_look_the_same() {
    let h = harness();
    h.verified("a@x.com", "Abcdef1!").await;

    let wrong_password = h.service.login("a@x.com", "Wrong123!").await.unwrap_err();
    let wrong_email = h.service.login("b@x.com", "Abcdef1!").await.unwrap_err();
    assert_eq!(wrong_password, wrong_email);
    assert!(matches!(wrong_email, DomainError::Unauthenticated(_)));
}

#[tokio::test]
async fn password_reset_flow() {
    let h = harness();
    h.verified("a@x.com", "Abcdef1!").await;

    h.service.request_password_reset("a@x.com").await.unwrap();
    let token = h.reset_token("a@x.com").await;
    h.service.reset_password(&token, "Newpass1!").await.unwrap();

    assert!(h.service.login("a@x.com", "Abcdef1!").await.is_err());
    h.service.login("a@x.com", "Newpass1!").await.unwrap();

    assert!(h.principal("a@x.com").await.password_reset.is_none());
    assert!(matches!(h.service.reset_password(&token, "Other12!").await, Err(DomainError::NotFound(_))));
}

#[tokio::test]
async fn reused_password_is_rejected_without_writing() {
    let h = harness();
    h.verified("a@x.com", "Abcdef1!").await;
    h.service.request_password_reset("a@x.com").await.unwrap();
    let token = h.reset_token("a@x.com").await;

    let before = h.store.writes();
    let err = h.service.reset_password(&token, "Abcdef1!").await.unwrap_err();
    assert!(matches!(err, DomainError::InvalidArgument(_)));
    assert_eq!(h.store.writes(), before);
}

#[tokio::test]
async fn reset_request_requires_known_verified_account() {
    let h = harness();
    let err = h.service.request_password_reset("ghost@x.com").await.unwrap_err();
    assert!(matches!(err, DomainError::NotFound(_)));

    h.service.register("a@x.com", "Abcdef1!").await.unwrap();
    let err = h.service.request_password_reset("a@x.com").await.unwrap_err();
    assert!(matches!(err, DomainError::InvalidState(_)));
}

#[tokio::test]
async fn newer_reset_request_overwrites_older_token() {
    let h = harness();
    h.verified("a@x.com", "Abcdef1!").await;

    h.service.request_password_reset("a@x.com").await.unwrap();
    let first = h.reset_token("a@x.com").await;
    h.service.request_password_reset("a@x.com").await.unwrap();

    assert!(matches!(h.service.reset_password(&first, "Newpass1!").await, Err(DomainError::NotFound(_))));
}

#[tokio::test]
async fn expired_reset_token_is_not_found() {
    let h = harness();
    h.verified("a@x.com", "Abcdef1!").await;
    let p = h.principal("a@x.com").await;

    let expired = OpaqueToken {
        value: "old-reset".into(),
        expires_at: Utc::now() - Duration::minutes(1),
    };
    h.store.replace_password_reset_token(p.id, expired).await.unwrap();

    let err = h.service.reset_password("old-reset", "Newpass1!").await.unwrap_err();
    assert_eq!(err, DomainError::not_found("reset token expired"));
}

#[tokio::test]
async fn delivery_failure_keeps_the_account() {
    let store = Arc::new(InMemoryCredentialStore::new());
    let service = AuthService::new(
        store.clone(),
        Arc::new(PasswordHasher::with_cost(64, 1, 1).unwrap()),
        Arc::new(TokenCodec::from_key(&[42; 32], Duration::hours(1), Duration::hours(24)).unwrap()),
        Arc::new(FailingSender),
    );

    let err = service.register("a@x.com", "Abcdef1!").await.unwrap_err();
    assert!(matches!(err, DomainError::EmailDeliveryFailed(_)));

    let stored = store.find_by_email(&addr("a@x.com")).await.unwrap().unwrap();
    assert!(!stored.enabled);
    assert!(stored.verification.is_some());
}

#[tokio::test]
async fn concurrent_signups_yield_one_account() {
    let h = harness();
    let (a, b) = tokio::join!(
        h.service.register("race@x.com", "Abcdef1!"),
        h.service.register("race@x.com", "Abcdef1!"),
    );

    let outcomes = [a, b];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(outcomes.iter().any(|r| matches!(r, Err(DomainError::Conflict(_)))));
    assert_eq!(h.store.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn refresh_session_mints_access_token() {
    let h = harness();
    h.verified("a@x.com", "Abcdef1!").await;
    let p = h.principal("a@x.com").await;

    let refresh = h.codec.issue_refresh(&p).unwrap();
    let session = h.service.refresh_session(&refresh).await.unwrap();
    assert_eq!(h.codec.parse_and_validate(&session.token).unwrap().roles(), vec!["USER".to_string()]);

    let access = h.codec.issue(&p).unwrap();
    assert!(h.service.refresh_session(&access).await.is_err());
}
