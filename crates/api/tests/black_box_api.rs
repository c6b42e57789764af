use std::{collections::BTreeSet, sync::Arc};

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{Value, json};

use notas_api::app::{AppServices, build_app};
use notas_auth::{ConsoleEmailSender, EmailKind, PasswordHasher, Role, TokenCodec};
use notas_core::EmailAddress;

const KEY: &[u8] = b"black-box-test-signing-key-32byte";
const ADMIN_EMAIL: &str = "admin@notas.dev";
const ADMIN_PASSWORD: &str = "Admin123!";

struct TestServer {
    base_url: String,
    outbox: Arc<ConsoleEmailSender>,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, in-memory stores, bound to an ephemeral port.
        let outbox = Arc::new(ConsoleEmailSender::new("http://localhost:8080"));
        let codec = TokenCodec::from_key(KEY, Duration::hours(1), Duration::hours(24)).unwrap();
        let hasher = PasswordHasher::with_cost(64, 1, 1).unwrap();
        let services = AppServices::in_memory(codec, hasher, outbox.clone());
        services
            .accounts
            .provision(ADMIN_EMAIL, ADMIN_PASSWORD, Some(BTreeSet::from([Role::Admin])))
            .await
            .unwrap();

        let app = build_app(Arc::new(services));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            outbox,
            client: reqwest::Client::new(),
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn signup(&self, email: &str, password: &str) -> reqwest::Response {
        self.client
            .post(self.url("/api/auth/signup"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .unwrap()
    }

    async fn signin(&self, email: &str, password: &str) -> reqwest::Response {
        self.client
            .post(self.url("/api/auth/signin"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .unwrap()
    }

    async fn mailed_token(&self, email: &str, kind: EmailKind) -> String {
        self.outbox
            .last_token(&EmailAddress::parse(email).unwrap(), kind)
            .await
            .expect("no email captured")
    }

    async fn verify(&self, token: &str) -> reqwest::Response {
        self.client
            .get(self.url("/api/auth/verify"))
            .query(&[("token", token)])
            .send()
            .await
            .unwrap()
    }

    /// Signup + verify + signin; returns the bearer token.
    async fn verified_user(&self, email: &str, password: &str) -> String {
        assert_eq!(self.signup(email, password).await.status(), StatusCode::CREATED);
        let token = self.mailed_token(email, EmailKind::Verification).await;
        assert_eq!(self.verify(&token).await.status(), StatusCode::OK);
        self.token_for(email, password).await
    }

    async fn token_for(&self, email: &str, password: &str) -> String {
        let res = self.signin(email, password).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body: Value = res.json().await.unwrap();
        body["token"].as_str().unwrap().to_string()
    }

    async fn get(&self, path: &str, token: Option<&str>) -> reqwest::Response {
        let mut req = self.client.get(self.url(path));
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        req.send().await.unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn forged_jwt(key: &[u8], sub: &str, exp_offset: Duration) -> String {
    let now = Utc::now();
    let claims = json!({
        "sub": sub,
        "roles": ["ADMIN"],
        "iat": now.timestamp(),
        "exp": (now + exp_offset).timestamp(),
    });
    jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(key))
        .expect("failed to encode jwt")
}

#[tokio::test]
async fn signup_verify_signin_then_list_notes() {
    let srv = TestServer::spawn().await;

    let res = srv.signup("a@x.com", "Abcdef1!").await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["email"], "a@x.com");
    assert!(body["message"].is_string());

    let res = srv.get("/api/notas", None).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = srv.signin("a@x.com", "Abcdef1!").await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert!(body["message"].as_str().unwrap().contains("not verified"));

    let token = srv.mailed_token("a@x.com", EmailKind::Verification).await;
    assert_eq!(srv.verify(&token).await.status(), StatusCode::OK);

    let res = srv.signin("a@x.com", "Abcdef1!").await;
    assert_eq!(res.status(), StatusCode::OK);
    let login: Value = res.json().await.unwrap();
    assert_eq!(login["email"], "a@x.com");
    assert_eq!(login["roles"], json!(["ROLE_USER"]));
    let bearer = login["token"].as_str().unwrap();

    let res = srv.get("/api/notas", Some(bearer)).await;
    assert_eq!(res.status(), StatusCode::OK);
    let notes: Value = res.json().await.unwrap();
    assert_eq!(notes, json!([]));
}

#[tokio::test]
async fn concurrent_signups_with_same_email() {
    let srv = TestServer::spawn().await;

    let (a, b) = tokio::join!(
        srv.signup("race@x.com", "Abcdef1!"),
        srv.signup("race@x.com", "Abcdef1!"),
    );

    let mut statuses = vec![a.status(), b.status()];
    statuses.sort();
    assert_eq!(statuses, vec![StatusCode::CREATED, StatusCode::CONFLICT]);
}

#[tokio::test]
async fn unauthorized_entry_point_renders_uniform_body() {
    let srv = TestServer::spawn().await;

    let res = srv.get("/api/usuarios", None).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], 401);
    assert_eq!(body["error"], "Unauthorized");
    assert_eq!(body["path"], "/api/usuarios");
    assert!(body["message"].is_string());
    assert!(body["timestamp"].is_string());
    assert!(body.get("validationErrors").is_none());
}

#[tokio::test]
async fn framework_rejections_use_uniform_body() {
    let srv = TestServer::spawn().await;
    let user = srv.verified_user("u@x.com", "Abcdef1!").await;

    let res = srv
        .client
        .post(srv.url("/api/notas/0190c0de-0000-7000-8000-000000000000"))
        .bearer_auth(&user)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert!(res.headers().contains_key("allow"));
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], 405);
    assert_eq!(body["error"], "Method Not Allowed");
    assert_eq!(body["path"], "/api/notas/0190c0de-0000-7000-8000-000000000000");
    assert!(body["message"].is_string());
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn role_gates_distinguish_401_and_403() {
    let srv = TestServer::spawn().await;
    let user = srv.verified_user("u@x.com", "Abcdef1!").await;
    let admin = srv.token_for(ADMIN_EMAIL, ADMIN_PASSWORD).await;

    assert_eq!(srv.get("/api/usuarios", Some(&user)).await.status(), StatusCode::FORBIDDEN);
    assert_eq!(srv.get("/api/admin", Some(&user)).await.status(), StatusCode::FORBIDDEN);
    assert_eq!(srv.get("/api/usuarios", Some(&admin)).await.status(), StatusCode::OK);
    assert_eq!(srv.get("/api/admin", Some(&admin)).await.status(), StatusCode::OK);
    assert_eq!(srv.get("/api/notas", Some(&admin)).await.status(), StatusCode::OK);

    let res = srv.get("/api/me", Some(&user)).await;
    assert_eq!(res.status(), StatusCode::OK);
    let me: Value = res.json().await.unwrap();
    assert_eq!(me["email"], "u@x.com");
    assert_eq!(me["authorities"], json!(["ROLE_USER"]));
}

#[tokio::test]
async fn invalid_tokens_are_treated_as_anonymous() {
    let srv = TestServer::spawn().await;
    srv.verified_user("a@x.com", "Abcdef1!").await;

    let wrong_key = forged_jwt(b"some-other-signing-key-of-32-byte", "a@x.com", Duration::minutes(10));
    let expired = forged_jwt(KEY, "a@x.com", Duration::minutes(-10));
    let unknown = forged_jwt(KEY, "ghost@x.com", Duration::minutes(10));

    for token in [wrong_key.as_str(), expired.as_str(), unknown.as_str(), "garbage"] {
        assert_eq!(srv.get("/api/notas", Some(token)).await.status(), StatusCode::UNAUTHORIZED);
    }

    // Public routes stay reachable with a bad token.
    let res = srv
        .client
        .post(srv.url("/api/auth/signin"))
        .bearer_auth("garbage")
        .json(&json!({ "email": "a@x.com", "password": "Abcdef1!" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn signup_validation_and_conflicts() {
    let srv = TestServer::spawn().await;

    let res = srv.signup("a@x.com", "weak").await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert!(body["validationErrors"]["password"].is_string());
    assert_eq!(body["path"], "/api/auth/signup");

    let res = srv
        .client
        .post(srv.url("/api/auth/signup"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    assert_eq!(srv.signup("a@x.com", "Abcdef1!").await.status(), StatusCode::CREATED);
    assert_eq!(srv.signup("a@x.com", "Abcdef1!").await.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn verification_edge_cases() {
    let srv = TestServer::spawn().await;
    assert_eq!(srv.verify("no-such-token").await.status(), StatusCode::NOT_FOUND);

    srv.signup("a@x.com", "Abcdef1!").await;
    let first = srv.mailed_token("a@x.com", EmailKind::Verification).await;

    let resend = |email: &'static str| {
        srv.client
            .post(srv.url("/api/auth/resend-verification"))
            .query(&[("email", email)])
            .send()
    };

    assert_eq!(resend("a@x.com").await.unwrap().status(), StatusCode::OK);
    assert_eq!(resend("nobody@x.com").await.unwrap().status(), StatusCode::NOT_FOUND);

    let second = srv.mailed_token("a@x.com", EmailKind::Verification).await;
    assert_ne!(first, second);
    assert_eq!(srv.verify(&first).await.status(), StatusCode::NOT_FOUND);
    assert_eq!(srv.verify(&second).await.status(), StatusCode::OK);
    assert_eq!(srv.verify(&second).await.status(), StatusCode::NOT_FOUND);

    assert_eq!(resend("a@x.com").await.unwrap().status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn forgot_password_never_reveals_accounts() {
    let srv = TestServer::spawn().await;
    srv.verified_user("a@x.com", "Abcdef1!").await;
    srv.signup("unverified@x.com", "Abcdef1!").await;

    let forgot = |email: &'static str| {
        srv.client
            .post(srv.url("/api/auth/forgot-password"))
            .query(&[("email", email)])
            .send()
    };

    for email in ["ghost@x.com", "unverified@x.com", "a@x.com"] {
        assert_eq!(forgot(email).await.unwrap().status(), StatusCode::OK);
    }

    let token = srv.mailed_token("a@x.com", EmailKind::PasswordReset).await;
    let reset = |token: String, password: &'static str| {
        srv.client
            .post(srv.url("/api/auth/reset-password"))
            .json(&json!({ "token": token, "newPassword": password }))
            .send()
    };

    assert_eq!(reset(token.clone(), "Abcdef1!").await.unwrap().status(), StatusCode::BAD_REQUEST);
    assert_eq!(reset(token.clone(), "Newpass1!").await.unwrap().status(), StatusCode::OK);
    assert_eq!(reset(token, "Other123!").await.unwrap().status(), StatusCode::NOT_FOUND);

    assert_eq!(srv.signin("a@x.com", "Abcdef1!").await.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(srv.signin("a@x.com", "Newpass1!").await.status(), StatusCode::OK);
}

#[tokio::test]
async fn notes_are_owner_scoped() {
    let srv = TestServer::spawn().await;
    let alice = srv.verified_user("alice@x.com", "Abcdef1!").await;
    let bob = srv.verified_user("bob@x.com", "Abcdef1!").await;

    let res = srv
        .client
        .post(srv.url("/api/notas"))
        .bearer_auth(&alice)
        .json(&json!({ "title": "Groceries", "content": "milk, eggs" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let note: Value = res.json().await.unwrap();
    let id = note["id"].as_str().unwrap().to_string();

    let path = format!("/api/notas/{id}");
    assert_eq!(srv.get(&path, Some(&alice)).await.status(), StatusCode::OK);
    assert_eq!(srv.get(&path, Some(&bob)).await.status(), StatusCode::FORBIDDEN);
    assert_eq!(srv.get("/api/notas/not-a-uuid", Some(&alice)).await.status(), StatusCode::BAD_REQUEST);

    let res = srv
        .client
        .put(srv.url(&path))
        .bearer_auth(&alice)
        .json(&json!({ "title": "Groceries", "content": "milk, eggs, bread" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let updated: Value = res.json().await.unwrap();
    assert_eq!(updated["content"], "milk, eggs, bread");

    let bobs_list: Value = srv.get("/api/notas", Some(&bob)).await.json().await.unwrap();
    assert_eq!(bobs_list, json!([]));

    let res = srv.client.delete(srv.url(&path)).bearer_auth(&alice).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    assert_eq!(srv.get(&path, Some(&alice)).await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn profiles_and_favorites() {
    let srv = TestServer::spawn().await;
    let alice = srv.verified_user("alice@x.com", "Abcdef1!").await;
    let bob = srv.verified_user("bob@x.com", "Abcdef1!").await;

    let me: Value = srv.get("/api/me", Some(&alice)).await.json().await.unwrap();
    let alice_id = me["userId"].as_str().unwrap().to_string();

    let note: Value = srv
        .client
        .post(srv.url("/api/notas"))
        .bearer_auth(&alice)
        .json(&json!({ "title": "Fav", "content": "keep" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let note_id = note["id"].as_str().unwrap();

    let profile_path = format!("/api/perfiles/{alice_id}");
    let profile: Value = srv.get(&profile_path, Some(&alice)).await.json().await.unwrap();
    assert_eq!(profile["favoriteNotes"], json!([]));
    assert_eq!(srv.get(&profile_path, Some(&bob)).await.status(), StatusCode::FORBIDDEN);

    let fav_url = srv.url(&format!("{profile_path}/favoritas/{note_id}"));
    for _ in 0..2 {
        let res = srv.client.post(&fav_url).bearer_auth(&alice).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }
    let profile: Value = srv.get(&profile_path, Some(&alice)).await.json().await.unwrap();
    assert_eq!(profile["favoriteNotes"], json!([note_id]));

    let res = srv
        .client
        .put(srv.url(&profile_path))
        .bearer_auth(&alice)
        .json(&json!({ "displayName": "Alice" }))
        .send()
        .await
        .unwrap();
    let profile: Value = res.json().await.unwrap();
    assert_eq!(profile["displayName"], "Alice");

    let res = srv.client.delete(&fav_url).bearer_auth(&alice).send().await.unwrap();
    let profile: Value = res.json().await.unwrap();
    assert_eq!(profile["favoriteNotes"], json!([]));
}

#[tokio::test]
async fn admin_created_accounts_skip_verification() {
    let srv = TestServer::spawn().await;
    let admin = srv.token_for(ADMIN_EMAIL, ADMIN_PASSWORD).await;

    let res = srv
        .client
        .post(srv.url("/api/usuarios"))
        .bearer_auth(&admin)
        .json(&json!({ "email": "staff@x.com", "password": "Abcdef1!", "roles": ["ADMIN"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: Value = res.json().await.unwrap();
    assert_eq!(created["enabled"], true);
    let id = created["id"].as_str().unwrap().to_string();

    let staff = srv.token_for("staff@x.com", "Abcdef1!").await;
    assert_eq!(srv.get("/api/usuarios", Some(&staff)).await.status(), StatusCode::OK);
    assert!(srv.outbox.outbox().await.is_empty());

    let res = srv
        .client
        .delete(srv.url(&format!("/api/usuarios/{id}")))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    assert_eq!(srv.get("/api/usuarios", Some(&staff)).await.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn health_and_preflight_are_public() {
    let srv = TestServer::spawn().await;
    assert_eq!(srv.get("/health", None).await.status(), StatusCode::OK);

    let res = srv
        .client
        .request(reqwest::Method::OPTIONS, srv.url("/api/notas"))
        .header("origin", "http://example.com")
        .header("access-control-request-method", "GET")
        .send()
        .await
        .unwrap();
    assert!(res.status().is_success());
}
