use std::net::TcpListener;
use std::sync::Arc;

use reqwest::StatusCode;
use rt_auth::auth::{AuthService, PasswordHasher, TokenIssuer, TokenVerifier, MIN_BCRYPT_COST};
use rt_auth::configuration::JwtSettings;
use rt_auth::startup::run;
use rt_auth::store::{InMemoryUserStore, UserStore};
use serde_json::{json, Value};

pub struct TestApp {
    pub address: String,
    pub store: Arc<InMemoryUserStore>,
    pub jwt: JwtSettings,
    pub client: reqwest::Client,
}

fn jwt_settings() -> JwtSettings {
    JwtSettings {
        access_secret: "integration-access-secret-0123456789abcdef".to_string(),
        refresh_secret: "integration-refresh-secret-0123456789abcdef".to_string(),
        access_token_expiry: 900,
        refresh_token_expiry: 604800,
        issuer: "rt_auth-tests".to_string(),
    }
}

async fn spawn_app() -> TestApp {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    let jwt = jwt_settings();
    let store = Arc::new(InMemoryUserStore::new());
    let service = AuthService::new(
        store.clone(),
        PasswordHasher::new(MIN_BCRYPT_COST),
        TokenIssuer::new(&jwt),
    );

    let server = run(listener, service, TokenVerifier::new(&jwt)).expect("Failed to bind address");
    let _ = tokio::spawn(server);

    TestApp {
        address,
        store,
        jwt,
        client: reqwest::Client::new(),
    }
}

impl TestApp {
    async fn post_credentials(&self, path: &str, email: &str, password: &str) -> reqwest::Response {
        self.client
            .post(&format!("{}{}", self.address, path))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    async fn sign_up(&self, email: &str, password: &str) -> reqwest::Response {
        self.post_credentials("/auth/local/signup", email, password).await
    }

    async fn sign_in(&self, email: &str, password: &str) -> reqwest::Response {
        self.post_credentials("/auth/local/signin", email, password).await
    }

    async fn post_with_bearer(&self, path: &str, token: &str) -> reqwest::Response {
        self.client
            .post(&format!("{}{}", self.address, path))
            .bearer_auth(token)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    async fn refresh(&self, refresh_token: &str) -> reqwest::Response {
        self.post_with_bearer("/auth/refresh", refresh_token).await
    }

    async fn logout(&self, access_token: &str) -> reqwest::Response {
        self.post_with_bearer("/auth/logout", access_token).await
    }
}

struct Pair {
    access_token: String,
    refresh_token: String,
}

async fn tokens_of(response: reqwest::Response) -> Pair {
    let body: Value = response.json().await.expect("Failed to parse response");
    Pair {
        access_token: body["access_token"].as_str().expect("missing access_token").to_string(),
        refresh_token: body["refresh_token"].as_str().expect("missing refresh_token").to_string(),
    }
}

async fn error_code_of(response: reqwest::Response) -> String {
    let body: Value = response.json().await.expect("Failed to parse error body");
    body["code"].as_str().unwrap_or_default().to_string()
}

// --- Sign-up ---

#[tokio::test]
async fn sign_up_returns_201_with_token_pair() {
    let app = spawn_app().await;

    let response = app.sign_up("a@x.com", "pw123").await;
    assert_eq!(StatusCode::CREATED, response.status());

    let pair = tokens_of(response).await;
    assert_eq!(pair.access_token.split('.').count(), 3);
    assert_eq!(pair.refresh_token.split('.').count(), 3);

    let user = app
        .store
        .find_by_email("a@x.com")
        .await
        .unwrap()
        .expect("user was not stored");
    assert!(user.hashed_rt.is_some());
    assert_ne!(user.password_hash, "pw123");
}

#[tokio::test]
async fn sign_up_returns_409_for_duplicate_email() {
    let app = spawn_app().await;

    assert_eq!(StatusCode::CREATED, app.sign_up("a@x.com", "pw123").await.status());

    let response = app.sign_up("a@x.com", "pw123").await;
    assert_eq!(StatusCode::CONFLICT, response.status());
    assert_eq!(error_code_of(response).await, "DUPLICATE_EMAIL");
}

#[tokio::test]
async fn sign_up_returns_400_for_invalid_input() {
    let app = spawn_app().await;

    let cases = vec![
        ("notanemail", "pw123", "invalid email"),
        ("user@@example.com", "pw123", "double at"),
        ("a@x.com", "", "empty password"),
    ];

    for (email, password, reason) in cases {
        let response = app.sign_up(email, password).await;
        assert_eq!(
            StatusCode::BAD_REQUEST,
            response.status(),
            "Should reject: {}",
            reason
        );
    }
}

#[tokio::test]
async fn sign_up_returns_400_for_missing_fields() {
    let app = spawn_app().await;

    let cases = vec![
        (json!({"password": "pw123"}), "missing email"),
        (json!({"email": "a@x.com"}), "missing password"),
        (json!({}), "missing all fields"),
    ];

    for (body, reason) in cases {
        let response = app
            .client
            .post(&format!("{}/auth/local/signup", app.address))
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request.");

        assert_eq!(
            StatusCode::BAD_REQUEST,
            response.status(),
            "Should reject: {}",
            reason
        );
    }
}

// --- Sign-in ---

#[tokio::test]
async fn sign_in_after_sign_up_returns_new_pair() {
    let app = spawn_app().await;
    let first = tokens_of(app.sign_up("a@x.com", "pw123").await).await;

    let response = app.sign_in("a@x.com", "pw123").await;
    assert_eq!(StatusCode::OK, response.status());

    let second = tokens_of(response).await;
    assert_ne!(first.access_token, second.access_token);
    assert_ne!(first.refresh_token, second.refresh_token);
}

#[tokio::test]
async fn sign_in_failures_are_indistinguishable() {
    let app = spawn_app().await;
    app.sign_up("a@x.com", "pw123").await;

    let wrong_password = app.sign_in("a@x.com", "wrong").await;
    let unknown_email = app.sign_in("nobody@x.com", "pw123").await;

    assert_eq!(StatusCode::UNAUTHORIZED, wrong_password.status());
    assert_eq!(StatusCode::UNAUTHORIZED, unknown_email.status());

    let wrong_password: Value = wrong_password.json().await.unwrap();
    let unknown_email: Value = unknown_email.json().await.unwrap();
    assert_eq!(wrong_password["code"], "ACCESS_DENIED");
    assert_eq!(wrong_password["code"], unknown_email["code"]);
    assert_eq!(wrong_password["message"], unknown_email["message"]);
}

// --- Refresh ---

#[tokio::test]
async fn refresh_rotates_and_rejects_replay() {
    let app = spawn_app().await;
    app.sign_up("a@x.com", "pw123").await;
    let t1 = tokens_of(app.sign_in("a@x.com", "pw123").await).await;

    let response = app.refresh(&t1.refresh_token).await;
    assert_eq!(StatusCode::OK, response.status());
    let t2 = tokens_of(response).await;
    assert_ne!(t1.refresh_token, t2.refresh_token);

    let replay = app.refresh(&t1.refresh_token).await;
    assert_eq!(StatusCode::UNAUTHORIZED, replay.status());
    assert_eq!(error_code_of(replay).await, "ACCESS_DENIED");

    assert_eq!(StatusCode::OK, app.refresh(&t2.refresh_token).await.status());
}

#[tokio::test]
async fn refresh_rejects_access_token() {
    let app = spawn_app().await;
    let pair = tokens_of(app.sign_up("a@x.com", "pw123").await).await;

    let response = app.refresh(&pair.access_token).await;
    assert_eq!(StatusCode::UNAUTHORIZED, response.status());
    assert_eq!(error_code_of(response).await, "TOKEN_INVALID");
}

#[tokio::test]
async fn refresh_requires_bearer_token() {
    let app = spawn_app().await;

    let response = app
        .client
        .post(&format!("{}/auth/refresh", app.address))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(StatusCode::UNAUTHORIZED, response.status());
}

#[tokio::test]
async fn refresh_rejects_token_signed_with_another_secret() {
    let app = spawn_app().await;
    app.sign_up("a@x.com", "pw123").await;

    let mut foreign = app.jwt.clone();
    foreign.refresh_secret = "some-other-refresh-secret-0123456789abcdef".to_string();
    let user = app.store.find_by_email("a@x.com").await.unwrap().unwrap();
    let forged = TokenIssuer::new(&foreign)
        .issue_refresh_token(user.id, &user.email)
        .unwrap();

    assert_eq!(StatusCode::UNAUTHORIZED, app.refresh(&forged).await.status());
}

#[tokio::test]
async fn concurrent_refresh_with_same_token_succeeds_once() {
    let app = spawn_app().await;
    let pair = tokens_of(app.sign_up("a@x.com", "pw123").await).await;

    let (first, second) = tokio::join!(
        app.refresh(&pair.refresh_token),
        app.refresh(&pair.refresh_token)
    );

    let mut statuses = vec![first.status().as_u16(), second.status().as_u16()];
    statuses.sort();
    assert_eq!(statuses, vec![200, 401]);
}

// --- Logout ---

#[tokio::test]
async fn logout_revokes_refresh_token() {
    let app = spawn_app().await;
    let pair = tokens_of(app.sign_up("a@x.com", "pw123").await).await;

    assert_eq!(StatusCode::OK, app.logout(&pair.access_token).await.status());

    let user = app.store.find_by_email("a@x.com").await.unwrap().unwrap();
    assert_eq!(user.hashed_rt, None);

    assert_eq!(
        StatusCode::UNAUTHORIZED,
        app.refresh(&pair.refresh_token).await.status()
    );

    // Idempotent while the access token is still valid
    assert_eq!(StatusCode::OK, app.logout(&pair.access_token).await.status());
}

#[tokio::test]
async fn logout_rejects_refresh_token_as_bearer() {
    let app = spawn_app().await;
    let pair = tokens_of(app.sign_up("a@x.com", "pw123").await).await;

    assert_eq!(
        StatusCode::UNAUTHORIZED,
        app.logout(&pair.refresh_token).await.status()
    );
}

// --- Full flow ---

#[tokio::test]
async fn sign_up_sign_in_refresh_replay_sequence() {
    let app = spawn_app().await;

    let t0 = tokens_of(app.sign_up("a@x.com", "pw123").await).await;
    let t1 = tokens_of(app.sign_in("a@x.com", "pw123").await).await;
    assert_ne!(t0.refresh_token, t1.refresh_token);

    // Prior session silently superseded
    assert_eq!(StatusCode::UNAUTHORIZED, app.refresh(&t0.refresh_token).await.status());

    let t2 = tokens_of(app.refresh(&t1.refresh_token).await).await;
    assert_ne!(t1.refresh_token, t2.refresh_token);
    assert_eq!(StatusCode::UNAUTHORIZED, app.refresh(&t1.refresh_token).await.status());
}
