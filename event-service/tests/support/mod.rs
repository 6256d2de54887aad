use std::sync::Arc;

use argon2::{password_hash::SaltString, Argon2, PasswordHasher};
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use common_audit::InMemoryAuditStore;
use common_auth::Role;
use event_service::config::ServiceConfig;
use event_service::store::{
    EventStore, InMemoryEventStore, InMemoryUserStore, Stores, UserRecord, UserStore,
};
use event_service::{build_router, AppState};
use http_body_util::BodyExt;
use rand_core::OsRng;
use serde_json::Value;
use tower::util::ServiceExt;

pub const TEST_SECRET: &str = "test-secret-0123456789abcdef";
pub const PASSWORD: &str = "CorrectHorseBatteryStaple!";

#[allow(dead_code)]
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub users: Arc<InMemoryUserStore>,
    pub audit: Arc<InMemoryAuditStore>,
}

#[allow(dead_code)]
pub struct TestResponse {
    pub status: StatusCode,
    pub error_code: Option<String>,
    pub body: Value,
}

#[allow(dead_code)]
impl TestApp {
    pub fn new() -> Self {
        Self::with_config(ServiceConfig::with_secret(TEST_SECRET))
    }

    pub fn with_config(config: ServiceConfig) -> Self {
        Self::build(config, Arc::new(InMemoryEventStore::new()))
    }

    pub fn with_event_store(events: Arc<dyn EventStore>) -> Self {
        Self::build(ServiceConfig::with_secret(TEST_SECRET), events)
    }

    fn build(config: ServiceConfig, events: Arc<dyn EventStore>) -> Self {
        let users = Arc::new(InMemoryUserStore::new());
        let audit = Arc::new(InMemoryAuditStore::new());
        let stores = Stores {
            users: users.clone(),
            directory: users.clone(),
            events,
            audit: audit.clone(),
        };
        let state = AppState::new(config, stores);
        Self {
            router: build_router(state.clone()),
            state,
            users,
            audit,
        }
    }

    pub async fn seed_user(&self, email: &str, role: Role) -> UserRecord {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(PASSWORD.as_bytes(), &salt)
            .expect("hash")
            .to_string();
        self.users
            .insert(UserRecord::new(email.to_string(), None, role, hash))
            .await
            .expect("seed user")
    }

    pub fn token_for(&self, email: &str, role: Role) -> String {
        self.state.codec().issue(email, role).expect("issue").token
    }

    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        match body {
            Some(json) => self.send_raw(method, uri, token, json.to_string()).await,
            None => self.send_raw(method, uri, token, String::new()).await,
        }
    }

    /// Sends `body` verbatim; a non-empty body is labelled as JSON.
    pub async fn send_raw(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: String,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        if !body.is_empty() {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
        }
        let request = builder.body(Body::from(body)).expect("request");

        let response = self.router.clone().oneshot(request).await.expect("oneshot");
        let status = response.status();
        let error_code = response
            .headers()
            .get("X-Error-Code")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.into_body().collect().await.expect("body").to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        TestResponse {
            status,
            error_code,
            body,
        }
    }
}
