use std::sync::Arc;

use axum::extract::FromRef;
use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method,
};
use axum::routing::{get, patch, post};
use axum::{middleware, Router};
use common_audit::AuditRecorder;
use common_auth::{Authenticator, IdentityResolver, TokenCodec};
use common_observability::SecurityMetrics;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::admin_handlers::{
    approve_event, counts, delete_event_as_admin, edit_event_as_admin, list_events_for_moderation,
    list_user_events, list_users, recent_activity, reject_event, search_users, set_user_active,
    set_user_banned, set_user_role,
};
use crate::auth_handlers::{login, me, register};
use crate::config::ServiceConfig;
use crate::event_handlers::{create_event, delete_event, get_event, list_events, my_events, update_event};
use crate::metrics::{metrics_endpoint, track_http_errors};
use crate::store::{EventStore, Stores, UserStore};

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub events: Arc<dyn EventStore>,
    pub authenticator: Arc<Authenticator>,
    pub audit: Arc<AuditRecorder>,
    pub metrics: Arc<SecurityMetrics>,
    pub config: Arc<ServiceConfig>,
}

impl FromRef<AppState> for Arc<Authenticator> {
    fn from_ref(state: &AppState) -> Self {
        state.authenticator.clone()
    }
}

impl FromRef<AppState> for Arc<ServiceConfig> {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl AppState {
    pub fn new(config: ServiceConfig, stores: Stores) -> Self {
        let metrics = Arc::new(SecurityMetrics::new());
        let codec = TokenCodec::new(config.token_config());
        let authenticator = Authenticator::new(codec, IdentityResolver::new(stores.directory))
            .with_account_status_enforcement(config.enforce_account_status)
            .with_metrics(metrics.clone());
        let audit = AuditRecorder::new(stores.audit).with_metrics(metrics.clone());
        Self {
            users: stores.users,
            events: stores.events,
            authenticator: Arc::new(authenticator),
            audit: Arc::new(audit),
            metrics,
            config: Arc::new(config),
        }
    }

    pub fn codec(&self) -> &TokenCodec {
        self.authenticator.codec()
    }
}

async fn health() -> &'static str {
    "ok"
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list([
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://localhost:5173"),
        ]))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([ACCEPT, CONTENT_TYPE, AUTHORIZATION]);

    Router::new()
        .route("/healthz", get(health))
        .route("/metrics", get(metrics_endpoint))
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/me", get(me))
        .route("/api/events", get(list_events).post(create_event))
        .route("/api/events/my-events", get(my_events))
        .route(
            "/api/events/:id",
            get(get_event).put(update_event).delete(delete_event),
        )
        .route("/api/admin/users", get(list_users))
        .route("/api/admin/users/search", get(search_users))
        .route("/api/admin/users/:id/active", patch(set_user_active))
        .route("/api/admin/users/:id/ban", patch(set_user_banned))
        .route("/api/admin/users/:id/role", patch(set_user_role))
        .route("/api/admin/users/:id/events", get(list_user_events))
        .route("/api/admin/events", get(list_events_for_moderation))
        .route("/api/admin/events/:id/approve", post(approve_event))
        .route("/api/admin/events/:id/reject", post(reject_event))
        .route(
            "/api/admin/events/:id",
            axum::routing::put(edit_event_as_admin).delete(delete_event_as_admin),
        )
        .route("/api/admin/analytics/counts", get(counts))
        .route("/api/admin/analytics/recent-activity", get(recent_activity))
        .layer(middleware::from_fn_with_state(state.clone(), track_http_errors))
        .layer(cors)
        .with_state(state)
}
