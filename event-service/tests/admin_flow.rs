mod support;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::StatusCode;
use chrono::{Duration, Utc};
use common_audit::AuditAction;
use common_auth::Role;
use event_service::store::{
    ApprovalStatus, EventDetails, EventRecord, EventStore, InMemoryEventStore, StoreResult, UserStore,
};
use serde_json::{json, Value};
use support::TestApp;
use tokio::sync::Notify;
use uuid::Uuid;

fn event_body(title: &str) -> Value {
    json!({
        "title": title,
        "description": "bring a laptop",
        "start_time": (Utc::now() + Duration::days(7)).to_rfc3339(),
        "location": "Building 14",
        "category": "Tech",
    })
}

#[tokio::test]
async fn demoted_admin_is_refused_with_old_token() {
    let app = TestApp::new();
    let alice = app.seed_user("alice@x.com", Role::Admin).await;
    app.seed_user("root@x.com", Role::Admin).await;
    let stu = app.seed_user("stu@x.com", Role::Student).await;
    let alice_token = app.token_for("alice@x.com", Role::Admin);
    let root_token = app.token_for("root@x.com", Role::Admin);

    let ok = app.send("GET", "/api/admin/users", Some(&alice_token), None).await;
    assert_eq!(ok.status, StatusCode::OK);
    assert_eq!(ok.body.as_array().unwrap().len(), 3);

    let demote = app
        .send(
            "PATCH",
            &format!("/api/admin/users/{}/role", alice.id),
            Some(&root_token),
            Some(json!({"role": "user"})),
        )
        .await;
    assert_eq!(demote.status, StatusCode::OK);
    assert_eq!(demote.body["role"], "STUDENT");

    // Same token, still unexpired.
    let denied = app
        .send(
            "PATCH",
            &format!("/api/admin/users/{}/ban", stu.id),
            Some(&alice_token),
            Some(json!({"banned": true})),
        )
        .await;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);
    assert_eq!(denied.error_code.as_deref(), Some("missing_role"));
    assert_eq!(denied.body["required_roles"], json!(["ADMIN"]));

    let still_active = app.users.find_by_email("stu@x.com").await.unwrap().unwrap();
    assert!(!still_active.banned);
    let actions: Vec<AuditAction> = app.audit.snapshot().await.iter().map(|e| e.action).collect();
    assert_eq!(actions, vec![AuditAction::UserRole]);
}

#[tokio::test]
async fn forged_role_claim_does_not_grant_admin() {
    let app = TestApp::new();
    app.seed_user("stu@x.com", Role::Student).await;
    let forged = app.token_for("stu@x.com", Role::Admin);

    let resp = app.send("GET", "/api/admin/users", Some(&forged), None).await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);
    assert_eq!(resp.error_code.as_deref(), Some("missing_role"));
}

#[tokio::test]
async fn audit_is_written_only_after_a_successful_mutation() {
    let app = TestApp::new();
    let admin = app.seed_user("admin@x.com", Role::Admin).await;
    let stu = app.seed_user("stu@x.com", Role::Student).await;
    let token = app.token_for("admin@x.com", Role::Admin);

    let missing = app
        .send(
            "PATCH",
            &format!("/api/admin/users/{}/ban", Uuid::new_v4()),
            Some(&token),
            Some(json!({"banned": true})),
        )
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert_eq!(missing.error_code.as_deref(), Some("user_not_found"));
    assert!(app.audit.is_empty().await);

    let bad_role = app
        .send(
            "PATCH",
            &format!("/api/admin/users/{}/role", stu.id),
            Some(&token),
            Some(json!({"role": "wizard"})),
        )
        .await;
    assert_eq!(bad_role.status, StatusCode::BAD_REQUEST);
    assert!(app.audit.is_empty().await);

    let banned = app
        .send(
            "PATCH",
            &format!("/api/admin/users/{}/ban", stu.id),
            Some(&token),
            Some(json!({"banned": true})),
        )
        .await;
    assert_eq!(banned.status, StatusCode::OK);
    assert_eq!(banned.body["banned"], true);

    let entries = app.audit.snapshot().await;
    assert_eq!(entries.len(), 1);
    let entry = &entries[0];
    assert_eq!(entry.actor_id, admin.id);
    assert_eq!(entry.action, AuditAction::UserBan);
    assert_eq!(entry.subject_id, Some(stu.id));
    assert_eq!(entry.meta, json!({"banned": true}));

    let deactivated = app
        .send(
            "PATCH",
            &format!("/api/admin/users/{}/active", stu.id),
            Some(&token),
            Some(json!({"active": false})),
        )
        .await;
    assert_eq!(deactivated.status, StatusCode::OK);
    let last = app.audit.snapshot().await.pop().unwrap();
    assert_eq!(last.action, AuditAction::UserDeactivate);
    assert_eq!(last.meta, json!({"active": false}));
}

#[tokio::test]
async fn organizer_events_go_through_moderation() {
    let app = TestApp::new();
    app.seed_user("org@x.com", Role::Organizer).await;
    app.seed_user("admin@x.com", Role::Admin).await;
    app.seed_user("stu@x.com", Role::Student).await;
    let org = app.token_for("org@x.com", Role::Organizer);
    let admin = app.token_for("admin@x.com", Role::Admin);
    let stu = app.token_for("stu@x.com", Role::Student);

    let refused = app.send("POST", "/api/events", Some(&stu), Some(event_body("Nope"))).await;
    assert_eq!(refused.status, StatusCode::FORBIDDEN);
    assert_eq!(refused.error_code.as_deref(), Some("missing_role"));

    let created = app.send("POST", "/api/events", Some(&org), Some(event_body("Rust Night"))).await;
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(created.body["approval_status"], "PENDING");
    assert_eq!(created.body["organizer_email"], "org@x.com");
    let id = created.body["id"].as_str().unwrap().to_string();

    let public = app.send("GET", "/api/events", None, None).await;
    assert_eq!(public.body.as_array().unwrap().len(), 0);

    let pending = app.send("GET", "/api/admin/events?status=pending", Some(&admin), None).await;
    assert_eq!(pending.body.as_array().unwrap().len(), 1);

    let rejected = app
        .send(
            "POST",
            &format!("/api/admin/events/{id}/reject"),
            Some(&admin),
            Some(json!({"reason": "missing venue details"})),
        )
        .await;
    assert_eq!(rejected.body["approval_status"], "REJECTED");
    assert_eq!(rejected.body["rejection_reason"], "missing venue details");

    let approved = app
        .send("POST", &format!("/api/admin/events/{id}/approve"), Some(&admin), None)
        .await;
    assert_eq!(approved.status, StatusCode::OK);
    assert_eq!(approved.body["approval_status"], "APPROVED");
    assert_eq!(approved.body["rejection_reason"], Value::Null);

    let public = app.send("GET", "/api/events?q=rust", None, None).await;
    assert_eq!(public.body.as_array().unwrap().len(), 1);

    let mine = app.send("GET", "/api/events/my-events", Some(&org), None).await;
    assert_eq!(mine.body.as_array().unwrap().len(), 1);

    let by_admin = app.send("POST", "/api/events", Some(&admin), Some(event_body("Town Hall"))).await;
    assert_eq!(by_admin.body["approval_status"], "APPROVED");

    let actions: Vec<AuditAction> = app.audit.snapshot().await.iter().map(|e| e.action).collect();
    assert_eq!(actions, vec![AuditAction::EventReject, AuditAction::EventApprove]);
}

#[tokio::test]
async fn ownership_gate_on_event_update_and_delete() {
    let app = TestApp::new();
    app.seed_user("owner@x.com", Role::Organizer).await;
    app.seed_user("other@x.com", Role::Organizer).await;
    app.seed_user("admin@x.com", Role::Admin).await;
    let owner = app.token_for("owner@x.com", Role::Organizer);
    let other = app.token_for("other@x.com", Role::Organizer);
    let admin = app.token_for("admin@x.com", Role::Admin);

    let created = app.send("POST", "/api/events", Some(&owner), Some(event_body("Owned"))).await;
    let id = created.body["id"].as_str().unwrap().to_string();
    let uri = format!("/api/events/{id}");

    let hijack = app.send("PUT", &uri, Some(&other), Some(event_body("Hijacked"))).await;
    assert_eq!(hijack.status, StatusCode::FORBIDDEN);
    assert_eq!(hijack.error_code.as_deref(), Some("ownership_violation"));

    let own_edit = app.send("PUT", &uri, Some(&owner), Some(event_body("Owned v2"))).await;
    assert_eq!(own_edit.status, StatusCode::OK);
    assert_eq!(own_edit.body["title"], "Owned v2");

    let admin_edit = app.send("PUT", &uri, Some(&admin), Some(event_body("Owned v3"))).await;
    assert_eq!(admin_edit.status, StatusCode::OK);

    let past = app
        .send(
            "PUT",
            &uri,
            Some(&owner),
            Some(json!({
                "title": "Late",
                "location": "Hall",
                "category": "Tech",
                "start_time": (Utc::now() - Duration::days(1)).to_rfc3339(),
            })),
        )
        .await;
    assert_eq!(past.status, StatusCode::BAD_REQUEST);

    let blocked = app.send("DELETE", &uri, Some(&other), None).await;
    assert_eq!(blocked.status, StatusCode::FORBIDDEN);

    let deleted = app.send("DELETE", &uri, Some(&owner), None).await;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);

    let gone = app.send("GET", &uri, None, None).await;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);
    assert_eq!(gone.error_code.as_deref(), Some("event_not_found"));

    // Organizer paths never touch the audit trail.
    assert!(app.audit.is_empty().await);
}

#[tokio::test]
async fn admin_edit_and_delete_are_audited() {
    let app = TestApp::new();
    app.seed_user("org@x.com", Role::Organizer).await;
    app.seed_user("admin@x.com", Role::Admin).await;
    let org = app.token_for("org@x.com", Role::Organizer);
    let admin = app.token_for("admin@x.com", Role::Admin);

    let created = app.send("POST", "/api/events", Some(&org), Some(event_body("Draft"))).await;
    let id = created.body["id"].as_str().unwrap().to_string();

    let edited = app
        .send(
            "PUT",
            &format!("/api/admin/events/{id}"),
            Some(&admin),
            Some(json!({"title": "Final", "category": ""})),
        )
        .await;
    assert_eq!(edited.status, StatusCode::OK);
    assert_eq!(edited.body["title"], "Final");
    assert_eq!(edited.body["category"], "Tech");

    let deleted = app
        .send("DELETE", &format!("/api/admin/events/{id}"), Some(&admin), None)
        .await;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);

    let again = app
        .send("DELETE", &format!("/api/admin/events/{id}"), Some(&admin), None)
        .await;
    assert_eq!(again.status, StatusCode::NOT_FOUND);

    let entries = app.audit.snapshot().await;
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].action, AuditAction::EventEdit);
    assert_eq!(entries[0].meta, json!({"changed": ["title"]}));
    assert_eq!(entries[1].action, AuditAction::EventDelete);
}

#[tokio::test]
async fn recent_activity_lists_newest_first() {
    let app = TestApp::new();
    app.seed_user("admin@x.com", Role::Admin).await;
    let a = app.seed_user("a@x.com", Role::Student).await;
    let b = app.seed_user("b@x.com", Role::Student).await;
    let token = app.token_for("admin@x.com", Role::Admin);

    for (user, body) in [(a.id, json!({"banned": true})), (b.id, json!({"banned": true}))] {
        app.send("PATCH", &format!("/api/admin/users/{user}/ban"), Some(&token), Some(body))
            .await;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    app.send(
        "PATCH",
        &format!("/api/admin/users/{}/role", a.id),
        Some(&token),
        Some(json!({"role": "organizer"})),
    )
    .await;

    let all = app
        .send("GET", "/api/admin/analytics/recent-activity", Some(&token), None)
        .await;
    assert_eq!(all.status, StatusCode::OK);
    let records = all.body.as_array().unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(records[0]["action"], "USER_ROLE");
    assert_eq!(records[0]["description"], r#"{"role":"ORGANIZER"}"#);
    assert_eq!(records[1]["subject_id"], json!(b.id));
    assert_eq!(records[2]["subject_id"], json!(a.id));

    let limited = app
        .send("GET", "/api/admin/analytics/recent-activity?limit=1", Some(&token), None)
        .await;
    assert_eq!(limited.body.as_array().unwrap().len(), 1);

    let counts = app.send("GET", "/api/admin/analytics/counts", Some(&token), None).await;
    assert_eq!(counts.body["users"], 3);
}

/// Holds the next `get` open until the test lets it go, so a second request
/// can land between an update's read and its write.
#[derive(Default)]
struct PausingEventStore {
    inner: InMemoryEventStore,
    armed: AtomicBool,
    fetched: Notify,
    resume: Notify,
}

#[async_trait]
impl EventStore for PausingEventStore {
    async fn insert(&self, event: EventRecord) -> StoreResult<EventRecord> {
        self.inner.insert(event).await
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<EventRecord>> {
        let event = self.inner.get(id).await?;
        if self.armed.swap(false, Ordering::SeqCst) {
            self.fetched.notify_one();
            self.resume.notified().await;
        }
        Ok(event)
    }

    async fn list(&self) -> StoreResult<Vec<EventRecord>> {
        self.inner.list().await
    }

    async fn update_details(&self, id: Uuid, details: EventDetails) -> StoreResult<Option<EventRecord>> {
        self.inner.update_details(id, details).await
    }

    async fn set_approval(
        &self,
        id: Uuid,
        status: ApprovalStatus,
        rejection_reason: Option<String>,
    ) -> StoreResult<Option<EventRecord>> {
        self.inner.set_approval(id, status, rejection_reason).await
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        self.inner.delete(id).await
    }
}

#[tokio::test]
async fn approval_survives_a_concurrent_organizer_update() {
    let store = Arc::new(PausingEventStore::default());
    let app = Arc::new(TestApp::with_event_store(store.clone()));
    app.seed_user("org@x.com", Role::Organizer).await;
    app.seed_user("admin@x.com", Role::Admin).await;
    let org = app.token_for("org@x.com", Role::Organizer);
    let admin = app.token_for("admin@x.com", Role::Admin);

    let created = app.send("POST", "/api/events", Some(&org), Some(event_body("Rust Night"))).await;
    assert_eq!(created.body["approval_status"], "PENDING");
    let id: Uuid = created.body["id"].as_str().unwrap().parse().unwrap();

    store.armed.store(true, Ordering::SeqCst);
    let organizer_update = {
        let app = app.clone();
        tokio::spawn(async move {
            app.send("PUT", &format!("/api/events/{id}"), Some(&org), Some(event_body("Rust Night II")))
                .await
        })
    };

    // The organizer has read the pending row and is parked before its write.
    store.fetched.notified().await;
    let approved = app
        .send("POST", &format!("/api/admin/events/{id}/approve"), Some(&admin), None)
        .await;
    assert_eq!(approved.status, StatusCode::OK);
    store.resume.notify_one();

    let updated = organizer_update.await.unwrap();
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.body["title"], "Rust Night II");
    assert_eq!(updated.body["approval_status"], "APPROVED");

    let stored = store.inner.get(id).await.unwrap().unwrap();
    assert_eq!(stored.title, "Rust Night II");
    assert_eq!(stored.approval_status, ApprovalStatus::Approved);
    let actions: Vec<AuditAction> = app.audit.snapshot().await.iter().map(|e| e.action).collect();
    assert_eq!(actions, vec![AuditAction::EventApprove]);
}

#[tokio::test]
async fn malformed_reject_body_is_refused_without_side_effects() {
    let app = TestApp::new();
    app.seed_user("org@x.com", Role::Organizer).await;
    app.seed_user("admin@x.com", Role::Admin).await;
    let org = app.token_for("org@x.com", Role::Organizer);
    let admin = app.token_for("admin@x.com", Role::Admin);

    let created = app.send("POST", "/api/events", Some(&org), Some(event_body("Rust Night"))).await;
    let id = created.body["id"].as_str().unwrap().to_string();
    let uri = format!("/api/admin/events/{id}/reject");

    let malformed = app.send_raw("POST", &uri, Some(&admin), r#"{"reason": "#.to_string()).await;
    assert_eq!(malformed.status, StatusCode::BAD_REQUEST);
    assert_eq!(malformed.error_code.as_deref(), Some("invalid_body"));
    let pending = app.send("GET", "/api/admin/events?status=pending", Some(&admin), None).await;
    assert_eq!(pending.body.as_array().unwrap().len(), 1);
    assert!(app.audit.is_empty().await);

    let bare = app.send("POST", &uri, Some(&admin), None).await;
    assert_eq!(bare.status, StatusCode::OK);
    assert_eq!(bare.body["approval_status"], "REJECTED");
    assert_eq!(bare.body["rejection_reason"], Value::Null);
    let entry = app.audit.snapshot().await.pop().unwrap();
    assert_eq!(entry.action, AuditAction::EventReject);
    assert_eq!(entry.meta, Value::Null);
}
