use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use common_audit::{AuditAction, AuditEntry};
use common_auth::{canonicalize_role, AdminOnly, Authorized};
use common_http_errors::{ApiError, ApiResult};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};
use uuid::Uuid;

use crate::auth_handlers::UserDto;
use crate::store::{ApprovalStatus, EventRecord, UserRecord};
use crate::AppState;

const MAX_RECENT_ACTIVITY: usize = 500;

type Admin = Authorized<AdminOnly>;

fn user_not_found() -> ApiError {
    ApiError::not_found("user_not_found")
}

fn event_not_found() -> ApiError {
    ApiError::not_found("event_not_found")
}

// --- users ---

pub async fn list_users(State(state): State<AppState>, _admin: Admin) -> ApiResult<Json<Vec<UserDto>>> {
    let users = state.users.list().await?;
    Ok(Json(users.iter().map(UserDto::from).collect()))
}

#[derive(Debug, Default, Deserialize)]
pub struct UserSearch {
    pub q: Option<String>,
    pub role: Option<String>,
    pub status: Option<String>,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

pub(crate) fn filter_users(users: Vec<UserRecord>, search: &UserSearch) -> ApiResult<Vec<UserRecord>> {
    let role = present(&search.role).map(canonicalize_role).transpose()?;
    let q = present(&search.q).map(str::to_lowercase);
    let status = present(&search.status).map(str::to_ascii_lowercase);

    Ok(users
        .into_iter()
        .filter(|user| {
            if let Some(q) = &q {
                let by_email = user.email.to_lowercase().contains(q);
                let by_name = user
                    .name
                    .as_deref()
                    .is_some_and(|n| n.to_lowercase().contains(q));
                if !by_email && !by_name {
                    return false;
                }
            }
            if role.is_some_and(|r| r != user.role) {
                return false;
            }
            match status.as_deref() {
                Some("active") => user.active && !user.banned,
                Some("banned") => user.banned,
                Some("inactive") => !user.active,
                _ => true,
            }
        })
        .collect())
}

pub async fn search_users(
    State(state): State<AppState>,
    _admin: Admin,
    Query(search): Query<UserSearch>,
) -> ApiResult<Json<Vec<UserDto>>> {
    let users = filter_users(state.users.list().await?, &search)?;
    Ok(Json(users.iter().map(UserDto::from).collect()))
}

#[derive(Debug, Deserialize)]
pub struct ActiveBody {
    pub active: bool,
}

pub async fn set_user_active(
    State(state): State<AppState>,
    admin: Admin,
    Path(id): Path<Uuid>,
    Json(body): Json<ActiveBody>,
) -> ApiResult<Json<UserDto>> {
    let user = state
        .users
        .set_active(id, body.active)
        .await?
        .ok_or_else(user_not_found)?;
    state
        .audit
        .record(&admin, AuditAction::UserDeactivate, Some(id), json!({ "active": user.active }))
        .await;
    Ok(Json(UserDto::from(&user)))
}

#[derive(Debug, Deserialize)]
pub struct BanBody {
    pub banned: bool,
}

pub async fn set_user_banned(
    State(state): State<AppState>,
    admin: Admin,
    Path(id): Path<Uuid>,
    Json(body): Json<BanBody>,
) -> ApiResult<Json<UserDto>> {
    let user = state
        .users
        .set_banned(id, body.banned)
        .await?
        .ok_or_else(user_not_found)?;
    state
        .audit
        .record(&admin, AuditAction::UserBan, Some(id), json!({ "banned": user.banned }))
        .await;
    Ok(Json(UserDto::from(&user)))
}

#[derive(Debug, Deserialize)]
pub struct RoleBody {
    pub role: Option<String>,
}

pub async fn set_user_role(
    State(state): State<AppState>,
    admin: Admin,
    Path(id): Path<Uuid>,
    Json(body): Json<RoleBody>,
) -> ApiResult<Json<UserDto>> {
    let Some(raw) = present(&body.role) else {
        return Err(ApiError::bad_request("role_required", "role required"));
    };
    let role = canonicalize_role(raw)?;
    let user = state
        .users
        .set_role(id, role)
        .await?
        .ok_or_else(user_not_found)?;
    info!(user_id = %id, role = %role, actor = %admin.subject, "user_role_changed");
    state
        .audit
        .record(&admin, AuditAction::UserRole, Some(id), json!({ "role": user.role }))
        .await;
    Ok(Json(UserDto::from(&user)))
}

pub async fn list_user_events(
    State(state): State<AppState>,
    _admin: Admin,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<EventRecord>>> {
    let user = state.users.find_by_id(id).await?.ok_or_else(user_not_found)?;
    let events = state
        .events
        .list()
        .await?
        .into_iter()
        .filter(|event| event.organizer_email.eq_ignore_ascii_case(&user.email))
        .collect();
    Ok(Json(events))
}

// --- event moderation ---

#[derive(Debug, Default, Deserialize)]
pub struct ModerationQuery {
    pub status: Option<String>,
    pub query: Option<String>,
}

pub(crate) fn filter_for_moderation(events: Vec<EventRecord>, query: &ModerationQuery) -> Vec<EventRecord> {
    // Unknown status values list everything.
    let status = present(&query.status).and_then(|s| s.parse::<ApprovalStatus>().ok());
    let text = present(&query.query).map(str::to_lowercase);
    events
        .into_iter()
        .filter(|event| status.map_or(true, |s| event.approval_status == s))
        .filter(|event| {
            text.as_ref().map_or(true, |t| {
                event.title.to_lowercase().contains(t) || event.category.to_lowercase().contains(t)
            })
        })
        .collect()
}

pub async fn list_events_for_moderation(
    State(state): State<AppState>,
    _admin: Admin,
    Query(query): Query<ModerationQuery>,
) -> ApiResult<Json<Vec<EventRecord>>> {
    let events = filter_for_moderation(state.events.list().await?, &query);
    Ok(Json(events))
}

async fn load_event(state: &AppState, id: Uuid) -> ApiResult<EventRecord> {
    state.events.get(id).await?.ok_or_else(event_not_found)
}

async fn decide(
    state: &AppState,
    id: Uuid,
    status: ApprovalStatus,
    reason: Option<String>,
) -> ApiResult<EventRecord> {
    state
        .events
        .set_approval(id, status, reason)
        .await?
        .ok_or_else(event_not_found)
}

pub async fn approve_event(
    State(state): State<AppState>,
    admin: Admin,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<EventRecord>> {
    let event = decide(&state, id, ApprovalStatus::Approved, None).await?;
    state
        .audit
        .record(&admin, AuditAction::EventApprove, Some(id), serde_json::Value::Null)
        .await;
    Ok(Json(event))
}

#[derive(Debug, Deserialize)]
pub struct RejectBody {
    pub reason: Option<String>,
}

/// The reason body is optional, but when one is sent it has to parse.
pub(crate) fn parse_reject_body(body: &[u8]) -> ApiResult<Option<RejectBody>> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(body)
        .map(Some)
        .map_err(|e| ApiError::bad_request("invalid_body", e.to_string()))
}

pub async fn reject_event(
    State(state): State<AppState>,
    admin: Admin,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> ApiResult<Json<EventRecord>> {
    let reason = parse_reject_body(&body)?.and_then(|body| body.reason);
    let event = decide(&state, id, ApprovalStatus::Rejected, reason.clone()).await?;
    let meta = match reason {
        Some(reason) => json!({ "reason": reason }),
        None => serde_json::Value::Null,
    };
    state
        .audit
        .record(&admin, AuditAction::EventReject, Some(id), meta)
        .await;
    Ok(Json(event))
}

#[derive(Debug, Default, Deserialize)]
pub struct EventEditBody {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub category: Option<String>,
}

/// Applies the non-blank fields of `body`; returns the names of the fields
/// that actually changed.
pub(crate) fn apply_edit(event: &mut EventRecord, body: EventEditBody) -> Vec<&'static str> {
    let mut changed = Vec::new();
    if let Some(title) = body.title.filter(|t| !t.trim().is_empty()) {
        if event.title != title {
            event.title = title;
            changed.push("title");
        }
    }
    if let Some(description) = body.description {
        if event.description.as_deref() != Some(description.as_str()) {
            event.description = Some(description);
            changed.push("description");
        }
    }
    if let Some(start_time) = body.start_time {
        if event.start_time != start_time {
            event.start_time = start_time;
            changed.push("start_time");
        }
    }
    if let Some(location) = body.location.filter(|l| !l.trim().is_empty()) {
        if event.location != location {
            event.location = location;
            changed.push("location");
        }
    }
    if let Some(category) = body.category.filter(|c| !c.trim().is_empty()) {
        if event.category != category {
            event.category = category;
            changed.push("category");
        }
    }
    changed
}

pub async fn edit_event_as_admin(
    State(state): State<AppState>,
    admin: Admin,
    Path(id): Path<Uuid>,
    Json(body): Json<EventEditBody>,
) -> ApiResult<Json<EventRecord>> {
    let mut event = load_event(&state, id).await?;
    let changed = apply_edit(&mut event, body);
    let event = state
        .events
        .update_details(id, event.details())
        .await?
        .ok_or_else(event_not_found)?;
    state
        .audit
        .record(&admin, AuditAction::EventEdit, Some(id), json!({ "changed": changed }))
        .await;
    Ok(Json(event))
}

pub async fn delete_event_as_admin(
    State(state): State<AppState>,
    admin: Admin,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let event = load_event(&state, id).await?;
    if !state.events.delete(id).await? {
        return Err(event_not_found());
    }
    state
        .audit
        .record(&admin, AuditAction::EventDelete, Some(id), json!({ "title": event.title }))
        .await;
    Ok(StatusCode::NO_CONTENT)
}

// --- analytics ---

#[derive(Debug, Serialize)]
pub struct Counts {
    pub users: usize,
    pub events_total: usize,
    pub events_approved: usize,
    pub events_pending: usize,
}

pub async fn counts(State(state): State<AppState>, _admin: Admin) -> ApiResult<Json<Counts>> {
    let users = state.users.list().await?.len();
    let events = state.events.list().await?;
    let with_status = |status: ApprovalStatus| {
        events
            .iter()
            .filter(|event| event.approval_status == status)
            .count()
    };
    Ok(Json(Counts {
        users,
        events_total: events.len(),
        events_approved: with_status(ApprovalStatus::Approved),
        events_pending: with_status(ApprovalStatus::Pending),
    }))
}

#[derive(Debug, Deserialize)]
pub struct ActivityQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ActivityRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub action: AuditAction,
    pub actor_id: Uuid,
    pub subject_id: Option<Uuid>,
    pub description: String,
}

impl From<AuditEntry> for ActivityRecord {
    fn from(entry: AuditEntry) -> Self {
        let description = if entry.meta.is_null() {
            String::new()
        } else {
            entry.meta.to_string()
        };
        Self {
            id: entry.id,
            timestamp: entry.occurred_at,
            action: entry.action,
            actor_id: entry.actor_id,
            subject_id: entry.subject_id,
            description,
        }
    }
}

/// Newest audit entries first.
pub async fn recent_activity(
    State(state): State<AppState>,
    _admin: Admin,
    Query(query): Query<ActivityQuery>,
) -> ApiResult<Json<Vec<ActivityRecord>>> {
    let limit = query
        .limit
        .unwrap_or(state.config.recent_activity_default_limit)
        .min(MAX_RECENT_ACTIVITY);
    let entries = state.audit.recent(limit).await.map_err(|err| {
        error!(error = %err, "audit_read_failed");
        ApiError::Internal { message: None }
    })?;
    Ok(Json(entries.into_iter().map(ActivityRecord::from).collect()))
}
