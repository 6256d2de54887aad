use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use common_auth::{require_owner_or_admin, AuthContext, Authorized, OrganizerOrAdmin};
use common_http_errors::{ApiError, ApiResult};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::store::{ApprovalStatus, EventDetails, EventRecord};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct EventQuery {
    pub q: Option<String>,
    pub category: Option<String>,
    pub order: Option<String>,
}

/// Body for organizer create and update.
#[derive(Debug, Clone, Deserialize)]
pub struct EventInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub category: Option<String>,
}

struct ValidatedInput {
    title: String,
    description: Option<String>,
    location: String,
    category: String,
}

fn non_blank(field: &'static str, value: Option<String>) -> ApiResult<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(ApiError::bad_request("invalid_event", format!("{field} is required"))),
    }
}

fn ensure_future(start_time: DateTime<Utc>, now: DateTime<Utc>) -> ApiResult<()> {
    if start_time <= now {
        return Err(ApiError::bad_request(
            "invalid_event",
            "event start time must be in the future",
        ));
    }
    Ok(())
}

fn validate(input: EventInput) -> ApiResult<ValidatedInput> {
    Ok(ValidatedInput {
        title: non_blank("title", input.title)?,
        description: input.description,
        location: non_blank("location", input.location)?,
        category: non_blank("category", input.category)?,
    })
}

pub(crate) fn matches_public_query(event: &EventRecord, query: &EventQuery) -> bool {
    if event.approval_status != ApprovalStatus::Approved {
        return false;
    }
    if let Some(q) = query.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        let q = q.to_lowercase();
        let hit = event.title.to_lowercase().contains(&q)
            || event.location.to_lowercase().contains(&q)
            || event
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(&q));
        if !hit {
            return false;
        }
    }
    if let Some(category) = query.category.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        if !event.category.eq_ignore_ascii_case(category) {
            return false;
        }
    }
    true
}

/// Approved events only, earliest first unless `order=desc`.
pub async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<EventQuery>,
) -> ApiResult<Json<Vec<EventRecord>>> {
    let mut events: Vec<EventRecord> = state
        .events
        .list()
        .await?
        .into_iter()
        .filter(|event| matches_public_query(event, &query))
        .collect();
    if query
        .order
        .as_deref()
        .is_some_and(|o| o.eq_ignore_ascii_case("desc"))
    {
        events.reverse();
    }
    Ok(Json(events))
}

pub async fn get_event(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<EventRecord>> {
    let event = state
        .events
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found("event_not_found"))?;
    Ok(Json(event))
}

/// Everything the caller organizes, any approval status, latest start first.
pub async fn my_events(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<Json<Vec<EventRecord>>> {
    let mut events: Vec<EventRecord> = state
        .events
        .list()
        .await?
        .into_iter()
        .filter(|event| event.organizer_email.eq_ignore_ascii_case(&auth.subject))
        .collect();
    events.sort_by(|a, b| b.start_time.cmp(&a.start_time));
    Ok(Json(events))
}

pub async fn create_event(
    State(state): State<AppState>,
    auth: Authorized<OrganizerOrAdmin>,
    Json(input): Json<EventInput>,
) -> ApiResult<(StatusCode, Json<EventRecord>)> {
    let now = Utc::now();
    let start_time = input
        .start_time
        .ok_or_else(|| ApiError::bad_request("invalid_event", "start_time is required"))?;
    ensure_future(start_time, now)?;
    let fields = validate(input)?;

    // Admin-created events skip moderation.
    let approval_status = if auth.is_admin() {
        ApprovalStatus::Approved
    } else {
        ApprovalStatus::Pending
    };

    let event = EventRecord {
        id: Uuid::new_v4(),
        title: fields.title,
        description: fields.description,
        location: fields.location,
        category: fields.category,
        start_time,
        organizer_email: auth.subject.clone(),
        approval_status,
        rejection_reason: None,
        created_at: now,
    };
    let event = state.events.insert(event).await?;
    info!(event_id = %event.id, organizer = %event.organizer_email, status = %event.approval_status, "event_created");
    Ok((StatusCode::CREATED, Json(event)))
}

pub async fn update_event(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    Json(input): Json<EventInput>,
) -> ApiResult<Json<EventRecord>> {
    let event = state
        .events
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found("event_not_found"))?;
    require_owner_or_admin(&auth, &event.organizer_email)?;

    let start_time = match input.start_time {
        Some(start_time) => {
            ensure_future(start_time, Utc::now())?;
            start_time
        }
        None => event.start_time,
    };
    let fields = validate(input)?;
    let details = EventDetails {
        title: fields.title,
        description: fields.description,
        location: fields.location,
        category: fields.category,
        start_time,
    };

    // Approval columns are owned by moderation and never written here.
    let event = state
        .events
        .update_details(id, details)
        .await?
        .ok_or_else(|| ApiError::not_found("event_not_found"))?;
    info!(event_id = %event.id, actor = %auth.subject, "event_updated");
    Ok(Json(event))
}

pub async fn delete_event(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let event = state
        .events
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found("event_not_found"))?;
    require_owner_or_admin(&auth, &event.organizer_email)?;

    if !state.events.delete(id).await? {
        return Err(ApiError::not_found("event_not_found"));
    }
    info!(event_id = %id, actor = %auth.subject, "event_deleted");
    Ok(StatusCode::NO_CONTENT)
}
