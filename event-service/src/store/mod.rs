use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common_audit::{AuditStore, InMemoryAuditStore};
use common_auth::{Role, UserDirectory};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

pub mod memory;
pub mod postgres;

pub use memory::{InMemoryEventStore, InMemoryUserStore};
pub use postgres::{run_migrations, PgAuditStore, PgEventStore, PgUserStore};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("email already registered")]
    DuplicateEmail,
    #[error("stored record is invalid: {0}")]
    Corrupt(String),
    #[error("database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub role: Role,
    pub active: bool,
    pub banned: bool,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn new(email: String, name: Option<String>, role: Role, password_hash: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            email,
            name,
            role,
            active: true,
            banned: false,
            password_hash,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "PENDING",
            ApprovalStatus::Approved => "APPROVED",
            ApprovalStatus::Rejected => "REJECTED",
        }
    }
}

impl FromStr for ApprovalStatus {
    type Err = StoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(ApprovalStatus::Pending),
            "APPROVED" => Ok(ApprovalStatus::Approved),
            "REJECTED" => Ok(ApprovalStatus::Rejected),
            other => Err(StoreError::Corrupt(format!("unknown approval status '{other}'"))),
        }
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventRecord {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub location: String,
    pub category: String,
    pub start_time: DateTime<Utc>,
    /// Lower-cased email of the creating user; the ownership key.
    pub organizer_email: String,
    pub approval_status: ApprovalStatus,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// The organizer-editable part of an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDetails {
    pub title: String,
    pub description: Option<String>,
    pub location: String,
    pub category: String,
    pub start_time: DateTime<Utc>,
}

impl EventRecord {
    pub fn details(&self) -> EventDetails {
        EventDetails {
            title: self.title.clone(),
            description: self.description.clone(),
            location: self.location.clone(),
            category: self.category.clone(),
            start_time: self.start_time,
        }
    }

    fn apply_details(&mut self, details: EventDetails) {
        self.title = details.title;
        self.description = details.description;
        self.location = details.location;
        self.category = details.category;
        self.start_time = details.start_time;
    }
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert(&self, user: UserRecord) -> StoreResult<UserRecord>;
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<UserRecord>>;
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<UserRecord>>;
    /// Every user, oldest first.
    async fn list(&self) -> StoreResult<Vec<UserRecord>>;
    async fn set_active(&self, id: Uuid, active: bool) -> StoreResult<Option<UserRecord>>;
    async fn set_banned(&self, id: Uuid, banned: bool) -> StoreResult<Option<UserRecord>>;
    async fn set_role(&self, id: Uuid, role: Role) -> StoreResult<Option<UserRecord>>;
}

#[async_trait]
pub trait EventStore: Send + Sync {
    async fn insert(&self, event: EventRecord) -> StoreResult<EventRecord>;
    async fn get(&self, id: Uuid) -> StoreResult<Option<EventRecord>>;
    /// Every event, earliest start first.
    async fn list(&self) -> StoreResult<Vec<EventRecord>>;
    /// Overwrite the content columns only; approval state is left as stored.
    /// `None` when the id is unknown.
    async fn update_details(&self, id: Uuid, details: EventDetails) -> StoreResult<Option<EventRecord>>;
    /// Overwrite the approval state only.
    async fn set_approval(
        &self,
        id: Uuid,
        status: ApprovalStatus,
        rejection_reason: Option<String>,
    ) -> StoreResult<Option<EventRecord>>;
    async fn delete(&self, id: Uuid) -> StoreResult<bool>;
}

/// The three stores plus the directory view the auth core reads through.
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub directory: Arc<dyn UserDirectory>,
    pub events: Arc<dyn EventStore>,
    pub audit: Arc<dyn AuditStore>,
}

impl Stores {
    pub fn in_memory() -> Self {
        let users = Arc::new(InMemoryUserStore::new());
        Self {
            users: users.clone(),
            directory: users,
            events: Arc::new(InMemoryEventStore::new()),
            audit: Arc::new(InMemoryAuditStore::new()),
        }
    }

    pub fn postgres(pool: PgPool) -> Self {
        let users = Arc::new(PgUserStore::new(pool.clone()));
        Self {
            users: users.clone(),
            directory: users,
            events: Arc::new(PgEventStore::new(pool.clone())),
            audit: Arc::new(PgAuditStore::new(pool)),
        }
    }
}

impl From<StoreError> for common_http_errors::ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateEmail => common_http_errors::ApiError::Conflict {
                code: "email_taken",
                message: Some("email already registered".to_string()),
            },
            other => {
                tracing::error!(error = %other, "store_failure");
                common_http_errors::ApiError::Internal { message: None }
            }
        }
    }
}
