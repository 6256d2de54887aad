use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Privileged mutations that leave a trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    UserDeactivate,
    UserBan,
    UserRole,
    EventApprove,
    EventReject,
    EventDelete,
    EventEdit,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::UserDeactivate => "USER_DEACTIVATE",
            AuditAction::UserBan => "USER_BAN",
            AuditAction::UserRole => "USER_ROLE",
            AuditAction::EventApprove => "EVENT_APPROVE",
            AuditAction::EventReject => "EVENT_REJECT",
            AuditAction::EventDelete => "EVENT_DELETE",
            AuditAction::EventEdit => "EVENT_EDIT",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        [
            AuditAction::UserDeactivate,
            AuditAction::UserBan,
            AuditAction::UserRole,
            AuditAction::EventApprove,
            AuditAction::EventReject,
            AuditAction::EventDelete,
            AuditAction::EventEdit,
        ]
        .into_iter()
        .find(|action| action.as_str() == value)
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable line of the audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub actor_id: Uuid,
    pub action: AuditAction,
    pub subject_id: Option<Uuid>,
    pub meta: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        actor_id: Uuid,
        action: AuditAction,
        subject_id: Option<Uuid>,
        meta: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            actor_id,
            action,
            subject_id,
            meta,
            occurred_at: Utc::now(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit store error: {0}")]
    Store(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type AuditResult<T> = Result<T, AuditError>;
