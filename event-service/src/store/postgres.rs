use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common_audit::{AuditAction, AuditEntry, AuditError, AuditResult, AuditStore};
use common_auth::{canonicalize_role, DirectoryError, DirectoryUser, Role, UserDirectory};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::{
    ApprovalStatus, EventDetails, EventRecord, EventStore, StoreError, StoreResult, UserRecord,
    UserStore,
};

const INIT_SQL: &str = include_str!("../../migrations/0001_init.sql");

const USER_COLUMNS: &str = "id, email, name, role, active, banned, password_hash, created_at";
const EVENT_COLUMNS: &str = "id, title, description, location, category, start_time, organizer_email, approval_status, rejection_reason, created_at";

/// Apply the bundled schema. Every statement is idempotent.
pub async fn run_migrations(pool: &PgPool) -> StoreResult<()> {
    for statement in INIT_SQL.split(';') {
        let trimmed = statement.trim();
        if trimmed.is_empty() {
            continue;
        }
        sqlx::query(trimmed).execute(pool).await?;
    }
    Ok(())
}

fn map_insert_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.code().as_deref() == Some("23505") {
            return StoreError::DuplicateEmail;
        }
    }
    err.into()
}

#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    name: Option<String>,
    role: String,
    active: bool,
    banned: bool,
    password_hash: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for UserRecord {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = canonicalize_role(&row.role)
            .map_err(|_| StoreError::Corrupt(format!("user {} has role '{}'", row.id, row.role)))?;
        Ok(UserRecord {
            id: row.id,
            email: row.email,
            name: row.name,
            role,
            active: row.active,
            banned: row.banned,
            password_hash: row.password_hash,
            created_at: row.created_at,
        })
    }
}

pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn fetch_one_where(&self, clause: &str, id: Uuid) -> StoreResult<Option<UserRecord>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {clause}");
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .map(UserRecord::try_from)
            .transpose()
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn insert(&self, user: UserRecord) -> StoreResult<UserRecord> {
        let sql = format!(
            "INSERT INTO users ({USER_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(user.id)
            .bind(&user.email)
            .bind(&user.name)
            .bind(user.role.as_str())
            .bind(user.active)
            .bind(user.banned)
            .bind(&user.password_hash)
            .bind(user.created_at)
            .fetch_one(&self.db)
            .await
            .map_err(map_insert_error)?;
        row.try_into()
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<UserRecord>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(email)
            .fetch_optional(&self.db)
            .await?
            .map(UserRecord::try_from)
            .transpose()
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<UserRecord>> {
        self.fetch_one_where("id = $1", id).await
    }

    async fn list(&self) -> StoreResult<Vec<UserRecord>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at");
        sqlx::query_as::<_, UserRow>(&sql)
            .fetch_all(&self.db)
            .await?
            .into_iter()
            .map(UserRecord::try_from)
            .collect()
    }

    async fn set_active(&self, id: Uuid, active: bool) -> StoreResult<Option<UserRecord>> {
        let sql = format!("UPDATE users SET active = $2 WHERE id = $1 RETURNING {USER_COLUMNS}");
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .bind(active)
            .fetch_optional(&self.db)
            .await?
            .map(UserRecord::try_from)
            .transpose()
    }

    async fn set_banned(&self, id: Uuid, banned: bool) -> StoreResult<Option<UserRecord>> {
        let sql = format!("UPDATE users SET banned = $2 WHERE id = $1 RETURNING {USER_COLUMNS}");
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .bind(banned)
            .fetch_optional(&self.db)
            .await?
            .map(UserRecord::try_from)
            .transpose()
    }

    async fn set_role(&self, id: Uuid, role: Role) -> StoreResult<Option<UserRecord>> {
        let sql = format!("UPDATE users SET role = $2 WHERE id = $1 RETURNING {USER_COLUMNS}");
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .bind(role.as_str())
            .fetch_optional(&self.db)
            .await?
            .map(UserRecord::try_from)
            .transpose()
    }
}

#[derive(FromRow)]
struct DirectoryRow {
    id: Uuid,
    email: String,
    role: String,
    active: bool,
    banned: bool,
}

#[async_trait]
impl UserDirectory for PgUserStore {
    async fn find_by_subject(&self, subject: &str) -> Result<Option<DirectoryUser>, DirectoryError> {
        let row = sqlx::query_as::<_, DirectoryRow>(
            "SELECT id, email, role, active, banned FROM users WHERE email = $1",
        )
        .bind(subject)
        .fetch_optional(&self.db)
        .await
        .map_err(|err| DirectoryError(err.to_string()))?;
        Ok(row.map(|row| DirectoryUser {
            id: row.id,
            email: row.email,
            role: row.role,
            active: row.active,
            banned: row.banned,
        }))
    }
}

#[derive(FromRow)]
struct EventRow {
    id: Uuid,
    title: String,
    description: Option<String>,
    location: String,
    category: String,
    start_time: DateTime<Utc>,
    organizer_email: String,
    approval_status: String,
    rejection_reason: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<EventRow> for EventRecord {
    type Error = StoreError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        Ok(EventRecord {
            id: row.id,
            title: row.title,
            description: row.description,
            location: row.location,
            category: row.category,
            start_time: row.start_time,
            organizer_email: row.organizer_email,
            approval_status: row.approval_status.parse::<ApprovalStatus>()?,
            rejection_reason: row.rejection_reason,
            created_at: row.created_at,
        })
    }
}

pub struct PgEventStore {
    db: PgPool,
}

impl PgEventStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl EventStore for PgEventStore {
    async fn insert(&self, event: EventRecord) -> StoreResult<EventRecord> {
        let sql = format!(
            "INSERT INTO events ({EVENT_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING {EVENT_COLUMNS}"
        );
        sqlx::query_as::<_, EventRow>(&sql)
            .bind(event.id)
            .bind(&event.title)
            .bind(&event.description)
            .bind(&event.location)
            .bind(&event.category)
            .bind(event.start_time)
            .bind(&event.organizer_email)
            .bind(event.approval_status.as_str())
            .bind(&event.rejection_reason)
            .bind(event.created_at)
            .fetch_one(&self.db)
            .await?
            .try_into()
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<EventRecord>> {
        let sql = format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = $1");
        sqlx::query_as::<_, EventRow>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .map(EventRecord::try_from)
            .transpose()
    }

    async fn list(&self) -> StoreResult<Vec<EventRecord>> {
        let sql = format!("SELECT {EVENT_COLUMNS} FROM events ORDER BY start_time ASC");
        sqlx::query_as::<_, EventRow>(&sql)
            .fetch_all(&self.db)
            .await?
            .into_iter()
            .map(EventRecord::try_from)
            .collect()
    }

    async fn update_details(&self, id: Uuid, details: EventDetails) -> StoreResult<Option<EventRecord>> {
        let sql = format!(
            "UPDATE events SET title = $2, description = $3, location = $4, category = $5, start_time = $6 \
             WHERE id = $1 RETURNING {EVENT_COLUMNS}"
        );
        sqlx::query_as::<_, EventRow>(&sql)
            .bind(id)
            .bind(&details.title)
            .bind(&details.description)
            .bind(&details.location)
            .bind(&details.category)
            .bind(details.start_time)
            .fetch_optional(&self.db)
            .await?
            .map(EventRecord::try_from)
            .transpose()
    }

    async fn set_approval(
        &self,
        id: Uuid,
        status: ApprovalStatus,
        rejection_reason: Option<String>,
    ) -> StoreResult<Option<EventRecord>> {
        let sql = format!(
            "UPDATE events SET approval_status = $2, rejection_reason = $3 WHERE id = $1 RETURNING {EVENT_COLUMNS}"
        );
        sqlx::query_as::<_, EventRow>(&sql)
            .bind(id)
            .bind(status.as_str())
            .bind(rejection_reason)
            .fetch_optional(&self.db)
            .await?
            .map(EventRecord::try_from)
            .transpose()
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[derive(FromRow)]
struct AuditRow {
    id: Uuid,
    ts: DateTime<Utc>,
    actor_user_id: Uuid,
    action: String,
    subject_id: Option<Uuid>,
    meta: Option<String>,
}

impl TryFrom<AuditRow> for AuditEntry {
    type Error = AuditError;

    fn try_from(row: AuditRow) -> Result<Self, Self::Error> {
        let action = AuditAction::parse(&row.action)
            .ok_or_else(|| AuditError::Store(format!("unknown audit action '{}'", row.action)))?;
        let meta = match row.meta {
            None => serde_json::Value::Null,
            Some(raw) => serde_json::from_str(&raw).unwrap_or(serde_json::Value::String(raw)),
        };
        Ok(AuditEntry {
            id: row.id,
            actor_id: row.actor_user_id,
            action,
            subject_id: row.subject_id,
            meta,
            occurred_at: row.ts,
        })
    }
}

pub struct PgAuditStore {
    db: PgPool,
}

impl PgAuditStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AuditStore for PgAuditStore {
    async fn append(&self, entry: &AuditEntry) -> AuditResult<()> {
        let meta = if entry.meta.is_null() {
            None
        } else {
            Some(
                serde_json::to_string(&entry.meta)
                    .map_err(|err| AuditError::Serialization(err.to_string()))?,
            )
        };
        sqlx::query(
            "INSERT INTO audit_log (id, ts, actor_user_id, action, subject_id, meta) VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(entry.id)
        .bind(entry.occurred_at)
        .bind(entry.actor_id)
        .bind(entry.action.as_str())
        .bind(entry.subject_id)
        .bind(meta)
        .execute(&self.db)
        .await
        .map_err(|err| AuditError::Store(err.to_string()))?;
        Ok(())
    }

    async fn list_recent(&self, limit: usize) -> AuditResult<Vec<AuditEntry>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        sqlx::query_as::<_, AuditRow>(
            "SELECT id, ts, actor_user_id, action, subject_id, meta FROM audit_log ORDER BY ts DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.db)
        .await
        .map_err(|err| AuditError::Store(err.to_string()))?
        .into_iter()
        .map(AuditEntry::try_from)
        .collect()
    }
}
