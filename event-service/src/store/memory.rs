use async_trait::async_trait;
use common_auth::{DirectoryError, DirectoryUser, Role, UserDirectory};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    ApprovalStatus, EventDetails, EventRecord, EventStore, StoreError, StoreResult, UserRecord,
    UserStore,
};

#[derive(Default)]
pub struct InMemoryUserStore {
    users: RwLock<Vec<UserRecord>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn modify<F>(&self, id: Uuid, apply: F) -> StoreResult<Option<UserRecord>>
    where
        F: FnOnce(&mut UserRecord) + Send,
    {
        let mut guard = self.users.write().await;
        Ok(guard.iter_mut().find(|u| u.id == id).map(|user| {
            apply(user);
            user.clone()
        }))
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn insert(&self, user: UserRecord) -> StoreResult<UserRecord> {
        let mut guard = self.users.write().await;
        if guard.iter().any(|u| u.email == user.email) {
            return Err(StoreError::DuplicateEmail);
        }
        guard.push(user.clone());
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<UserRecord>> {
        let guard = self.users.read().await;
        Ok(guard.iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<UserRecord>> {
        let guard = self.users.read().await;
        Ok(guard.iter().find(|u| u.id == id).cloned())
    }

    async fn list(&self) -> StoreResult<Vec<UserRecord>> {
        Ok(self.users.read().await.clone())
    }

    async fn set_active(&self, id: Uuid, active: bool) -> StoreResult<Option<UserRecord>> {
        self.modify(id, |u| u.active = active).await
    }

    async fn set_banned(&self, id: Uuid, banned: bool) -> StoreResult<Option<UserRecord>> {
        self.modify(id, |u| u.banned = banned).await
    }

    async fn set_role(&self, id: Uuid, role: Role) -> StoreResult<Option<UserRecord>> {
        self.modify(id, |u| u.role = role).await
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserStore {
    async fn find_by_subject(&self, subject: &str) -> Result<Option<DirectoryUser>, DirectoryError> {
        let guard = self.users.read().await;
        Ok(guard.iter().find(|u| u.email == subject).map(|u| DirectoryUser {
            id: u.id,
            email: u.email.clone(),
            role: u.role.as_str().to_string(),
            active: u.active,
            banned: u.banned,
        }))
    }
}

#[derive(Default)]
pub struct InMemoryEventStore {
    events: RwLock<Vec<EventRecord>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn insert(&self, event: EventRecord) -> StoreResult<EventRecord> {
        self.events.write().await.push(event.clone());
        Ok(event)
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<EventRecord>> {
        let guard = self.events.read().await;
        Ok(guard.iter().find(|e| e.id == id).cloned())
    }

    async fn list(&self) -> StoreResult<Vec<EventRecord>> {
        let mut events = self.events.read().await.clone();
        events.sort_by(|a, b| a.start_time.cmp(&b.start_time));
        Ok(events)
    }

    async fn update_details(&self, id: Uuid, details: EventDetails) -> StoreResult<Option<EventRecord>> {
        let mut guard = self.events.write().await;
        Ok(guard.iter_mut().find(|e| e.id == id).map(|event| {
            event.apply_details(details);
            event.clone()
        }))
    }

    async fn set_approval(
        &self,
        id: Uuid,
        status: ApprovalStatus,
        rejection_reason: Option<String>,
    ) -> StoreResult<Option<EventRecord>> {
        let mut guard = self.events.write().await;
        Ok(guard.iter_mut().find(|e| e.id == id).map(|event| {
            event.approval_status = status;
            event.rejection_reason = rejection_reason;
            event.clone()
        }))
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        let mut guard = self.events.write().await;
        let before = guard.len();
        guard.retain(|e| e.id != id);
        Ok(guard.len() != before)
    }
}
