use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::model::{AuditEntry, AuditResult};

/// Append-only sink for audit entries. There is no update or delete.
#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn append(&self, entry: &AuditEntry) -> AuditResult<()>;

    /// Newest first, at most `limit` entries.
    async fn list_recent(&self, limit: usize) -> AuditResult<Vec<AuditEntry>>;
}

#[derive(Default)]
pub struct InMemoryAuditStore {
    entries: RwLock<Vec<AuditEntry>>,
}

impl InMemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Insertion-ordered copy of every entry.
    pub async fn snapshot(&self) -> Vec<AuditEntry> {
        self.entries.read().await.clone()
    }
}

#[async_trait]
impl AuditStore for InMemoryAuditStore {
    async fn append(&self, entry: &AuditEntry) -> AuditResult<()> {
        self.entries.write().await.push(entry.clone());
        Ok(())
    }

    async fn list_recent(&self, limit: usize) -> AuditResult<Vec<AuditEntry>> {
        let guard = self.entries.read().await;
        // Reverse first so equal timestamps keep latest-appended first.
        let mut entries: Vec<AuditEntry> = guard.iter().rev().cloned().collect();
        entries.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
        entries.truncate(limit);
        Ok(entries)
    }
}
