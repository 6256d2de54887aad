use std::sync::Arc;

use common_auth::Identity;
use common_observability::SecurityMetrics;
use tracing::{info, warn};
use uuid::Uuid;

use crate::model::{AuditAction, AuditEntry, AuditResult};
use crate::store::AuditStore;

/// Writes the privileged-action trail. Call only after the mutation it
/// describes has been applied.
#[derive(Clone)]
pub struct AuditRecorder {
    store: Arc<dyn AuditStore>,
    metrics: Option<Arc<SecurityMetrics>>,
}

impl AuditRecorder {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self {
            store,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<SecurityMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Append one entry. A failed append is logged and counted; the caller's
    /// already-committed mutation stands, so the failure is not returned.
    pub async fn record(
        &self,
        actor: &Identity,
        action: AuditAction,
        subject_id: Option<Uuid>,
        meta: serde_json::Value,
    ) -> Option<AuditEntry> {
        let entry = AuditEntry::new(actor.user_id, action, subject_id, meta);
        match self.store.append(&entry).await {
            Ok(()) => {
                info!(
                    audit_id = %entry.id,
                    actor_id = %entry.actor_id,
                    action = %entry.action,
                    subject_id = ?entry.subject_id,
                    "audit_recorded"
                );
                if let Some(metrics) = &self.metrics {
                    metrics.audit_appended(action.as_str());
                }
                Some(entry)
            }
            Err(err) => {
                warn!(
                    error = %err,
                    actor_id = %entry.actor_id,
                    action = %entry.action,
                    subject_id = ?entry.subject_id,
                    "audit_append_failed"
                );
                if let Some(metrics) = &self.metrics {
                    metrics.audit_failed();
                }
                None
            }
        }
    }

    pub async fn recent(&self, limit: usize) -> AuditResult<Vec<AuditEntry>> {
        self.store.list_recent(limit).await
    }
}
