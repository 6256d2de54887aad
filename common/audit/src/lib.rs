pub mod model;
pub mod recorder;
pub mod store;

pub use model::{AuditAction, AuditEntry, AuditError, AuditResult};
pub use recorder::AuditRecorder;
pub use store::{AuditStore, InMemoryAuditStore};
