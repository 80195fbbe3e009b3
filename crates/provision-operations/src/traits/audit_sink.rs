use async_trait::async_trait;
use provision_core::AuditEntry;

use crate::Result;

#[async_trait]
pub trait AuditSink: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the entry cannot be recorded.
    async fn log_audit(&self, entry: &AuditEntry) -> Result<()>;
}
