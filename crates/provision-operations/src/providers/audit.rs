use async_trait::async_trait;
use provision_core::AuditEntry;
use tracing::info;

use crate::Result;
use crate::traits::AuditSink;

/// Writes audit entries as `tracing` events under the `provisioning::audit`
/// target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl TracingAuditSink {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn log_audit(&self, entry: &AuditEntry) -> Result<()> {
        info!(
            target: "provisioning::audit",
            action = %entry.action,
            entity_type = ?entry.entity_type,
            entity_id = %entry.entity_id,
            project_code = %entry.project_code,
            user = %entry.user,
            timestamp = %entry.timestamp.to_rfc3339(),
            "{}",
            entry.details
        );
        Ok(())
    }
}
