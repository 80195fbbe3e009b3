use std::sync::Arc;

use provision_core::AuditEntry;
use tracing::warn;

use crate::traits::AuditSink;

/// Wraps an [`AuditSink`] so that a failing sink never fails the caller.
///
/// Entries are written in call order; a run's compensation entries always
/// precede its final `ProvisioningFailed` entry.
#[derive(Clone)]
pub struct AuditTrail {
    sink: Arc<dyn AuditSink>,
}

impl AuditTrail {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }

    /// Writes `entry` and waits for the sink. Failures are logged.
    pub async fn record(&self, entry: AuditEntry) {
        write_entry(self.sink.as_ref(), &entry).await;
    }
}

async fn write_entry(sink: &dyn AuditSink, entry: &AuditEntry) {
    if let Err(error) = sink.log_audit(entry).await {
        warn!(
            action = %entry.action,
            project_code = %entry.project_code,
            %error,
            "failed to write audit entry"
        );
    }
}
