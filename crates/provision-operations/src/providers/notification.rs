use async_trait::async_trait;
use tracing::info;

use crate::Result;
use crate::traits::{CompletionNotice, NotificationSink};

/// Logs completion notices instead of delivering them.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotificationSink;

impl TracingNotificationSink {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NotificationSink for TracingNotificationSink {
    async fn send_completion(&self, notice: &CompletionNotice) -> Result<()> {
        info!(
            target: "provisioning::notifications",
            project_code = %notice.project_code,
            site_url = %notice.site_url,
            recipients = ?notice.recipients,
            "workspace for '{}' is ready",
            notice.project_name
        );
        Ok(())
    }
}
