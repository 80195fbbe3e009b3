use async_trait::async_trait;

use crate::Result;

/// Announcement that a project workspace is ready.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionNotice {
    pub project_code: String,
    pub project_name: String,
    pub site_url: String,
    pub requested_by: String,
    pub recipients: Vec<String>,
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the notice cannot be delivered.
    async fn send_completion(&self, notice: &CompletionNotice) -> Result<()>;
}
