use async_trait::async_trait;
use provision_core::{ProvisioningLog, ProvisioningLogPatch};

use crate::Result;

/// Durable storage for provisioning logs, keyed by project code.
#[async_trait]
pub trait ProvisioningStore: Send + Sync {
    /// Stores a new log, replacing any earlier log for the same project.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be written.
    async fn create_log(&self, log: &ProvisioningLog) -> Result<()>;

    /// Applies `patch` to the stored log and returns the result.
    ///
    /// # Errors
    ///
    /// Returns [`OperationError::LogNotFound`](crate::OperationError::LogNotFound)
    /// if no log exists, or an error if it cannot be read or written.
    async fn update_provisioning_log(
        &self,
        project_code: &str,
        patch: &ProvisioningLogPatch,
    ) -> Result<ProvisioningLog>;

    /// Returns the stored log, or `None` if the project was never provisioned.
    ///
    /// # Errors
    ///
    /// Returns an error if a stored log exists but cannot be read.
    async fn get_provisioning_status(&self, project_code: &str) -> Result<Option<ProvisioningLog>>;

    /// Increments the retry count and resets the log to run again from
    /// `from_step`.
    ///
    /// # Errors
    ///
    /// Returns [`OperationError::LogNotFound`](crate::OperationError::LogNotFound)
    /// if no log exists, or an error if it cannot be read or written.
    async fn retry_provisioning(&self, project_code: &str, from_step: u8)
    -> Result<ProvisioningLog>;
}
