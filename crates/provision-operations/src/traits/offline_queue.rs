use async_trait::async_trait;
use provision_core::ProvisioningInput;

use crate::Result;

/// Requests captured while neither the remote orchestrator nor the local
/// engine could start them.
#[async_trait]
pub trait OfflineQueue: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the request cannot be stored.
    async fn enqueue(&self, input: &ProvisioningInput) -> Result<()>;

    /// Removes and returns every queued request in arrival order.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue cannot be read or cleared.
    async fn drain(&self) -> Result<Vec<ProvisioningInput>>;
}
