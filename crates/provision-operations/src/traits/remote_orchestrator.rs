use async_trait::async_trait;
use provision_core::{ProvisioningInput, ProvisioningLog};

use crate::Result;

/// Hosted orchestration service that runs provisioning outside this process.
#[async_trait]
pub trait RemoteOrchestrator: Send + Sync {
    /// Starts a remote run and returns its initial log.
    ///
    /// # Errors
    ///
    /// Returns an error if the orchestrator is unreachable or rejects the
    /// request.
    async fn trigger(&self, input: &ProvisioningInput) -> Result<ProvisioningLog>;
}
