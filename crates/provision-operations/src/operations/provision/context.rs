use std::sync::Arc;
use std::time::Duration;

use provision_core::ProvisioningInput;

use super::broadcaster::ProgressBroadcaster;
use crate::AuditTrail;
use crate::traits::{AuditSink, ProgressSink, ProvisioningStore, WorkspaceOperations};

/// Collaborators shared by every run the engine performs.
#[derive(Clone)]
pub struct EngineContext {
    workspace: Arc<dyn WorkspaceOperations>,
    store: Arc<dyn ProvisioningStore>,
    audit: AuditTrail,
    broadcaster: ProgressBroadcaster,
    hub_url: String,
    step_timeout: Option<Duration>,
}

impl EngineContext {
    pub fn new(
        workspace: Arc<dyn WorkspaceOperations>,
        store: Arc<dyn ProvisioningStore>,
        audit: Arc<dyn AuditSink>,
        hub_url: impl Into<String>,
    ) -> Self {
        Self {
            workspace,
            store,
            audit: AuditTrail::new(audit),
            broadcaster: ProgressBroadcaster::disabled(),
            hub_url: hub_url.into(),
            step_timeout: None,
        }
    }

    #[must_use]
    pub fn with_progress_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.broadcaster = ProgressBroadcaster::new(sink);
        self
    }

    /// Bound each step and compensation call by `timeout`.
    #[must_use]
    pub fn with_step_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.step_timeout = timeout;
        self
    }

    #[must_use]
    pub fn workspace(&self) -> &Arc<dyn WorkspaceOperations> {
        &self.workspace
    }

    #[must_use]
    pub fn store(&self) -> &dyn ProvisioningStore {
        self.store.as_ref()
    }

    #[must_use]
    pub fn audit(&self) -> &AuditTrail {
        &self.audit
    }

    #[must_use]
    pub fn broadcaster(&self) -> &ProgressBroadcaster {
        &self.broadcaster
    }

    #[must_use]
    pub fn hub_url(&self) -> &str {
        &self.hub_url
    }

    #[must_use]
    pub fn step_timeout(&self) -> Option<Duration> {
        self.step_timeout
    }
}

/// What the steps of a single run see: the workspace platform and the
/// request being provisioned.
pub struct StepContext {
    workspace: Arc<dyn WorkspaceOperations>,
    input: ProvisioningInput,
    hub_url: String,
}

impl StepContext {
    pub fn new(
        workspace: Arc<dyn WorkspaceOperations>,
        input: ProvisioningInput,
        hub_url: impl Into<String>,
    ) -> Self {
        Self {
            workspace,
            input,
            hub_url: hub_url.into(),
        }
    }

    #[must_use]
    pub fn workspace(&self) -> &dyn WorkspaceOperations {
        self.workspace.as_ref()
    }

    #[must_use]
    pub fn input(&self) -> &ProvisioningInput {
        &self.input
    }

    #[must_use]
    pub fn hub_url(&self) -> &str {
        &self.hub_url
    }
}

/// Values produced by earlier steps and read by later steps and by
/// compensations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvisioningState {
    pub site_url: Option<String>,
}

impl ProvisioningState {
    #[must_use]
    pub fn resumed(site_url: Option<String>) -> Self {
        Self { site_url }
    }

    /// # Errors
    ///
    /// Returns [`OperationError::MissingWorkspaceAddress`](crate::OperationError::MissingWorkspaceAddress)
    /// if the workspace has not been created yet.
    pub fn require_site_url(&self) -> crate::Result<&str> {
        self.site_url
            .as_deref()
            .ok_or(crate::OperationError::MissingWorkspaceAddress)
    }
}
