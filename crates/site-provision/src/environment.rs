use std::path::Path;
use std::sync::Arc;

use provision_config::{ProvisioningConfig, load_config};
use provision_operations::AuditTrail;
use provision_operations::operations::{EngineContext, ProvisioningService};
#[cfg(feature = "simulation")]
use provision_operations::providers::SimulatedWorkspaceOperations;
use provision_operations::providers::{
    FileSystemOfflineQueue, FileSystemProvisioningStore, TracingAuditSink, TracingNotificationSink,
};
use provision_operations::tasks::{PostCompletionQueue, PostCompletionRunner};
use provision_operations::traits::{HubNavigation, WorkspaceOperations};
use tracing::debug;

use crate::error::{CliError, Result};
use crate::output::ConsoleProgress;

/// Loaded configuration plus the providers built from it.
pub(crate) struct Environment {
    config: ProvisioningConfig,
    store: Arc<FileSystemProvisioningStore>,
}

impl Environment {
    pub(crate) fn load(config_path: &Path) -> Result<Self> {
        let config = load_config(config_path)?;
        debug!(
            config = %config_path.display(),
            state_dir = %config.state_dir().display(),
            "configuration loaded"
        );
        let store = Arc::new(FileSystemProvisioningStore::new(config.state_dir()));
        Ok(Self { config, store })
    }

    pub(crate) fn config(&self) -> &ProvisioningConfig {
        &self.config
    }

    pub(crate) fn store(&self) -> &FileSystemProvisioningStore {
        &self.store
    }

    /// Wires a service against the workspace platform. Must be called
    /// inside the runtime: the post-completion worker is spawned here.
    pub(crate) fn service(&self) -> Result<ProvisioningService> {
        let (workspace, hub_navigation) = self.platform()?;
        let audit = Arc::new(TracingAuditSink::new());

        let context = EngineContext::new(
            workspace.clone(),
            self.store.clone(),
            audit.clone(),
            self.config.hub_url(),
        )
        .with_progress_sink(Arc::new(ConsoleProgress))
        .with_step_timeout(self.config.step_timeout());

        let mut runner = PostCompletionRunner::new(workspace.clone(), AuditTrail::new(audit));
        if self.config.hub_navigation() {
            runner = runner.with_hub_navigation(hub_navigation);
        }
        if !self.config.notification_recipients().is_empty() {
            runner = runner.with_notifications(
                Arc::new(TracingNotificationSink::new()),
                self.config.notification_recipients().to_vec(),
            );
        }

        let mut service = ProvisioningService::new(context, PostCompletionQueue::spawn(runner));
        if self.config.offline_queue() {
            service = service
                .with_offline_queue(Arc::new(FileSystemOfflineQueue::new(self.config.state_dir())));
        }
        Ok(service)
    }

    #[cfg(feature = "simulation")]
    fn platform(&self) -> Result<(Arc<dyn WorkspaceOperations>, Arc<dyn HubNavigation>)> {
        if !self.config.simulation().enabled() {
            return Err(CliError::NoWorkspacePlatform);
        }
        let simulated = Arc::new(SimulatedWorkspaceOperations::from_config(&self.config));
        let workspace: Arc<dyn WorkspaceOperations> = simulated.clone();
        let hub_navigation: Arc<dyn HubNavigation> = simulated;
        Ok((workspace, hub_navigation))
    }

    #[cfg(not(feature = "simulation"))]
    #[allow(clippy::unused_self)]
    fn platform(&self) -> Result<(Arc<dyn WorkspaceOperations>, Arc<dyn HubNavigation>)> {
        Err(CliError::NoWorkspacePlatform)
    }
}
