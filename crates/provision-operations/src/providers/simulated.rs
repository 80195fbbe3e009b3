use std::time::Duration;

use async_trait::async_trait;
use provision_config::ProvisioningConfig;
use tracing::debug;

use crate::traits::{HubNavigation, SourceRecordUpdate, WorkspaceOperations};
use crate::{OperationError, Result};

const DEFAULT_LATENCY: Duration = Duration::from_millis(250);

/// Stand-in for the workspace platform: every call waits a fixed latency and
/// succeeds, except the forward operation of an optional failing step.
///
/// Workspaces are addressed as `<hub base>/sites/<alias>`.
#[derive(Debug, Clone)]
pub struct SimulatedWorkspaceOperations {
    base_url: String,
    latency: Duration,
    fail_at_step: Option<u8>,
}

impl SimulatedWorkspaceOperations {
    #[must_use]
    pub fn new(hub_url: &str) -> Self {
        Self {
            base_url: site_base(hub_url).to_string(),
            latency: DEFAULT_LATENCY,
            fail_at_step: None,
        }
    }

    #[must_use]
    pub fn from_config(config: &ProvisioningConfig) -> Self {
        Self::new(config.hub_url())
            .with_latency(config.simulation().latency())
            .with_fail_at_step(config.simulation().fail_at_step())
    }

    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    #[must_use]
    pub fn with_fail_at_step(mut self, step: Option<u8>) -> Self {
        self.fail_at_step = step;
        self
    }

    async fn forward(&self, step: u8, operation: &'static str) -> Result<()> {
        tokio::time::sleep(self.latency).await;
        if self.fail_at_step == Some(step) {
            debug!(operation, step, "simulated failure");
            return Err(OperationError::Workspace {
                operation,
                message: format!("simulated failure at step {step}"),
            });
        }
        debug!(operation, step, "simulated call");
        Ok(())
    }

    async fn inverse(&self, operation: &'static str) -> Result<()> {
        tokio::time::sleep(self.latency).await;
        debug!(operation, "simulated rollback");
        Ok(())
    }
}

/// Scheme and host of `hub_url`, or the whole URL if it has no path.
fn site_base(hub_url: &str) -> &str {
    let trimmed = hub_url.trim_end_matches('/');
    let after_scheme = trimmed.find("://").map_or(0, |index| index + 3);
    match trimmed[after_scheme..].find('/') {
        Some(index) => &trimmed[..after_scheme + index],
        None => trimmed,
    }
}

#[async_trait]
impl WorkspaceOperations for SimulatedWorkspaceOperations {
    async fn create_workspace(
        &self,
        _project_code: &str,
        _project_name: &str,
        alias: &str,
    ) -> Result<String> {
        self.forward(1, "create_workspace").await?;
        Ok(format!("{}/sites/{alias}", self.base_url))
    }

    async fn provision_lists(&self, _site_url: &str, _project_code: &str) -> Result<()> {
        self.forward(2, "provision_lists").await
    }

    async fn associate_with_hub(&self, _site_url: &str, _hub_url: &str) -> Result<()> {
        self.forward(3, "associate_with_hub").await
    }

    async fn create_security_groups(
        &self,
        _site_url: &str,
        _project_code: &str,
        _division: &str,
    ) -> Result<()> {
        self.forward(4, "create_security_groups").await
    }

    async fn apply_templates(
        &self,
        _site_url: &str,
        _project_code: &str,
        _division: &str,
    ) -> Result<()> {
        self.forward(5, "apply_templates").await
    }

    async fn apply_named_template(&self, _site_url: &str, _template_name: &str) -> Result<()> {
        self.forward(5, "apply_named_template").await
    }

    async fn copy_source_record_data(
        &self,
        _site_url: &str,
        _lead_id: u64,
        _project_code: &str,
    ) -> Result<()> {
        self.forward(6, "copy_source_record_data").await
    }

    async fn update_source_record(&self, _lead_id: u64, _update: &SourceRecordUpdate) -> Result<()> {
        self.forward(7, "update_source_record").await
    }

    async fn delete_workspace(&self, _site_url: &str) -> Result<()> {
        self.inverse("delete_workspace").await
    }

    async fn remove_lists(&self, _site_url: &str, _project_code: &str) -> Result<()> {
        self.inverse("remove_lists").await
    }

    async fn dissociate_from_hub(&self, _site_url: &str) -> Result<()> {
        self.inverse("dissociate_from_hub").await
    }

    async fn delete_security_groups(&self, _site_url: &str, _project_code: &str) -> Result<()> {
        self.inverse("delete_security_groups").await
    }

    async fn remove_templates(&self, _site_url: &str, _project_code: &str) -> Result<()> {
        self.inverse("remove_templates").await
    }

    async fn remove_copied_data(&self, _site_url: &str, _project_code: &str) -> Result<()> {
        self.inverse("remove_copied_data").await
    }
}

#[async_trait]
impl HubNavigation for SimulatedWorkspaceOperations {
    async fn register_link(&self, title: &str, url: &str) -> Result<()> {
        tokio::time::sleep(self.latency).await;
        debug!(%title, %url, "simulated hub navigation link");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn site_base_keeps_scheme_and_host() {
        assert_eq!(
            site_base("https://tenant.example.com/sites/projects-hub"),
            "https://tenant.example.com"
        );
        assert_eq!(site_base("https://tenant.example.com/"), "https://tenant.example.com");
        assert_eq!(site_base("tenant.example.com/sites/hub"), "tenant.example.com");
    }

    #[tokio::test(start_paused = true)]
    async fn workspace_address_uses_alias() -> anyhow::Result<()> {
        let ops = SimulatedWorkspaceOperations::new("https://tenant.example.com/sites/projects-hub");

        let url = ops
            .create_workspace("25-042-01", "Harbor Point Tower", "2504201")
            .await?;

        assert_eq!(url, "https://tenant.example.com/sites/2504201");
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn configured_step_fails() {
        let ops = SimulatedWorkspaceOperations::new("https://tenant.example.com")
            .with_latency(Duration::ZERO)
            .with_fail_at_step(Some(4));

        assert!(ops.provision_lists("url", "code").await.is_ok());
        let err = ops
            .create_security_groups("url", "code", "Commercial")
            .await
            .expect_err("step 4 fails");
        assert!(err.to_string().contains("simulated failure at step 4"));
        assert!(ops.delete_security_groups("url", "code").await.is_ok());
    }
}
