use async_trait::async_trait;

use crate::Result;

/// Fields written back to the source record (the lead a project came from).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceRecordUpdate {
    pub site_url: Option<String>,
    pub provisioning_status: Option<String>,
}

/// Remote workspace platform.
///
/// Every forward operation has an inverse used during rollback, except
/// [`update_source_record`](Self::update_source_record), which is the last
/// step and is never compensated. Inverses should tolerate resources that are
/// already gone.
#[async_trait]
pub trait WorkspaceOperations: Send + Sync {
    /// Creates the workspace and returns its address.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform rejects the request.
    async fn create_workspace(
        &self,
        project_code: &str,
        project_name: &str,
        alias: &str,
    ) -> Result<String>;

    /// # Errors
    ///
    /// Returns an error if any list cannot be created.
    async fn provision_lists(&self, site_url: &str, project_code: &str) -> Result<()>;

    /// # Errors
    ///
    /// Returns an error if the hub rejects the association.
    async fn associate_with_hub(&self, site_url: &str, hub_url: &str) -> Result<()>;

    /// # Errors
    ///
    /// Returns an error if any group cannot be created or assigned.
    async fn create_security_groups(
        &self,
        site_url: &str,
        project_code: &str,
        division: &str,
    ) -> Result<()>;

    /// Applies the division templates by copying from the legacy template
    /// workspace.
    ///
    /// # Errors
    ///
    /// Returns an error if any template cannot be applied.
    async fn apply_templates(&self, site_url: &str, project_code: &str, division: &str)
    -> Result<()>;

    /// Applies a provisioning template registered under `template_name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the template is unknown or fails to apply.
    async fn apply_named_template(&self, site_url: &str, template_name: &str) -> Result<()>;

    /// # Errors
    ///
    /// Returns an error if the source record cannot be read or copied.
    async fn copy_source_record_data(
        &self,
        site_url: &str,
        lead_id: u64,
        project_code: &str,
    ) -> Result<()>;

    /// # Errors
    ///
    /// Returns an error if the source record cannot be updated.
    async fn update_source_record(&self, lead_id: u64, update: &SourceRecordUpdate) -> Result<()>;

    /// # Errors
    ///
    /// Returns an error if the workspace still exists afterwards.
    async fn delete_workspace(&self, site_url: &str) -> Result<()>;

    /// # Errors
    ///
    /// Returns an error if the lists cannot be removed.
    async fn remove_lists(&self, site_url: &str, project_code: &str) -> Result<()>;

    /// # Errors
    ///
    /// Returns an error if the hub association cannot be removed.
    async fn dissociate_from_hub(&self, site_url: &str) -> Result<()>;

    /// # Errors
    ///
    /// Returns an error if the groups cannot be deleted.
    async fn delete_security_groups(&self, site_url: &str, project_code: &str) -> Result<()>;

    /// # Errors
    ///
    /// Returns an error if applied templates cannot be removed.
    async fn remove_templates(&self, site_url: &str, project_code: &str) -> Result<()>;

    /// # Errors
    ///
    /// Returns an error if the copied data cannot be removed.
    async fn remove_copied_data(&self, site_url: &str, project_code: &str) -> Result<()>;
}
