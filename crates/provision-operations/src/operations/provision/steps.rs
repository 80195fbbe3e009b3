use std::time::Duration;

use async_trait::async_trait;
use provision_core::{ProvisioningInput, TOTAL_STEPS};
use provision_saga::{Saga, SagaBuilder, SagaStep};
use tracing::debug;

use super::context::{ProvisioningState, StepContext};
use crate::traits::SourceRecordUpdate;
use crate::{OperationError, Result};

/// Labels of the provisioning steps, in execution order.
pub const STEP_LABELS: [&str; TOTAL_STEPS as usize] = [
    "Create workspace",
    "Provision lists",
    "Associate with hub",
    "Create security groups",
    "Apply templates",
    "Copy source record data",
    "Update source record",
];

/// Label of the 1-based `step`, or `"Unknown step"` outside the table.
#[must_use]
pub fn step_label(step: u8) -> &'static str {
    usize::from(step)
        .checked_sub(1)
        .and_then(|index| STEP_LABELS.get(index))
        .copied()
        .unwrap_or("Unknown step")
}

/// Status written to the source record by the final step.
const SOURCE_RECORD_STATUS: &str = "Provisioned";

/// How step 5 applies templates. Fixed when the step table is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateStrategy {
    /// Apply a registered provisioning template by name.
    Named(String),
    /// Copy templates from the legacy template workspace.
    LegacyCopy,
}

impl TemplateStrategy {
    #[must_use]
    pub fn for_input(input: &ProvisioningInput) -> Self {
        match input.template_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => Self::Named(name.to_string()),
            _ => Self::LegacyCopy,
        }
    }
}

pub(super) type ProvisioningSaga = Saga<ProvisioningState, StepContext, OperationError>;

/// Builds the seven-step table for `input`.
pub(super) fn build_saga(input: &ProvisioningInput, step_timeout: Option<Duration>) -> ProvisioningSaga {
    let alias = input.alias();

    SagaBuilder::new()
        .first_step(CreateWorkspaceStep { alias })
        .then(ProvisionListsStep)
        .then(AssociateHubStep)
        .then(CreateSecurityGroupsStep)
        .then(ApplyTemplatesStep {
            strategy: TemplateStrategy::for_input(input),
        })
        .then(CopySourceDataStep)
        .then(UpdateSourceRecordStep)
        .build()
        .with_step_timeout(step_timeout)
}

pub struct CreateWorkspaceStep {
    alias: String,
}

#[async_trait]
impl SagaStep for CreateWorkspaceStep {
    type State = ProvisioningState;
    type Context = StepContext;
    type Error = OperationError;

    fn name(&self) -> &'static str {
        STEP_LABELS[0]
    }

    fn is_critical(&self) -> bool {
        true
    }

    async fn execute(&self, ctx: &StepContext, state: &mut ProvisioningState) -> Result<()> {
        let input = ctx.input();
        let site_url = ctx
            .workspace()
            .create_workspace(&input.project_code, &input.project_name, &self.alias)
            .await?;
        debug!(project_code = %input.project_code, alias = %self.alias, %site_url, "created workspace");
        state.site_url = Some(site_url);
        Ok(())
    }

    async fn compensate(&self, ctx: &StepContext, state: &ProvisioningState) -> Result<()> {
        ctx.workspace()
            .delete_workspace(state.require_site_url()?)
            .await
    }

    fn compensation_description(&self) -> String {
        format!("delete workspace '{}'", self.alias)
    }
}

pub struct ProvisionListsStep;

#[async_trait]
impl SagaStep for ProvisionListsStep {
    type State = ProvisioningState;
    type Context = StepContext;
    type Error = OperationError;

    fn name(&self) -> &'static str {
        STEP_LABELS[1]
    }

    async fn execute(&self, ctx: &StepContext, state: &mut ProvisioningState) -> Result<()> {
        ctx.workspace()
            .provision_lists(state.require_site_url()?, &ctx.input().project_code)
            .await
    }

    async fn compensate(&self, ctx: &StepContext, state: &ProvisioningState) -> Result<()> {
        ctx.workspace()
            .remove_lists(state.require_site_url()?, &ctx.input().project_code)
            .await
    }

    fn compensation_description(&self) -> String {
        "remove provisioned lists".to_string()
    }
}

pub struct AssociateHubStep;

#[async_trait]
impl SagaStep for AssociateHubStep {
    type State = ProvisioningState;
    type Context = StepContext;
    type Error = OperationError;

    fn name(&self) -> &'static str {
        STEP_LABELS[2]
    }

    async fn execute(&self, ctx: &StepContext, state: &mut ProvisioningState) -> Result<()> {
        ctx.workspace()
            .associate_with_hub(state.require_site_url()?, ctx.hub_url())
            .await
    }

    async fn compensate(&self, ctx: &StepContext, state: &ProvisioningState) -> Result<()> {
        ctx.workspace()
            .dissociate_from_hub(state.require_site_url()?)
            .await
    }

    fn compensation_description(&self) -> String {
        "dissociate workspace from hub".to_string()
    }
}

pub struct CreateSecurityGroupsStep;

#[async_trait]
impl SagaStep for CreateSecurityGroupsStep {
    type State = ProvisioningState;
    type Context = StepContext;
    type Error = OperationError;

    fn name(&self) -> &'static str {
        STEP_LABELS[3]
    }

    async fn execute(&self, ctx: &StepContext, state: &mut ProvisioningState) -> Result<()> {
        let input = ctx.input();
        ctx.workspace()
            .create_security_groups(
                state.require_site_url()?,
                &input.project_code,
                &input.division,
            )
            .await
    }

    async fn compensate(&self, ctx: &StepContext, state: &ProvisioningState) -> Result<()> {
        ctx.workspace()
            .delete_security_groups(state.require_site_url()?, &ctx.input().project_code)
            .await
    }

    fn compensation_description(&self) -> String {
        "delete security groups".to_string()
    }
}

pub struct ApplyTemplatesStep {
    strategy: TemplateStrategy,
}

#[async_trait]
impl SagaStep for ApplyTemplatesStep {
    type State = ProvisioningState;
    type Context = StepContext;
    type Error = OperationError;

    fn name(&self) -> &'static str {
        STEP_LABELS[4]
    }

    async fn execute(&self, ctx: &StepContext, state: &mut ProvisioningState) -> Result<()> {
        let site_url = state.require_site_url()?;
        let input = ctx.input();
        match &self.strategy {
            TemplateStrategy::Named(template) => {
                debug!(%template, "applying named template");
                ctx.workspace()
                    .apply_named_template(site_url, template)
                    .await
            }
            TemplateStrategy::LegacyCopy => {
                ctx.workspace()
                    .apply_templates(site_url, &input.project_code, &input.division)
                    .await
            }
        }
    }

    async fn compensate(&self, ctx: &StepContext, state: &ProvisioningState) -> Result<()> {
        ctx.workspace()
            .remove_templates(state.require_site_url()?, &ctx.input().project_code)
            .await
    }

    fn compensation_description(&self) -> String {
        "remove applied templates".to_string()
    }
}

pub struct CopySourceDataStep;

#[async_trait]
impl SagaStep for CopySourceDataStep {
    type State = ProvisioningState;
    type Context = StepContext;
    type Error = OperationError;

    fn name(&self) -> &'static str {
        STEP_LABELS[5]
    }

    async fn execute(&self, ctx: &StepContext, state: &mut ProvisioningState) -> Result<()> {
        let input = ctx.input();
        ctx.workspace()
            .copy_source_record_data(state.require_site_url()?, input.lead_id, &input.project_code)
            .await
    }

    async fn compensate(&self, ctx: &StepContext, state: &ProvisioningState) -> Result<()> {
        ctx.workspace()
            .remove_copied_data(state.require_site_url()?, &ctx.input().project_code)
            .await
    }

    fn compensation_description(&self) -> String {
        "remove copied source record data".to_string()
    }
}

/// Last step. Never compensated: nothing runs after it that could fail.
pub struct UpdateSourceRecordStep;

#[async_trait]
impl SagaStep for UpdateSourceRecordStep {
    type State = ProvisioningState;
    type Context = StepContext;
    type Error = OperationError;

    fn name(&self) -> &'static str {
        STEP_LABELS[6]
    }

    async fn execute(&self, ctx: &StepContext, state: &mut ProvisioningState) -> Result<()> {
        let update = SourceRecordUpdate {
            site_url: Some(state.require_site_url()?.to_string()),
            provisioning_status: Some(SOURCE_RECORD_STATUS.to_string()),
        };
        ctx.workspace()
            .update_source_record(ctx.input().lead_id, &update)
            .await
    }

    fn compensation_description(&self) -> String {
        "nothing to undo".to_string()
    }
}
