use async_trait::async_trait;
use provision_core::{
    AuditAction, AuditEntry, CompensationResult, IdempotencyToken, ProgressMessage,
    ProvisioningInput, ProvisioningLogPatch, StepStatus, TOTAL_STEPS,
};
use provision_saga::{CompensationRecord, SagaObserver, StepInfo};
use tracing::warn;

use super::context::{EngineContext, ProvisioningState};

/// Mirrors saga transitions into the provisioning log, the progress sink and
/// the audit trail.
pub(super) struct EngineObserver<'a> {
    context: &'a EngineContext,
    input: &'a ProvisioningInput,
    token: &'a IdempotencyToken,
}

impl<'a> EngineObserver<'a> {
    pub(super) fn new(
        context: &'a EngineContext,
        input: &'a ProvisioningInput,
        token: &'a IdempotencyToken,
    ) -> Self {
        Self {
            context,
            input,
            token,
        }
    }

    async fn persist(&self, patch: ProvisioningLogPatch) {
        persist(self.context, &self.input.project_code, &patch).await;
    }
}

/// Applies `patch` to the stored log. A failing store never fails the run.
pub(super) async fn persist(context: &EngineContext, project_code: &str, patch: &ProvisioningLogPatch) {
    if let Err(error) = context
        .store()
        .update_provisioning_log(project_code, patch)
        .await
    {
        warn!(%project_code, status = ?patch.status, %error, "failed to persist provisioning log");
    }
}

pub(super) fn step_number(info: StepInfo) -> u8 {
    u8::try_from(info.number).unwrap_or(TOTAL_STEPS)
}

#[async_trait]
impl SagaObserver<ProvisioningState> for EngineObserver<'_> {
    async fn step_started(&self, step: StepInfo, _state: &ProvisioningState) {
        let number = step_number(step);
        let completed = number - 1;
        self.context
            .broadcaster()
            .broadcast(&ProgressMessage::new(number, StepStatus::InProgress, completed));
        self.persist(ProvisioningLogPatch::in_progress(number, completed).with_token(self.token.clone()))
            .await;
    }

    async fn step_completed(&self, step: StepInfo, state: &ProvisioningState) {
        let number = step_number(step);
        self.context
            .broadcaster()
            .broadcast(&ProgressMessage::new(number, StepStatus::Completed, number));
        self.persist(
            ProvisioningLogPatch::in_progress(number, number).with_site_url(state.site_url.clone()),
        )
        .await;
    }

    async fn step_failed(&self, step: StepInfo, error: &str) {
        let number = step_number(step);
        let completed = number - 1;
        self.context.broadcaster().broadcast(
            &ProgressMessage::new(number, StepStatus::Failed, completed).with_error(error),
        );
        self.persist(ProvisioningLogPatch::failed(number, error, completed))
            .await;
    }

    async fn compensation_started(&self, step: StepInfo) {
        let number = step_number(step);
        self.context.broadcaster().broadcast(&ProgressMessage::new(
            number,
            StepStatus::Compensating,
            number - 1,
        ));
        self.persist(ProvisioningLogPatch::compensating()).await;
    }

    async fn compensation_finished(&self, record: &CompensationRecord) {
        self.context
            .audit()
            .record(compensation_audit_entry(self.input, record))
            .await;
    }
}

pub(super) fn compensation_result(record: &CompensationRecord) -> CompensationResult {
    CompensationResult {
        step: step_number(record.step),
        label: record.step.name.to_string(),
        success: record.success,
        error: record.error.clone(),
        duration_ms: u64::try_from(record.duration.as_millis()).unwrap_or(u64::MAX),
        timestamp: record.timestamp,
    }
}

fn compensation_audit_entry(input: &ProvisioningInput, record: &CompensationRecord) -> AuditEntry {
    let number = record.step.number;
    let label = record.step.name;
    let (action, details) = match (&record.error, record.step.critical) {
        (None, _) => (
            AuditAction::StepCompensated,
            format!(
                "Compensated step {number} ({label}) in {}ms",
                record.duration.as_millis()
            ),
        ),
        (Some(error), true) => (
            AuditAction::CompensationFailed,
            format!(
                "CRITICAL: compensation of step {number} ({label}) failed: {error}. \
                 The workspace may be orphaned; manual intervention required."
            ),
        ),
        (Some(error), false) => (
            AuditAction::CompensationFailed,
            format!("Compensation of step {number} ({label}) failed: {error}"),
        ),
    };

    AuditEntry::project(action, &input.project_code, &input.requested_by, details)
}
