//! The seven-step provisioning saga and the engine that drives it.

mod broadcaster;
mod context;
mod observer;
mod steps;

use std::sync::Arc;

use chrono::Utc;
use provision_core::{
    AuditAction, AuditEntry, CompensationResult, IdempotencyToken, ProvisioningInput,
    ProvisioningLogPatch, TOTAL_STEPS, validate_step,
};
use provision_saga::{CancellationToken, CompensationRecord, FailedStep, SagaOutcome, StepFailure};
use serde::Serialize;
use tracing::{debug, info, warn};

pub use broadcaster::ProgressBroadcaster;
pub use context::{EngineContext, ProvisioningState, StepContext};
pub use steps::{STEP_LABELS, TemplateStrategy, step_label};

use self::observer::{EngineObserver, compensation_result, persist, step_number};
use self::steps::{ProvisioningSaga, build_saga};
use crate::{OperationError, Result};

/// Result of one run of the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SagaExecutionResult {
    pub success: bool,
    pub completed_steps: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_step: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Present on failure, empty when the first step of the run failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compensation_results: Option<Vec<CompensationResult>>,
    pub idempotency_token: IdempotencyToken,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_url: Option<String>,
}

/// Runs the provisioning saga for one request.
///
/// The step table (including the template strategy and workspace alias) is
/// fixed at construction. Each run generates a fresh idempotency token.
pub struct SagaEngine {
    context: EngineContext,
    step_context: StepContext,
    saga: ProvisioningSaga,
}

impl SagaEngine {
    pub fn new(context: EngineContext, input: ProvisioningInput) -> Self {
        let saga = build_saga(&input, context.step_timeout());
        let step_context = StepContext::new(Arc::clone(context.workspace()), input, context.hub_url());
        Self {
            context,
            step_context,
            saga,
        }
    }

    #[must_use]
    pub fn input(&self) -> &ProvisioningInput {
        self.step_context.input()
    }

    /// Runs every step from step 1.
    ///
    /// Never fails: step errors, timeouts and cancellation are reported in
    /// the returned result after the completed steps have been compensated.
    pub async fn execute(&self, cancel: &CancellationToken) -> SagaExecutionResult {
        self.run(1, ProvisioningState::default(), cancel).await
    }

    /// Runs the steps from `from_step` onwards, as a retry of an earlier run
    /// that created the workspace at `site_url`.
    ///
    /// Steps before `from_step` are neither re-executed nor compensated.
    ///
    /// # Errors
    ///
    /// Returns an error if `from_step` is outside `1..=7`.
    pub async fn resume(
        &self,
        from_step: u8,
        site_url: Option<String>,
        cancel: &CancellationToken,
    ) -> Result<SagaExecutionResult> {
        let from_step = validate_step(from_step)?;
        Ok(self
            .run(from_step, ProvisioningState::resumed(site_url), cancel)
            .await)
    }

    pub(crate) async fn run(
        &self,
        start: u8,
        mut state: ProvisioningState,
        cancel: &CancellationToken,
    ) -> SagaExecutionResult {
        let input = self.step_context.input();
        let token = IdempotencyToken::generate(&input.project_code);
        info!(project_code = %input.project_code, %token, start, "starting provisioning run");

        let observer = EngineObserver::new(&self.context, input, &token);
        let outcome = match self
            .saga
            .execute_from(
                usize::from(start),
                &self.step_context,
                &mut state,
                &observer,
                cancel,
            )
            .await
        {
            Ok(outcome) => outcome,
            Err(error) => {
                warn!(project_code = %input.project_code, %error, "provisioning run rejected");
                return SagaExecutionResult {
                    success: false,
                    completed_steps: start.saturating_sub(1),
                    failed_step: Some(start),
                    error: Some(error.to_string()),
                    compensation_results: Some(Vec::new()),
                    idempotency_token: token,
                    site_url: state.site_url,
                };
            }
        };

        let SagaOutcome {
            failure,
            compensations,
            audit_log,
            ..
        } = outcome;
        debug!(project_code = %input.project_code, "saga audit log:\n{}", audit_log.summary());

        match failure {
            None => self.finish_success(state, token).await,
            Some(failure) => {
                self.finish_failure(failure, &compensations, state, token)
                    .await
            }
        }
    }

    async fn finish_success(
        &self,
        state: ProvisioningState,
        token: IdempotencyToken,
    ) -> SagaExecutionResult {
        let input = self.step_context.input();
        persist(
            &self.context,
            &input.project_code,
            &ProvisioningLogPatch::completed(state.site_url.clone(), Utc::now()),
        )
        .await;

        let site_url = state.site_url;
        self.context
            .audit()
            .record(AuditEntry::project(
                AuditAction::ProvisioningCompleted,
                &input.project_code,
                &input.requested_by,
                format!(
                    "Workspace provisioned at {}",
                    site_url.as_deref().unwrap_or("an unknown address")
                ),
            ))
            .await;
        info!(project_code = %input.project_code, site_url = ?site_url, "provisioning completed");

        SagaExecutionResult {
            success: true,
            completed_steps: TOTAL_STEPS,
            failed_step: None,
            error: None,
            compensation_results: None,
            idempotency_token: token,
            site_url,
        }
    }

    async fn finish_failure(
        &self,
        failure: FailedStep<OperationError>,
        compensations: &[CompensationRecord],
        state: ProvisioningState,
        token: IdempotencyToken,
    ) -> SagaExecutionResult {
        let input = self.step_context.input();
        let failed_step = step_number(failure.step);
        let completed_steps = failed_step - 1;
        let message = failure.error.to_string();
        let operation = match &failure.error {
            StepFailure::Failed(OperationError::Workspace { operation, .. }) => Some(*operation),
            _ => None,
        };
        let results: Vec<CompensationResult> = compensations.iter().map(compensation_result).collect();
        let failed_compensations = results.iter().filter(|result| !result.success).count();

        persist(
            &self.context,
            &input.project_code,
            &ProvisioningLogPatch::failed(failed_step, &message, completed_steps)
                .with_site_url(state.site_url.clone())
                .with_compensation_log(results.clone()),
        )
        .await;

        self.context
            .audit()
            .record(AuditEntry::project(
                AuditAction::ProvisioningFailed,
                &input.project_code,
                &input.requested_by,
                format!(
                    "Step {failed_step} ({}) failed: {message}. Compensated {} step(s), {failed_compensations} compensation(s) failed",
                    failure.step.name,
                    results.len(),
                ),
            ))
            .await;
        warn!(
            project_code = %input.project_code,
            failed_step,
            operation = operation.unwrap_or("none"),
            error = %message,
            compensations = results.len(),
            failed_compensations,
            "provisioning failed"
        );

        SagaExecutionResult {
            success: false,
            completed_steps,
            failed_step: Some(failed_step),
            error: Some(message),
            compensation_results: Some(results),
            idempotency_token: token,
            site_url: state.site_url,
        }
    }
}

#[cfg(test)]
mod tests;
