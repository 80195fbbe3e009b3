use std::fmt::Display;
use std::future::Future;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::audit::SagaAuditLog;
use crate::error::{SagaError, StepFailure};
use crate::observer::{CompensationRecord, SagaObserver, StepInfo};
use crate::step::SagaStep;

pub(crate) type BoxedStep<S, C, E> = Box<dyn SagaStep<State = S, Context = C, Error = E>>;

/// The step that stopped a run.
#[derive(Debug)]
pub struct FailedStep<E> {
    pub step: StepInfo,
    pub error: StepFailure<E>,
}

/// Result of a saga run. Runs never return an error for a failed step;
/// the failure and the rollback that followed are described here.
#[derive(Debug)]
pub struct SagaOutcome<E> {
    /// Steps that completed during this run, in execution order.
    pub completed: Vec<StepInfo>,
    pub failure: Option<FailedStep<E>>,
    /// One record per attempted compensation, in the order they ran.
    pub compensations: Vec<CompensationRecord>,
    pub audit_log: SagaAuditLog,
}

impl<E> SagaOutcome<E> {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

/// A compiled saga: an immutable step table shared by forward execution and
/// reverse compensation.
pub struct Saga<S, C, E> {
    steps: Vec<BoxedStep<S, C, E>>,
    step_timeout: Option<Duration>,
}

impl<S, C, E> Saga<S, C, E> {
    pub(crate) fn from_steps(steps: Vec<BoxedStep<S, C, E>>) -> Self {
        Self {
            steps,
            step_timeout: None,
        }
    }

    /// Bound every step and compensation invocation by `timeout`.
    #[must_use]
    pub fn with_step_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.step_timeout = timeout;
        self
    }

    #[must_use]
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }
}

impl<S, C, E> Saga<S, C, E>
where
    S: Send + Sync,
    C: Send + Sync,
    E: Display + Send,
{
    pub fn steps(&self) -> impl Iterator<Item = StepInfo> + '_ {
        (0..self.steps.len()).map(|index| self.info(index))
    }

    fn info(&self, index: usize) -> StepInfo {
        let step = &self.steps[index];
        StepInfo {
            number: index + 1,
            name: step.name(),
            critical: step.is_critical(),
        }
    }
}

impl<S, C, E> Saga<S, C, E>
where
    S: Send + Sync,
    C: Send + Sync,
    E: Display + Send,
{
    /// Run every step from step 1.
    pub async fn execute(
        &self,
        ctx: &C,
        state: &mut S,
        observer: &dyn SagaObserver<S>,
        cancel: &CancellationToken,
    ) -> SagaOutcome<E> {
        self.run(0, ctx, state, observer, cancel).await
    }

    /// Run the steps from `start` (1-based) onwards.
    ///
    /// Steps before `start` are treated as done by an earlier run: they are
    /// neither executed nor compensated.
    ///
    /// # Errors
    ///
    /// Returns an error if `start` does not name a step of this saga.
    pub async fn execute_from(
        &self,
        start: usize,
        ctx: &C,
        state: &mut S,
        observer: &dyn SagaObserver<S>,
        cancel: &CancellationToken,
    ) -> Result<SagaOutcome<E>, SagaError> {
        if start == 0 || start > self.steps.len() {
            return Err(SagaError::InvalidStartStep {
                start,
                len: self.steps.len(),
            });
        }
        Ok(self.run(start - 1, ctx, state, observer, cancel).await)
    }

    async fn run(
        &self,
        first_index: usize,
        ctx: &C,
        state: &mut S,
        observer: &dyn SagaObserver<S>,
        cancel: &CancellationToken,
    ) -> SagaOutcome<E> {
        let mut audit_log = SagaAuditLog::new();
        let mut completed: Vec<usize> = Vec::new();

        for index in first_index..self.steps.len() {
            let step = &self.steps[index];
            let info = self.info(index);

            observer.step_started(info, state).await;
            audit_log.record_start(info);

            let result = guarded(step.execute(ctx, state), self.step_timeout, Some(cancel)).await;

            match result {
                Ok(()) => {
                    audit_log.record_success(step.compensation_description());
                    completed.push(index);
                    debug!(step = info.number, name = info.name, "saga step completed");
                    observer.step_completed(info, state).await;
                }
                Err(error) => {
                    audit_log.record_failure();
                    let message = error.to_string();
                    warn!(step = info.number, name = info.name, error = %message, "saga step failed");
                    observer.step_failed(info, &message).await;

                    let compensations = self
                        .compensate(ctx, state, &completed, observer, &mut audit_log)
                        .await;

                    return SagaOutcome {
                        completed: completed.iter().map(|&i| self.info(i)).collect(),
                        failure: Some(FailedStep { step: info, error }),
                        compensations,
                        audit_log,
                    };
                }
            }
        }

        SagaOutcome {
            completed: completed.iter().map(|&i| self.info(i)).collect(),
            failure: None,
            compensations: Vec::new(),
            audit_log,
        }
    }

    /// Undo `completed` in reverse order, continuing past failures.
    async fn compensate(
        &self,
        ctx: &C,
        state: &S,
        completed: &[usize],
        observer: &dyn SagaObserver<S>,
        audit_log: &mut SagaAuditLog,
    ) -> Vec<CompensationRecord> {
        let mut records = Vec::with_capacity(completed.len());

        for &index in completed.iter().rev() {
            let step = &self.steps[index];
            let info = self.info(index);

            observer.compensation_started(info).await;
            debug!(step = info.number, description = %step.compensation_description(), "compensating saga step");

            let started = Instant::now();
            let result = guarded(step.compensate(ctx, state), self.step_timeout, None).await;
            let duration = started.elapsed();

            let error = match result {
                Ok(()) => {
                    audit_log.record_compensated(info.number);
                    None
                }
                Err(error) => {
                    audit_log.record_compensation_failed(info.number);
                    warn!(step = info.number, name = info.name, error = %error, "compensation failed");
                    Some(error.to_string())
                }
            };

            let record = CompensationRecord {
                step: info,
                success: error.is_none(),
                error,
                duration,
                timestamp: Utc::now(),
            };
            observer.compensation_finished(&record).await;
            records.push(record);
        }

        records
    }
}

/// Race `operation` against the timeout and the cancellation token.
async fn guarded<F, E>(
    operation: F,
    timeout: Option<Duration>,
    cancel: Option<&CancellationToken>,
) -> Result<(), StepFailure<E>>
where
    F: Future<Output = Result<(), E>>,
{
    let bounded = async {
        match timeout {
            Some(limit) => match tokio::time::timeout(limit, operation).await {
                Ok(result) => result.map_err(StepFailure::Failed),
                Err(_elapsed) => Err(StepFailure::TimedOut(limit)),
            },
            None => operation.await.map_err(StepFailure::Failed),
        }
    };

    match cancel {
        Some(token) => {
            tokio::select! {
                biased;
                () = token.cancelled() => Err(StepFailure::Cancelled),
                result = bounded => result,
            }
        }
        None => bounded.await,
    }
}
