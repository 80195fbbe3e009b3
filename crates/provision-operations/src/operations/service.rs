use std::sync::Arc;

use chrono::Utc;
use provision_core::{
    AuditAction, AuditEntry, MAX_RETRIES, ProvisioningInput, ProvisioningLog, validate_step,
};
use provision_saga::CancellationToken;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::provision::{EngineContext, ProvisioningState, SagaEngine, SagaExecutionResult};
use crate::tasks::{PostCompletionJob, PostCompletionQueue, TaskOutcome};
use crate::traits::{OfflineQueue, RemoteOrchestrator};
use crate::{OperationError, Result};

/// What a finished run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub result: SagaExecutionResult,
    /// Empty unless the run succeeded.
    pub post_completion: Vec<TaskOutcome>,
}

/// A run started in the background.
///
/// Dropping the handle lets the run continue; [`cancel`](Self::cancel) stops
/// it at the current step and rolls back.
#[derive(Debug)]
pub struct ProvisioningRun {
    log: ProvisioningLog,
    cancel: CancellationToken,
    handle: JoinHandle<RunReport>,
}

impl ProvisioningRun {
    /// The log as it was when the run was started.
    #[must_use]
    pub fn log(&self) -> &ProvisioningLog {
        &self.log
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Waits for the run and its post-completion tasks to finish.
    ///
    /// # Errors
    ///
    /// Returns an error if the run's task panicked or was aborted.
    pub async fn join(self) -> Result<RunReport> {
        Ok(self.handle.await?)
    }
}

/// Entry point for callers: starts, retries and inspects provisioning runs.
pub struct ProvisioningService {
    pub(super) context: EngineContext,
    pub(super) post_completion: PostCompletionQueue,
    pub(super) remote: Option<Arc<dyn RemoteOrchestrator>>,
    pub(super) offline_queue: Option<Arc<dyn OfflineQueue>>,
}

impl ProvisioningService {
    pub fn new(context: EngineContext, post_completion: PostCompletionQueue) -> Self {
        Self {
            context,
            post_completion,
            remote: None,
            offline_queue: None,
        }
    }

    #[must_use]
    pub fn with_remote_orchestrator(mut self, remote: Arc<dyn RemoteOrchestrator>) -> Self {
        self.remote = Some(remote);
        self
    }

    #[must_use]
    pub fn with_offline_queue(mut self, queue: Arc<dyn OfflineQueue>) -> Self {
        self.offline_queue = Some(queue);
        self
    }

    #[must_use]
    pub fn context(&self) -> &EngineContext {
        &self.context
    }

    /// Records a `Queued` log and starts the saga in the background.
    ///
    /// Returns as soon as the run has been spawned; progress is observable
    /// through the store and the progress sink.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is invalid or the initial log cannot be
    /// stored. Nothing has run in that case.
    pub async fn provision_site(&self, input: ProvisioningInput) -> Result<ProvisioningRun> {
        input.validate()?;

        let log = ProvisioningLog::queued(input.clone(), Utc::now());
        self.context.store().create_log(&log).await?;

        self.context
            .audit()
            .record(AuditEntry::project(
                AuditAction::ProvisioningTriggered,
                &input.project_code,
                &input.requested_by,
                format!(
                    "Provisioning triggered for '{}' ({})",
                    input.project_name, input.client_name
                ),
            ))
            .await;
        info!(project_code = %input.project_code, "provisioning queued");

        let engine = SagaEngine::new(self.context.clone(), input);
        Ok(self.spawn_run(log, engine, 1, ProvisioningState::default()))
    }

    /// Resumes a failed run at `from_step`, keeping the workspace address the
    /// earlier attempt recorded.
    ///
    /// # Errors
    ///
    /// Returns [`OperationError::RetriesExhausted`] once the retry budget is
    /// spent, before any store write or remote call, and
    /// [`OperationError::NotRetryable`] unless the last run failed. Also
    /// fails if the step is out of range or no log exists for `project_code`.
    pub async fn retry_from_step(
        &self,
        project_code: &str,
        from_step: u8,
    ) -> Result<ProvisioningRun> {
        let existing = self
            .context
            .store()
            .get_provisioning_status(project_code)
            .await?
            .ok_or_else(|| OperationError::LogNotFound {
                project_code: project_code.to_string(),
            })?;

        if existing.retries_exhausted() {
            warn!(%project_code, retry_count = existing.retry_count, "retry refused");
            return Err(OperationError::RetriesExhausted {
                project_code: project_code.to_string(),
                max: MAX_RETRIES,
            });
        }

        if !existing.status.is_retryable() {
            warn!(%project_code, status = %existing.status, "retry refused");
            return Err(OperationError::NotRetryable {
                project_code: project_code.to_string(),
                status: existing.status,
            });
        }

        let from_step = validate_step(from_step)?;
        let log = self
            .context
            .store()
            .retry_provisioning(project_code, from_step)
            .await?;

        self.context
            .audit()
            .record(AuditEntry::project(
                AuditAction::RetryRequested,
                project_code,
                &log.input.requested_by,
                format!(
                    "Retry {} of {MAX_RETRIES} from step {from_step}",
                    log.retry_count
                ),
            ))
            .await;
        info!(%project_code, from_step, retry_count = log.retry_count, "provisioning retry started");

        let engine = SagaEngine::new(self.context.clone(), log.input.clone());
        let state = ProvisioningState::resumed(log.site_url.clone());
        Ok(self.spawn_run(log, engine, from_step, state))
    }

    /// # Errors
    ///
    /// Returns an error if the stored log cannot be read.
    pub async fn get_provisioning_status(
        &self,
        project_code: &str,
    ) -> Result<Option<ProvisioningLog>> {
        self.context
            .store()
            .get_provisioning_status(project_code)
            .await
    }

    fn spawn_run(
        &self,
        log: ProvisioningLog,
        engine: SagaEngine,
        start: u8,
        state: ProvisioningState,
    ) -> ProvisioningRun {
        let cancel = CancellationToken::new();
        let run_cancel = cancel.clone();
        let post_completion = self.post_completion.clone();

        let handle = tokio::spawn(async move {
            let result = engine.run(start, state, &run_cancel).await;
            let post_completion = match (&result.site_url, result.success) {
                (Some(site_url), true) => {
                    post_completion
                        .submit(PostCompletionJob::new(engine.input(), site_url.clone()))
                        .await
                }
                _ => Vec::new(),
            };
            RunReport {
                result,
                post_completion,
            }
        });

        ProvisioningRun {
            log,
            cancel,
            handle,
        }
    }
}

#[cfg(test)]
mod tests {
    use provision_core::{ProvisioningStatus, TOTAL_STEPS};

    use super::*;
    use crate::AuditTrail;
    use crate::mocks::{
        InMemoryProvisioningStore, MockWorkspaceOperations, RecordingAuditSink, sample_input,
    };
    use crate::tasks::{PostCompletionRunner, PostCompletionTask, TaskStatus};
    use crate::traits::ProvisioningStore;

    const HUB_URL: &str = "https://tenant.example.com/sites/projects-hub";

    struct Fixture {
        workspace: Arc<MockWorkspaceOperations>,
        store: Arc<InMemoryProvisioningStore>,
        audit: Arc<RecordingAuditSink>,
    }

    impl Fixture {
        fn new(workspace: MockWorkspaceOperations, store: InMemoryProvisioningStore) -> Self {
            Self {
                workspace: Arc::new(workspace),
                store: Arc::new(store),
                audit: Arc::new(RecordingAuditSink::new()),
            }
        }

        fn service(&self) -> ProvisioningService {
            let context = EngineContext::new(
                self.workspace.clone(),
                self.store.clone(),
                self.audit.clone(),
                HUB_URL,
            );
            let queue = PostCompletionQueue::spawn(PostCompletionRunner::new(
                self.workspace.clone(),
                AuditTrail::new(self.audit.clone()),
            ));
            ProvisioningService::new(context, queue)
        }
    }

    fn failed_log(failed_step: u8, retry_count: u32) -> ProvisioningLog {
        let mut log = ProvisioningLog::queued(sample_input(), Utc::now());
        log.status = ProvisioningStatus::Failed;
        log.current_step = failed_step;
        log.completed_steps = failed_step - 1;
        log.failed_step = Some(failed_step);
        log.error_message = Some("sec fail".to_string());
        log.retry_count = retry_count;
        log.site_url = Some("https://tenant.example.com/sites/2504201".to_string());
        log
    }

    #[tokio::test]
    async fn provision_site_returns_queued_log_and_completes() -> anyhow::Result<()> {
        let fixture = Fixture::new(MockWorkspaceOperations::new(), InMemoryProvisioningStore::new());
        let service = fixture.service();

        let run = service.provision_site(sample_input()).await?;
        assert_eq!(run.log().status, ProvisioningStatus::Queued);
        assert_eq!(run.log().current_step, 0);
        assert!(run.log().idempotency_token.is_none());

        let report = run.join().await?;

        assert!(report.result.success);
        assert_eq!(report.result.completed_steps, TOTAL_STEPS);
        let stored = service
            .get_provisioning_status("25-042-01")
            .await?
            .expect("stored log");
        assert_eq!(stored.status, ProvisioningStatus::Completed);
        Ok(())
    }

    #[tokio::test]
    async fn successful_run_triggers_post_completion_tasks() -> anyhow::Result<()> {
        let fixture = Fixture::new(MockWorkspaceOperations::new(), InMemoryProvisioningStore::new());
        let service = fixture.service();

        let report = service.provision_site(sample_input()).await?.join().await?;

        assert_eq!(report.post_completion.len(), 1);
        assert_eq!(
            report.post_completion[0].task,
            PostCompletionTask::UpdateSourceRecord
        );
        assert_eq!(report.post_completion[0].status, TaskStatus::Success);
        Ok(())
    }

    #[tokio::test]
    async fn failed_run_skips_post_completion_tasks() -> anyhow::Result<()> {
        let fixture = Fixture::new(
            MockWorkspaceOperations::new().failing_at(4, "sec fail"),
            InMemoryProvisioningStore::new(),
        );
        let service = fixture.service();

        let report = service.provision_site(sample_input()).await?.join().await?;

        assert!(!report.result.success);
        assert!(report.post_completion.is_empty());
        assert!(
            !fixture
                .audit
                .actions()
                .contains(&AuditAction::PostCompletionTask)
        );
        Ok(())
    }

    #[tokio::test]
    async fn provision_site_audits_the_trigger_first() -> anyhow::Result<()> {
        let fixture = Fixture::new(MockWorkspaceOperations::new(), InMemoryProvisioningStore::new());
        let service = fixture.service();

        service.provision_site(sample_input()).await?.join().await?;

        let actions = fixture.audit.actions();
        assert_eq!(actions.first(), Some(&AuditAction::ProvisioningTriggered));
        assert!(actions.contains(&AuditAction::ProvisioningCompleted));
        Ok(())
    }

    #[tokio::test]
    async fn invalid_input_is_rejected_before_anything_runs() {
        let fixture = Fixture::new(MockWorkspaceOperations::new(), InMemoryProvisioningStore::new());
        let service = fixture.service();
        let mut input = sample_input();
        input.project_code = "  ".to_string();

        let result = service.provision_site(input).await;

        assert!(matches!(result, Err(OperationError::Core(_))));
        assert!(fixture.store.history().is_empty());
        assert!(fixture.workspace.calls().is_empty());
    }

    #[tokio::test]
    async fn override_without_usable_characters_is_rejected() {
        let fixture = Fixture::new(MockWorkspaceOperations::new(), InMemoryProvisioningStore::new());
        let service = fixture.service();
        let mut input = sample_input();
        input.site_name_override = Some("!@#".to_string());

        let result = service.provision_site(input).await;

        assert!(matches!(
            result,
            Err(OperationError::Core(provision_core::CoreError::EmptyAlias(_)))
        ));
        assert!(fixture.store.history().is_empty());
        assert!(fixture.workspace.calls().is_empty());
    }

    #[tokio::test]
    async fn store_failure_propagates_from_provision_site() {
        let fixture = Fixture::new(MockWorkspaceOperations::new(), InMemoryProvisioningStore::failing());
        let service = fixture.service();

        let result = service.provision_site(sample_input()).await;

        assert!(matches!(result, Err(OperationError::StoreWrite { .. })));
        assert!(fixture.workspace.calls().is_empty());
    }

    #[tokio::test]
    async fn retry_resumes_from_requested_step() -> anyhow::Result<()> {
        let fixture = Fixture::new(
            MockWorkspaceOperations::new(),
            InMemoryProvisioningStore::new().with_log(failed_log(4, 0)),
        );
        let service = fixture.service();

        let run = service.retry_from_step("25-042-01", 4).await?;
        assert_eq!(run.log().retry_count, 1);
        assert_eq!(run.log().status, ProvisioningStatus::InProgress);
        assert_eq!(run.log().completed_steps, 3);
        assert_eq!(run.log().failed_step, None);

        let report = run.join().await?;

        assert!(report.result.success);
        let forward = fixture.workspace.forward_steps();
        assert_eq!(&forward[..4], &[4, 5, 6, 7]);
        assert!(!forward.contains(&1));
        assert_eq!(fixture.store.retry_calls(), vec![("25-042-01".to_string(), 4)]);
        assert!(
            fixture
                .audit
                .actions()
                .contains(&AuditAction::RetryRequested)
        );
        Ok(())
    }

    #[tokio::test]
    async fn retry_after_three_attempts_fails_fast() {
        let fixture = Fixture::new(
            MockWorkspaceOperations::new(),
            InMemoryProvisioningStore::new().with_log(failed_log(4, 3)),
        );
        let service = fixture.service();

        let err = service
            .retry_from_step("25-042-01", 4)
            .await
            .expect_err("retries exhausted");

        assert!(matches!(
            err,
            OperationError::RetriesExhausted { max: 3, .. }
        ));
        assert!(err.to_string().contains("Manual intervention required"));
        assert!(fixture.store.retry_calls().is_empty());
        assert!(fixture.workspace.calls().is_empty());
        assert!(fixture.store.history().is_empty());
    }

    #[tokio::test]
    async fn third_retry_is_still_allowed() -> anyhow::Result<()> {
        let fixture = Fixture::new(
            MockWorkspaceOperations::new(),
            InMemoryProvisioningStore::new().with_log(failed_log(2, 2)),
        );
        let service = fixture.service();

        let run = service.retry_from_step("25-042-01", 2).await?;

        assert_eq!(run.log().retry_count, 3);
        run.join().await?;
        Ok(())
    }

    #[tokio::test]
    async fn retry_of_completed_run_is_refused() {
        let mut completed = failed_log(4, 0);
        completed.status = ProvisioningStatus::Completed;
        completed.completed_steps = 7;
        completed.current_step = 7;
        completed.failed_step = None;
        completed.error_message = None;
        let fixture = Fixture::new(
            MockWorkspaceOperations::new(),
            InMemoryProvisioningStore::new().with_log(completed),
        );
        let service = fixture.service();

        let err = service
            .retry_from_step("25-042-01", 1)
            .await
            .expect_err("completed run");

        assert!(matches!(
            err,
            OperationError::NotRetryable {
                status: ProvisioningStatus::Completed,
                ..
            }
        ));
        assert!(fixture.store.retry_calls().is_empty());
        assert!(fixture.workspace.forward_steps().is_empty());
    }

    #[tokio::test]
    async fn retry_of_running_run_is_refused() {
        let mut running = failed_log(4, 0);
        running.status = ProvisioningStatus::InProgress;
        running.failed_step = None;
        running.error_message = None;
        let fixture = Fixture::new(
            MockWorkspaceOperations::new(),
            InMemoryProvisioningStore::new().with_log(running),
        );
        let service = fixture.service();

        let err = service
            .retry_from_step("25-042-01", 4)
            .await
            .expect_err("run still live");

        assert!(err.to_string().contains("is InProgress"));
        assert!(fixture.store.retry_calls().is_empty());
        assert!(fixture.workspace.calls().is_empty());
    }

    #[tokio::test]
    async fn retry_of_unknown_project_is_not_found() {
        let fixture = Fixture::new(MockWorkspaceOperations::new(), InMemoryProvisioningStore::new());
        let service = fixture.service();

        let err = service
            .retry_from_step("99-999-99", 1)
            .await
            .expect_err("no log");

        assert!(matches!(err, OperationError::LogNotFound { .. }));
    }

    #[tokio::test]
    async fn retry_rejects_out_of_range_step() {
        let fixture = Fixture::new(
            MockWorkspaceOperations::new(),
            InMemoryProvisioningStore::new().with_log(failed_log(4, 0)),
        );
        let service = fixture.service();

        let err = service
            .retry_from_step("25-042-01", 9)
            .await
            .expect_err("step out of range");

        assert!(matches!(err, OperationError::Core(_)));
        assert!(fixture.store.retry_calls().is_empty());
    }

    #[tokio::test]
    async fn cancelled_run_is_rolled_back() -> anyhow::Result<()> {
        let fixture = Fixture::new(
            MockWorkspaceOperations::new().stalling_at(2),
            InMemoryProvisioningStore::new(),
        );
        let service = fixture.service();

        let run = service.provision_site(sample_input()).await?;
        let token = run.cancellation_token();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            token.cancel();
        });
        let report = run.join().await?;

        assert_eq!(report.result.failed_step, Some(2));
        assert_eq!(fixture.workspace.compensated_steps(), vec![1]);
        let stored = fixture.store.log("25-042-01").expect("log");
        assert_eq!(stored.status, ProvisioningStatus::Failed);
        Ok(())
    }

    #[tokio::test]
    async fn status_of_unknown_project_is_none() -> anyhow::Result<()> {
        let fixture = Fixture::new(MockWorkspaceOperations::new(), InMemoryProvisioningStore::new());
        let service = fixture.service();

        assert!(service.get_provisioning_status("00-000-00").await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn queued_log_is_stored_before_run_starts() -> anyhow::Result<()> {
        let store = InMemoryProvisioningStore::new();
        let fixture = Fixture::new(MockWorkspaceOperations::new(), store);
        let service = fixture.service();

        service.provision_site(sample_input()).await?.join().await?;

        let first = fixture.store.history().first().cloned().expect("history");
        assert_eq!(first.status, ProvisioningStatus::Queued);
        assert!(
            fixture
                .store
                .get_provisioning_status("25-042-01")
                .await?
                .is_some()
        );
        Ok(())
    }
}
