use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use provision_core::{AuditAction, ProvisioningLog, ProvisioningStatus, StepStatus};

use super::*;
use crate::mocks::{
    InMemoryProvisioningStore, MockWorkspaceOperations, RecordingAuditSink, RecordingProgressSink,
    sample_input,
};
use crate::traits::ProvisioningStore;

const HUB_URL: &str = "https://tenant.example.com/sites/projects-hub";

struct Harness {
    workspace: Arc<MockWorkspaceOperations>,
    store: Arc<InMemoryProvisioningStore>,
    audit: Arc<RecordingAuditSink>,
    progress: Arc<RecordingProgressSink>,
    step_timeout: Option<Duration>,
}

impl Harness {
    fn new(workspace: MockWorkspaceOperations) -> Self {
        Self {
            workspace: Arc::new(workspace),
            store: Arc::new(InMemoryProvisioningStore::new()),
            audit: Arc::new(RecordingAuditSink::new()),
            progress: Arc::new(RecordingProgressSink::new()),
            step_timeout: None,
        }
    }

    fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = Some(timeout);
        self
    }

    fn context(&self) -> EngineContext {
        EngineContext::new(
            self.workspace.clone(),
            self.store.clone(),
            self.audit.clone(),
            HUB_URL,
        )
        .with_progress_sink(self.progress.clone())
        .with_step_timeout(self.step_timeout)
    }

    async fn engine(&self, input: ProvisioningInput) -> SagaEngine {
        self.store
            .create_log(&ProvisioningLog::queued(input.clone(), Utc::now()))
            .await
            .expect("create queued log");
        SagaEngine::new(self.context(), input)
    }

    fn final_log(&self) -> ProvisioningLog {
        self.store.log("25-042-01").expect("log exists")
    }
}

fn compensated_steps(result: &SagaExecutionResult) -> Vec<u8> {
    result
        .compensation_results
        .as_ref()
        .expect("compensation results on failure")
        .iter()
        .map(|entry| entry.step)
        .collect()
}

#[tokio::test]
async fn full_success_runs_every_step_in_order() {
    let harness = Harness::new(MockWorkspaceOperations::new());
    let engine = harness.engine(sample_input()).await;

    let result = engine.execute(&CancellationToken::new()).await;

    assert!(result.success);
    assert_eq!(result.completed_steps, 7);
    assert_eq!(result.failed_step, None);
    assert_eq!(result.compensation_results, None);
    assert_eq!(result.site_url.as_deref(), Some(harness.workspace.site_url()));
    assert_eq!(harness.workspace.forward_steps(), vec![1, 2, 3, 4, 5, 6, 7]);
    assert!(harness.workspace.compensated_steps().is_empty());

    let log = harness.final_log();
    assert_eq!(log.status, ProvisioningStatus::Completed);
    assert_eq!(log.completed_steps, 7);
    assert_eq!(log.current_step, 7);
    assert!(log.completed_at.is_some());
    assert_eq!(log.site_url, result.site_url);
    assert_eq!(log.idempotency_token.as_ref(), Some(&result.idempotency_token));
}

#[tokio::test]
async fn full_success_persists_every_transition() {
    let harness = Harness::new(MockWorkspaceOperations::new());
    let engine = harness.engine(sample_input()).await;

    engine.execute(&CancellationToken::new()).await;

    let history = harness.store.history();
    let transitions: Vec<_> = history
        .iter()
        .map(|log| (log.status, log.current_step, log.completed_steps))
        .collect();

    let mut expected = vec![(ProvisioningStatus::Queued, 0, 0)];
    for step in 1..=7 {
        expected.push((ProvisioningStatus::InProgress, step, step - 1));
        expected.push((ProvisioningStatus::InProgress, step, step));
    }
    expected.push((ProvisioningStatus::Completed, 7, 7));
    assert_eq!(transitions, expected);

    let before_each_step: Vec<_> = transitions
        .iter()
        .filter(|(status, current, completed)| {
            *status == ProvisioningStatus::InProgress && *completed + 1 == *current
        })
        .map(|&(_, current, completed)| (current, completed))
        .collect();
    assert_eq!(before_each_step, (1..=7).map(|n| (n, n - 1)).collect::<Vec<_>>());

    let completed = history.last().expect("completed log");
    let completed_at = completed.completed_at.expect("completed_at set");
    let rendered = completed_at.to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
    assert!(chrono::DateTime::parse_from_rfc3339(&rendered).is_ok());

    assert!(history.iter().all(ProvisioningLog::is_consistent));
    assert!(history[0].idempotency_token.is_none());
    assert!(history[1].idempotency_token.is_some());
}

#[tokio::test]
async fn progress_is_broadcast_for_every_step() {
    let harness = Harness::new(MockWorkspaceOperations::new());
    let engine = harness.engine(sample_input()).await;

    engine.execute(&CancellationToken::new()).await;

    let messages = harness.progress.messages();
    assert_eq!(messages.len(), 14);

    let first_completed = messages
        .iter()
        .find(|message| message.step_status == StepStatus::Completed)
        .expect("completed message");
    assert_eq!(first_completed.current_step, 1);
    assert_eq!(first_completed.progress, 14);

    let last = messages.last().expect("messages");
    assert_eq!(last.current_step, 7);
    assert_eq!(last.step_status, StepStatus::Completed);
    assert_eq!(last.progress, 100);
    assert!(messages.iter().all(|message| message.total_steps == 7));
}

#[tokio::test]
async fn full_success_is_audited() {
    let harness = Harness::new(MockWorkspaceOperations::new());
    let engine = harness.engine(sample_input()).await;

    engine.execute(&CancellationToken::new()).await;

    assert_eq!(
        harness.audit.actions(),
        vec![AuditAction::ProvisioningCompleted]
    );
}

#[tokio::test]
async fn failure_at_step_four_compensates_three_two_one() {
    let harness = Harness::new(MockWorkspaceOperations::new().failing_at(4, "sec fail"));
    let engine = harness.engine(sample_input()).await;

    let result = engine.execute(&CancellationToken::new()).await;

    assert!(!result.success);
    assert_eq!(result.failed_step, Some(4));
    assert_eq!(result.completed_steps, 3);
    assert_eq!(result.error.as_deref(), Some("sec fail"));
    assert_eq!(compensated_steps(&result), vec![3, 2, 1]);
    assert_eq!(harness.workspace.forward_steps(), vec![1, 2, 3, 4]);
    assert_eq!(harness.workspace.compensated_steps(), vec![3, 2, 1]);

    let log = harness.final_log();
    assert_eq!(log.status, ProvisioningStatus::Failed);
    assert_eq!(log.failed_step, Some(4));
    assert_eq!(log.completed_steps, 3);
    assert_eq!(log.error_message.as_deref(), Some("sec fail"));
    assert_eq!(log.compensation_log.len(), 3);
    assert!(log.compensation_log.iter().all(|entry| entry.success));
}

#[tokio::test]
async fn failure_passes_through_compensating_before_failed() {
    let harness = Harness::new(MockWorkspaceOperations::new().failing_at(4, "sec fail"));
    let engine = harness.engine(sample_input()).await;

    engine.execute(&CancellationToken::new()).await;

    let statuses: Vec<_> = harness
        .store
        .history()
        .iter()
        .map(|log| log.status)
        .collect();
    let compensating = statuses
        .iter()
        .position(|status| *status == ProvisioningStatus::Compensating)
        .expect("compensating persisted");
    let first_failed = statuses
        .iter()
        .position(|status| *status == ProvisioningStatus::Failed)
        .expect("failed persisted");

    assert!(first_failed < compensating);
    assert_eq!(statuses.last(), Some(&ProvisioningStatus::Failed));

    let failed_message = harness
        .progress
        .messages()
        .into_iter()
        .find(|message| message.step_status == StepStatus::Failed)
        .expect("failed message");
    assert_eq!(failed_message.current_step, 4);
    assert_eq!(failed_message.error.as_deref(), Some("sec fail"));
}

#[tokio::test]
async fn failure_is_audited_after_compensations() {
    let harness = Harness::new(MockWorkspaceOperations::new().failing_at(4, "sec fail"));
    let engine = harness.engine(sample_input()).await;

    engine.execute(&CancellationToken::new()).await;

    assert_eq!(
        harness.audit.actions(),
        vec![
            AuditAction::StepCompensated,
            AuditAction::StepCompensated,
            AuditAction::StepCompensated,
            AuditAction::ProvisioningFailed,
        ]
    );
}

#[tokio::test]
async fn failure_at_step_one_has_empty_compensations() {
    let harness = Harness::new(MockWorkspaceOperations::new().failing_at(1, "quota exceeded"));
    let engine = harness.engine(sample_input()).await;

    let result = engine.execute(&CancellationToken::new()).await;

    assert!(!result.success);
    assert_eq!(result.failed_step, Some(1));
    assert_eq!(result.compensation_results, Some(Vec::new()));
    assert_eq!(result.site_url, None);
    assert!(harness.workspace.compensated_steps().is_empty());
}

#[tokio::test]
async fn failing_compensation_does_not_stop_rollback() {
    let harness = Harness::new(
        MockWorkspaceOperations::new()
            .failing_at(4, "sec fail")
            .failing_compensation(2, "list locked"),
    );
    let engine = harness.engine(sample_input()).await;

    let result = engine.execute(&CancellationToken::new()).await;

    assert_eq!(harness.workspace.compensated_steps(), vec![3, 2, 1]);
    let results = result.compensation_results.expect("compensation results");
    let outcomes: Vec<_> = results.iter().map(|entry| (entry.step, entry.success)).collect();
    assert_eq!(outcomes, vec![(3, true), (2, false), (1, true)]);
    assert!(results[1].error.as_deref().is_some_and(|e| e.contains("list locked")));
    assert!(
        harness
            .audit
            .actions()
            .contains(&AuditAction::CompensationFailed)
    );
}

#[tokio::test]
async fn failed_workspace_deletion_is_flagged_critical() {
    let harness = Harness::new(
        MockWorkspaceOperations::new()
            .failing_at(3, "hub offline")
            .failing_compensation(1, "site locked"),
    );
    let engine = harness.engine(sample_input()).await;

    engine.execute(&CancellationToken::new()).await;

    let critical = harness
        .audit
        .entries()
        .into_iter()
        .find(|entry| entry.action == AuditAction::CompensationFailed)
        .expect("compensation failure audited");
    assert!(critical.details.contains("CRITICAL"));
    assert!(critical.details.contains("manual intervention required"));
}

#[tokio::test]
async fn workspace_alias_uses_sanitized_override() {
    let harness = Harness::new(MockWorkspaceOperations::new());
    let mut input = sample_input();
    input.site_name_override = Some("My New Site!@#123".to_string());
    let engine = harness.engine(input).await;

    engine.execute(&CancellationToken::new()).await;

    assert!(
        harness.workspace.calls()[0].ends_with(", MyNewSite123)"),
        "{:?}",
        harness.workspace.calls()
    );
}

#[tokio::test]
async fn workspace_alias_defaults_to_project_code_digits() {
    let harness = Harness::new(MockWorkspaceOperations::new());
    let engine = harness.engine(sample_input()).await;

    engine.execute(&CancellationToken::new()).await;

    assert_eq!(
        harness.workspace.calls()[0],
        "create_workspace(25-042-01, Harbor Point Tower, 2504201)"
    );
}

#[tokio::test]
async fn named_template_replaces_legacy_copy() {
    let harness = Harness::new(MockWorkspaceOperations::new());
    let mut input = sample_input();
    input.template_name = Some("Commercial v2".to_string());
    let engine = harness.engine(input).await;

    engine.execute(&CancellationToken::new()).await;

    let calls = harness.workspace.calls();
    assert!(calls.iter().any(|call| call.starts_with("apply_named_template(")
        && call.ends_with("Commercial v2)")));
    assert!(!calls.iter().any(|call| call.starts_with("apply_templates(")));
}

#[tokio::test]
async fn hub_url_is_passed_to_association() {
    let harness = Harness::new(MockWorkspaceOperations::new());
    let engine = harness.engine(sample_input()).await;

    engine.execute(&CancellationToken::new()).await;

    assert!(
        harness
            .workspace
            .calls()
            .iter()
            .any(|call| call.starts_with("associate_with_hub(") && call.ends_with(&format!("{HUB_URL})")))
    );
}

#[tokio::test]
async fn resume_skips_earlier_steps() {
    let harness = Harness::new(MockWorkspaceOperations::new());
    let engine = harness.engine(sample_input()).await;
    let site_url = harness.workspace.site_url().to_string();

    let result = engine
        .resume(5, Some(site_url.clone()), &CancellationToken::new())
        .await
        .expect("valid step");

    assert!(result.success);
    assert_eq!(result.site_url, Some(site_url));
    assert_eq!(harness.workspace.forward_steps(), vec![5, 6, 7]);
}

#[tokio::test]
async fn resume_only_compensates_steps_of_this_run() {
    let harness = Harness::new(MockWorkspaceOperations::new().failing_at(6, "copy failed"));
    let engine = harness.engine(sample_input()).await;

    let result = engine
        .resume(
            5,
            Some(harness.workspace.site_url().to_string()),
            &CancellationToken::new(),
        )
        .await
        .expect("valid step");

    assert_eq!(result.failed_step, Some(6));
    assert_eq!(result.completed_steps, 5);
    assert_eq!(compensated_steps(&result), vec![5]);
}

#[tokio::test]
async fn resume_without_workspace_address_fails_cleanly() {
    let harness = Harness::new(MockWorkspaceOperations::new());
    let engine = harness.engine(sample_input()).await;

    let result = engine
        .resume(2, None, &CancellationToken::new())
        .await
        .expect("valid step");

    assert_eq!(result.failed_step, Some(2));
    assert!(result.error.as_deref().is_some_and(|e| e.contains("workspace address")));
    assert!(harness.workspace.forward_steps().is_empty());
}

#[tokio::test]
async fn resume_rejects_out_of_range_step() {
    let harness = Harness::new(MockWorkspaceOperations::new());
    let engine = harness.engine(sample_input()).await;

    let zero = engine.resume(0, None, &CancellationToken::new()).await;
    let eight = engine.resume(8, None, &CancellationToken::new()).await;

    assert!(matches!(zero, Err(OperationError::Core(_))));
    assert!(matches!(eight, Err(OperationError::Core(_))));
    assert!(harness.workspace.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn timed_out_step_is_compensated() {
    let harness = Harness::new(MockWorkspaceOperations::new().stalling_at(2))
        .with_step_timeout(Duration::from_secs(30));
    let engine = harness.engine(sample_input()).await;

    let result = engine.execute(&CancellationToken::new()).await;

    assert_eq!(result.failed_step, Some(2));
    assert!(result.error.as_deref().is_some_and(|e| e.contains("timed out")));
    assert_eq!(compensated_steps(&result), vec![1]);
}

#[tokio::test(start_paused = true)]
async fn stalled_compensation_times_out_and_rollback_continues() {
    let harness = Harness::new(
        MockWorkspaceOperations::new()
            .failing_at(3, "hub offline")
            .stalling_compensation(2),
    )
    .with_step_timeout(Duration::from_secs(30));
    let engine = harness.engine(sample_input()).await;

    let result = engine.execute(&CancellationToken::new()).await;

    let results = result.compensation_results.expect("compensation results");
    let outcomes: Vec<_> = results.iter().map(|entry| (entry.step, entry.success)).collect();
    assert_eq!(outcomes, vec![(2, false), (1, true)]);
}

#[tokio::test(start_paused = true)]
async fn cancellation_fails_the_running_step_and_compensates() {
    let harness = Harness::new(MockWorkspaceOperations::new().stalling_at(3));
    let engine = harness.engine(sample_input()).await;
    let cancel = CancellationToken::new();

    let canceller = async {
        tokio::time::sleep(Duration::from_secs(5)).await;
        cancel.cancel();
    };
    let (result, ()) = tokio::join!(engine.execute(&cancel), canceller);

    assert_eq!(result.failed_step, Some(3));
    assert!(result.error.as_deref().is_some_and(|e| e.contains("cancelled")));
    assert_eq!(compensated_steps(&result), vec![2, 1]);
    assert_eq!(harness.final_log().status, ProvisioningStatus::Failed);
}

#[tokio::test]
async fn missing_log_does_not_fail_the_run() {
    let harness = Harness::new(MockWorkspaceOperations::new());
    let engine = SagaEngine::new(harness.context(), sample_input());

    let result = engine.execute(&CancellationToken::new()).await;

    assert!(result.success);
    assert!(harness.store.history().is_empty());
}

#[tokio::test]
async fn failing_audit_sink_does_not_fail_the_run() {
    let harness = Harness::new(MockWorkspaceOperations::new().failing_at(2, "throttled"));
    let context = EngineContext::new(
        harness.workspace.clone(),
        harness.store.clone(),
        Arc::new(RecordingAuditSink::failing()),
        HUB_URL,
    );
    harness
        .store
        .create_log(&ProvisioningLog::queued(sample_input(), Utc::now()))
        .await
        .expect("create log");
    let engine = SagaEngine::new(context, sample_input());

    let result = engine.execute(&CancellationToken::new()).await;

    assert_eq!(result.failed_step, Some(2));
    assert_eq!(compensated_steps(&result), vec![1]);
}

#[tokio::test]
async fn every_run_gets_a_fresh_token() {
    let harness = Harness::new(MockWorkspaceOperations::new());
    let engine = harness.engine(sample_input()).await;

    let first = engine.execute(&CancellationToken::new()).await;
    let second = engine.execute(&CancellationToken::new()).await;

    assert_eq!(first.idempotency_token.project_code(), "25-042-01");
    assert_eq!(second.idempotency_token.project_code(), "25-042-01");
    assert!(first.idempotency_token.as_str().starts_with("25-042-01::"));
}

#[tokio::test]
async fn generated_token_matches_wire_format() {
    let pattern = regex::Regex::new(
        r"^[^:]+::\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}\.\d{3}Z::[0-9a-f]{4}$",
    )
    .expect("valid pattern");
    let harness = Harness::new(MockWorkspaceOperations::new());
    let engine = harness.engine(sample_input()).await;

    let result = engine.execute(&CancellationToken::new()).await;

    let token = result.idempotency_token.as_str();
    assert!(pattern.is_match(token), "unexpected token {token}");
    assert_eq!(token.split("::").next(), Some("25-042-01"));
}

#[tokio::test]
async fn failure_at_any_step_compensates_exactly_the_earlier_steps() {
    for k in 1..=7u8 {
        let harness =
            Harness::new(MockWorkspaceOperations::new().failing_at(k, format!("step {k} broke")));
        let engine = harness.engine(sample_input()).await;

        let result = engine.execute(&CancellationToken::new()).await;

        assert!(!result.success, "step {k}");
        assert_eq!(result.failed_step, Some(k));
        assert_eq!(result.completed_steps, k - 1);
        assert_eq!(result.error, Some(format!("step {k} broke")));
        assert_eq!(
            compensated_steps(&result),
            (1..k).rev().collect::<Vec<_>>(),
            "compensation order for failure at step {k}"
        );
        assert_eq!(
            harness.workspace.forward_steps(),
            (1..=k).collect::<Vec<_>>(),
            "no step after {k} may run"
        );
    }
}
