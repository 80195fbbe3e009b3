//! Best-effort work that follows a successful provisioning run.
//!
//! Tasks run on a single queue worker after the saga has reported success.
//! A failing task is logged, audited and reported in its [`TaskOutcome`]; it
//! never turns a completed run into a failed one.

use std::fmt;
use std::sync::Arc;

use provision_core::{AuditAction, AuditEntry, ProvisioningInput};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::traits::{
    CompletionNotice, HubNavigation, NotificationSink, SourceRecordUpdate, WorkspaceOperations,
};
use crate::{AuditTrail, Result};

const QUEUE_CAPACITY: usize = 32;
const SOURCE_RECORD_STATUS: &str = "Provisioned";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PostCompletionTask {
    UpdateSourceRecord,
    RegisterHubLink,
    SendCompletionNotification,
}

impl fmt::Display for PostCompletionTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::UpdateSourceRecord => "UpdateSourceRecord",
            Self::RegisterHubLink => "RegisterHubLink",
            Self::SendCompletionNotification => "SendCompletionNotification",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskOutcome {
    pub task: PostCompletionTask,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A completed run's details, as needed by the follow-up tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostCompletionJob {
    pub project_code: String,
    pub project_name: String,
    pub lead_id: u64,
    pub requested_by: String,
    pub site_url: String,
}

impl PostCompletionJob {
    #[must_use]
    pub fn new(input: &ProvisioningInput, site_url: impl Into<String>) -> Self {
        Self {
            project_code: input.project_code.clone(),
            project_name: input.project_name.clone(),
            lead_id: input.lead_id,
            requested_by: input.requested_by.clone(),
            site_url: site_url.into(),
        }
    }
}

/// Executes the follow-up tasks for one job, in a fixed order.
pub struct PostCompletionRunner {
    workspace: Arc<dyn WorkspaceOperations>,
    hub: Option<Arc<dyn HubNavigation>>,
    notifications: Option<Arc<dyn NotificationSink>>,
    recipients: Vec<String>,
    audit: AuditTrail,
}

impl PostCompletionRunner {
    pub fn new(workspace: Arc<dyn WorkspaceOperations>, audit: AuditTrail) -> Self {
        Self {
            workspace,
            hub: None,
            notifications: None,
            recipients: Vec::new(),
            audit,
        }
    }

    #[must_use]
    pub fn with_hub_navigation(mut self, hub: Arc<dyn HubNavigation>) -> Self {
        self.hub = Some(hub);
        self
    }

    #[must_use]
    pub fn with_notifications(
        mut self,
        sink: Arc<dyn NotificationSink>,
        recipients: Vec<String>,
    ) -> Self {
        self.notifications = Some(sink);
        self.recipients = recipients;
        self
    }

    /// Tasks that will run for every job, given the configured collaborators.
    #[must_use]
    pub fn tasks(&self) -> Vec<PostCompletionTask> {
        let mut tasks = vec![PostCompletionTask::UpdateSourceRecord];
        if self.hub.is_some() {
            tasks.push(PostCompletionTask::RegisterHubLink);
        }
        if self.notifications.is_some() {
            tasks.push(PostCompletionTask::SendCompletionNotification);
        }
        tasks
    }

    pub async fn run(&self, job: &PostCompletionJob) -> Vec<TaskOutcome> {
        let mut outcomes = Vec::new();

        for task in self.tasks() {
            let outcome = match self.run_task(task, job).await {
                Ok(()) => {
                    debug!(project_code = %job.project_code, %task, "post-completion task succeeded");
                    TaskOutcome {
                        task,
                        status: TaskStatus::Success,
                        error: None,
                    }
                }
                Err(error) => {
                    warn!(project_code = %job.project_code, %task, %error, "post-completion task failed");
                    TaskOutcome {
                        task,
                        status: TaskStatus::Failed,
                        error: Some(error.to_string()),
                    }
                }
            };

            let details = match &outcome.error {
                None => format!("{task}: success"),
                Some(error) => format!("{task}: failed: {error}"),
            };
            self.audit
                .record(AuditEntry::project(
                    AuditAction::PostCompletionTask,
                    &job.project_code,
                    &job.requested_by,
                    details,
                ))
                .await;
            outcomes.push(outcome);
        }

        outcomes
    }

    async fn run_task(&self, task: PostCompletionTask, job: &PostCompletionJob) -> Result<()> {
        match task {
            PostCompletionTask::UpdateSourceRecord => {
                let update = SourceRecordUpdate {
                    site_url: Some(job.site_url.clone()),
                    provisioning_status: Some(SOURCE_RECORD_STATUS.to_string()),
                };
                self.workspace
                    .update_source_record(job.lead_id, &update)
                    .await
            }
            PostCompletionTask::RegisterHubLink => match &self.hub {
                Some(hub) => {
                    let title = format!("{} - {}", job.project_code, job.project_name);
                    hub.register_link(&title, &job.site_url).await
                }
                None => Ok(()),
            },
            PostCompletionTask::SendCompletionNotification => match &self.notifications {
                Some(sink) => {
                    let notice = CompletionNotice {
                        project_code: job.project_code.clone(),
                        project_name: job.project_name.clone(),
                        site_url: job.site_url.clone(),
                        requested_by: job.requested_by.clone(),
                        recipients: self.recipients.clone(),
                    };
                    sink.send_completion(&notice).await
                }
                None => Ok(()),
            },
        }
    }
}

struct Envelope {
    job: PostCompletionJob,
    reply: oneshot::Sender<Vec<TaskOutcome>>,
}

/// Handle to the worker that runs post-completion jobs one at a time.
#[derive(Clone)]
pub struct PostCompletionQueue {
    sender: mpsc::Sender<Envelope>,
}

impl PostCompletionQueue {
    /// Spawns the worker on the current runtime. It stops once every handle
    /// has been dropped.
    #[must_use]
    pub fn spawn(runner: PostCompletionRunner) -> Self {
        let (sender, mut receiver) = mpsc::channel::<Envelope>(QUEUE_CAPACITY);

        tokio::spawn(async move {
            while let Some(envelope) = receiver.recv().await {
                let outcomes = runner.run(&envelope.job).await;
                if envelope.reply.send(outcomes).is_err() {
                    debug!(project_code = %envelope.job.project_code, "post-completion result dropped");
                }
            }
            debug!("post-completion worker stopped");
        });

        Self { sender }
    }

    /// Queues `job` and waits for its outcomes. Returns no outcomes if the
    /// worker is gone.
    pub async fn submit(&self, job: PostCompletionJob) -> Vec<TaskOutcome> {
        let project_code = job.project_code.clone();
        let (reply, outcome) = oneshot::channel();

        if self.sender.send(Envelope { job, reply }).await.is_err() {
            warn!(%project_code, "post-completion worker unavailable");
            return Vec::new();
        }

        match outcome.await {
            Ok(outcomes) => {
                info!(%project_code, tasks = outcomes.len(), "post-completion tasks finished");
                outcomes
            }
            Err(_) => {
                warn!(%project_code, "post-completion worker stopped before replying");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{
        MockWorkspaceOperations, RecordingAuditSink, RecordingHubNavigation,
        RecordingNotificationSink, sample_input,
    };

    const SITE_URL: &str = "https://tenant.example.com/sites/2504201";

    fn job() -> PostCompletionJob {
        PostCompletionJob::new(&sample_input(), SITE_URL)
    }

    #[tokio::test]
    async fn only_source_record_update_runs_without_optional_collaborators() {
        let workspace = Arc::new(MockWorkspaceOperations::new());
        let runner = PostCompletionRunner::new(
            workspace.clone(),
            AuditTrail::new(Arc::new(RecordingAuditSink::new())),
        );

        let outcomes = runner.run(&job()).await;

        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].task, PostCompletionTask::UpdateSourceRecord);
        assert_eq!(outcomes[0].status, TaskStatus::Success);
        let updates = workspace.source_record_updates();
        assert_eq!(updates[0].0, 4217);
        assert_eq!(updates[0].1.site_url.as_deref(), Some(SITE_URL));
        assert_eq!(updates[0].1.provisioning_status.as_deref(), Some("Provisioned"));
    }

    #[tokio::test]
    async fn failing_hub_link_is_reported_and_later_tasks_still_run() {
        let notifications = Arc::new(RecordingNotificationSink::new());
        let audit = Arc::new(RecordingAuditSink::new());
        let runner = PostCompletionRunner::new(
            Arc::new(MockWorkspaceOperations::new()),
            AuditTrail::new(audit.clone()),
        )
        .with_hub_navigation(Arc::new(RecordingHubNavigation::failing()))
        .with_notifications(notifications.clone(), vec!["it@example.com".to_string()]);

        let outcomes = runner.run(&job()).await;

        let statuses: Vec<_> = outcomes.iter().map(|o| (o.task, o.status)).collect();
        assert_eq!(
            statuses,
            vec![
                (PostCompletionTask::UpdateSourceRecord, TaskStatus::Success),
                (PostCompletionTask::RegisterHubLink, TaskStatus::Failed),
                (PostCompletionTask::SendCompletionNotification, TaskStatus::Success),
            ]
        );
        assert!(outcomes[1].error.as_deref().is_some_and(|e| e.contains("navigation locked")));
        assert_eq!(notifications.sent()[0].recipients, vec!["it@example.com"]);
        assert_eq!(audit.actions().len(), 3);
    }

    #[tokio::test]
    async fn hub_link_uses_project_title() {
        let hub = Arc::new(RecordingHubNavigation::new());
        let runner = PostCompletionRunner::new(
            Arc::new(MockWorkspaceOperations::new()),
            AuditTrail::new(Arc::new(RecordingAuditSink::new())),
        )
        .with_hub_navigation(hub.clone());

        runner.run(&job()).await;

        assert_eq!(
            hub.links(),
            vec![(
                "25-042-01 - Harbor Point Tower".to_string(),
                SITE_URL.to_string()
            )]
        );
    }

    #[tokio::test]
    async fn queue_replies_with_outcomes() {
        let queue = PostCompletionQueue::spawn(PostCompletionRunner::new(
            Arc::new(MockWorkspaceOperations::new()),
            AuditTrail::new(Arc::new(RecordingAuditSink::new())),
        ));

        let outcomes = queue.submit(job()).await;

        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].status, TaskStatus::Success);
    }

    #[test]
    fn task_status_serializes_lowercase() {
        let outcome = TaskOutcome {
            task: PostCompletionTask::RegisterHubLink,
            status: TaskStatus::Failed,
            error: None,
        };

        let json = serde_json::to_string(&outcome).expect("serialize");

        assert_eq!(json, r#"{"task":"RegisterHubLink","status":"failed"}"#);
    }
}
