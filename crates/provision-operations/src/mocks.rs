//! Recording test doubles for every collaborator trait.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use provision_core::{
    AuditAction, AuditEntry, ProgressMessage, ProvisioningInput, ProvisioningLog,
    ProvisioningLogPatch,
};

use crate::traits::{
    AuditSink, CompletionNotice, HubNavigation, NotificationSink, OfflineQueue, ProgressSink,
    ProvisioningStore, RemoteOrchestrator, SourceRecordUpdate, WorkspaceOperations,
};
use crate::{OperationError, Result};

/// A request for project `25-042-01` with no overrides.
#[must_use]
pub fn sample_input() -> ProvisioningInput {
    ProvisioningInput {
        lead_id: 4217,
        project_code: "25-042-01".to_string(),
        project_name: "Harbor Point Tower".to_string(),
        client_name: "Harbor Point LLC".to_string(),
        division: "Commercial".to_string(),
        region: "Northeast".to_string(),
        requested_by: "pm@example.com".to_string(),
        site_name_override: None,
        template_name: None,
    }
}

const FORWARD_OPERATIONS: [&str; 7] = [
    "create_workspace",
    "provision_lists",
    "associate_with_hub",
    "create_security_groups",
    "apply_templates",
    "copy_source_record_data",
    "update_source_record",
];

const INVERSE_OPERATIONS: [&str; 6] = [
    "delete_workspace",
    "remove_lists",
    "dissociate_from_hub",
    "delete_security_groups",
    "remove_templates",
    "remove_copied_data",
];

/// Workspace platform that records every call and fails or stalls on request.
pub struct MockWorkspaceOperations {
    site_url: String,
    failing_steps: HashMap<u8, String>,
    failing_compensations: HashMap<u8, String>,
    stalled_steps: HashSet<u8>,
    stalled_compensations: HashSet<u8>,
    calls: Mutex<Vec<String>>,
    forward_steps: Mutex<Vec<u8>>,
    compensated_steps: Mutex<Vec<u8>>,
    source_record_updates: Mutex<Vec<(u64, SourceRecordUpdate)>>,
}

impl Default for MockWorkspaceOperations {
    fn default() -> Self {
        Self::new()
    }
}

impl MockWorkspaceOperations {
    #[must_use]
    pub fn new() -> Self {
        Self {
            site_url: "https://tenant.example.com/sites/2504201".to_string(),
            failing_steps: HashMap::new(),
            failing_compensations: HashMap::new(),
            stalled_steps: HashSet::new(),
            stalled_compensations: HashSet::new(),
            calls: Mutex::new(Vec::new()),
            forward_steps: Mutex::new(Vec::new()),
            compensated_steps: Mutex::new(Vec::new()),
            source_record_updates: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn with_site_url(mut self, site_url: impl Into<String>) -> Self {
        self.site_url = site_url.into();
        self
    }

    #[must_use]
    pub fn failing_at(mut self, step: u8, message: impl Into<String>) -> Self {
        self.failing_steps.insert(step, message.into());
        self
    }

    #[must_use]
    pub fn failing_compensation(mut self, step: u8, message: impl Into<String>) -> Self {
        self.failing_compensations.insert(step, message.into());
        self
    }

    /// The forward call for `step` never returns.
    #[must_use]
    pub fn stalling_at(mut self, step: u8) -> Self {
        self.stalled_steps.insert(step);
        self
    }

    /// The inverse call for `step` never returns.
    #[must_use]
    pub fn stalling_compensation(mut self, step: u8) -> Self {
        self.stalled_compensations.insert(step);
        self
    }

    #[must_use]
    pub fn site_url(&self) -> &str {
        &self.site_url
    }

    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("lock poisoned").clone()
    }

    /// Steps whose forward operation was invoked, in call order.
    #[must_use]
    pub fn forward_steps(&self) -> Vec<u8> {
        self.forward_steps.lock().expect("lock poisoned").clone()
    }

    /// Steps whose inverse was invoked, in call order.
    #[must_use]
    pub fn compensated_steps(&self) -> Vec<u8> {
        self.compensated_steps.lock().expect("lock poisoned").clone()
    }

    #[must_use]
    pub fn source_record_updates(&self) -> Vec<(u64, SourceRecordUpdate)> {
        self.source_record_updates
            .lock()
            .expect("lock poisoned")
            .clone()
    }

    async fn forward(&self, step: u8, call: String) -> Result<()> {
        self.calls.lock().expect("lock poisoned").push(call);
        self.forward_steps.lock().expect("lock poisoned").push(step);
        if self.stalled_steps.contains(&step) {
            std::future::pending::<()>().await;
        }
        match self.failing_steps.get(&step) {
            Some(message) => Err(OperationError::Workspace {
                operation: FORWARD_OPERATIONS[usize::from(step) - 1],
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }

    async fn inverse(&self, step: u8, call: String) -> Result<()> {
        self.calls.lock().expect("lock poisoned").push(call);
        self.compensated_steps
            .lock()
            .expect("lock poisoned")
            .push(step);
        if self.stalled_compensations.contains(&step) {
            std::future::pending::<()>().await;
        }
        match self.failing_compensations.get(&step) {
            Some(message) => Err(OperationError::Workspace {
                operation: INVERSE_OPERATIONS[usize::from(step) - 1],
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl WorkspaceOperations for MockWorkspaceOperations {
    async fn create_workspace(
        &self,
        project_code: &str,
        project_name: &str,
        alias: &str,
    ) -> Result<String> {
        self.forward(
            1,
            format!("create_workspace({project_code}, {project_name}, {alias})"),
        )
        .await?;
        Ok(self.site_url.clone())
    }

    async fn provision_lists(&self, site_url: &str, project_code: &str) -> Result<()> {
        self.forward(2, format!("provision_lists({site_url}, {project_code})"))
            .await
    }

    async fn associate_with_hub(&self, site_url: &str, hub_url: &str) -> Result<()> {
        self.forward(3, format!("associate_with_hub({site_url}, {hub_url})"))
            .await
    }

    async fn create_security_groups(
        &self,
        site_url: &str,
        project_code: &str,
        division: &str,
    ) -> Result<()> {
        self.forward(
            4,
            format!("create_security_groups({site_url}, {project_code}, {division})"),
        )
        .await
    }

    async fn apply_templates(
        &self,
        site_url: &str,
        project_code: &str,
        division: &str,
    ) -> Result<()> {
        self.forward(
            5,
            format!("apply_templates({site_url}, {project_code}, {division})"),
        )
        .await
    }

    async fn apply_named_template(&self, site_url: &str, template_name: &str) -> Result<()> {
        self.forward(
            5,
            format!("apply_named_template({site_url}, {template_name})"),
        )
        .await
    }

    async fn copy_source_record_data(
        &self,
        site_url: &str,
        lead_id: u64,
        project_code: &str,
    ) -> Result<()> {
        self.forward(
            6,
            format!("copy_source_record_data({site_url}, {lead_id}, {project_code})"),
        )
        .await
    }

    async fn update_source_record(&self, lead_id: u64, update: &SourceRecordUpdate) -> Result<()> {
        self.source_record_updates
            .lock()
            .expect("lock poisoned")
            .push((lead_id, update.clone()));
        self.forward(7, format!("update_source_record({lead_id})"))
            .await
    }

    async fn delete_workspace(&self, site_url: &str) -> Result<()> {
        self.inverse(1, format!("delete_workspace({site_url})"))
            .await
    }

    async fn remove_lists(&self, site_url: &str, project_code: &str) -> Result<()> {
        self.inverse(2, format!("remove_lists({site_url}, {project_code})"))
            .await
    }

    async fn dissociate_from_hub(&self, site_url: &str) -> Result<()> {
        self.inverse(3, format!("dissociate_from_hub({site_url})"))
            .await
    }

    async fn delete_security_groups(&self, site_url: &str, project_code: &str) -> Result<()> {
        self.inverse(
            4,
            format!("delete_security_groups({site_url}, {project_code})"),
        )
        .await
    }

    async fn remove_templates(&self, site_url: &str, project_code: &str) -> Result<()> {
        self.inverse(5, format!("remove_templates({site_url}, {project_code})"))
            .await
    }

    async fn remove_copied_data(&self, site_url: &str, project_code: &str) -> Result<()> {
        self.inverse(6, format!("remove_copied_data({site_url}, {project_code})"))
            .await
    }
}

/// Store that keeps logs in memory and snapshots every write.
#[derive(Default)]
pub struct InMemoryProvisioningStore {
    logs: Mutex<HashMap<String, ProvisioningLog>>,
    history: Mutex<Vec<ProvisioningLog>>,
    retry_calls: Mutex<Vec<(String, u8)>>,
    fail_create: bool,
}

impl InMemoryProvisioningStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `create_log` always fails.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail_create: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_log(self, log: ProvisioningLog) -> Self {
        self.logs
            .lock()
            .expect("lock poisoned")
            .insert(log.project_code.clone(), log);
        self
    }

    #[must_use]
    pub fn log(&self, project_code: &str) -> Option<ProvisioningLog> {
        self.logs
            .lock()
            .expect("lock poisoned")
            .get(project_code)
            .cloned()
    }

    /// Every stored version of every log, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<ProvisioningLog> {
        self.history.lock().expect("lock poisoned").clone()
    }

    #[must_use]
    pub fn retry_calls(&self) -> Vec<(String, u8)> {
        self.retry_calls.lock().expect("lock poisoned").clone()
    }

    fn store(&self, log: ProvisioningLog) {
        self.history
            .lock()
            .expect("lock poisoned")
            .push(log.clone());
        self.logs
            .lock()
            .expect("lock poisoned")
            .insert(log.project_code.clone(), log);
    }

    fn modify(
        &self,
        project_code: &str,
        change: impl FnOnce(&mut ProvisioningLog),
    ) -> Result<ProvisioningLog> {
        let mut log = self
            .log(project_code)
            .ok_or_else(|| OperationError::LogNotFound {
                project_code: project_code.to_string(),
            })?;
        change(&mut log);
        self.store(log.clone());
        Ok(log)
    }
}

#[async_trait]
impl ProvisioningStore for InMemoryProvisioningStore {
    async fn create_log(&self, log: &ProvisioningLog) -> Result<()> {
        if self.fail_create {
            return Err(OperationError::StoreWrite {
                path: format!("memory://{}", log.project_code).into(),
                source: std::io::Error::other("store unavailable"),
            });
        }
        self.store(log.clone());
        Ok(())
    }

    async fn update_provisioning_log(
        &self,
        project_code: &str,
        patch: &ProvisioningLogPatch,
    ) -> Result<ProvisioningLog> {
        self.modify(project_code, |log| patch.apply(log))
    }

    async fn get_provisioning_status(&self, project_code: &str) -> Result<Option<ProvisioningLog>> {
        Ok(self.log(project_code))
    }

    async fn retry_provisioning(
        &self,
        project_code: &str,
        from_step: u8,
    ) -> Result<ProvisioningLog> {
        self.retry_calls
            .lock()
            .expect("lock poisoned")
            .push((project_code.to_string(), from_step));
        self.modify(project_code, |log| log.begin_retry(from_step))
    }
}

#[derive(Default)]
pub struct RecordingAuditSink {
    entries: Mutex<Vec<AuditEntry>>,
    fail: bool,
}

impl RecordingAuditSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().expect("lock poisoned").clone()
    }

    #[must_use]
    pub fn actions(&self) -> Vec<AuditAction> {
        self.entries().into_iter().map(|entry| entry.action).collect()
    }
}

#[async_trait]
impl AuditSink for RecordingAuditSink {
    async fn log_audit(&self, entry: &AuditEntry) -> Result<()> {
        if self.fail {
            return Err(OperationError::Audit("audit list unavailable".to_string()));
        }
        self.entries
            .lock()
            .expect("lock poisoned")
            .push(entry.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingProgressSink {
    messages: Mutex<Vec<ProgressMessage>>,
}

impl RecordingProgressSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn messages(&self) -> Vec<ProgressMessage> {
        self.messages.lock().expect("lock poisoned").clone()
    }
}

impl ProgressSink for RecordingProgressSink {
    fn broadcast(&self, message: &ProgressMessage) {
        self.messages
            .lock()
            .expect("lock poisoned")
            .push(message.clone());
    }
}

#[derive(Default)]
pub struct RecordingNotificationSink {
    sent: Mutex<Vec<CompletionNotice>>,
    fail: bool,
}

impl RecordingNotificationSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn sent(&self) -> Vec<CompletionNotice> {
        self.sent.lock().expect("lock poisoned").clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingNotificationSink {
    async fn send_completion(&self, notice: &CompletionNotice) -> Result<()> {
        if self.fail {
            return Err(OperationError::Notification("mail relay refused".to_string()));
        }
        self.sent
            .lock()
            .expect("lock poisoned")
            .push(notice.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingHubNavigation {
    links: Mutex<Vec<(String, String)>>,
    fail: bool,
}

impl RecordingHubNavigation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn links(&self) -> Vec<(String, String)> {
        self.links.lock().expect("lock poisoned").clone()
    }
}

#[async_trait]
impl HubNavigation for RecordingHubNavigation {
    async fn register_link(&self, title: &str, url: &str) -> Result<()> {
        if self.fail {
            return Err(OperationError::HubNavigation("navigation locked".to_string()));
        }
        self.links
            .lock()
            .expect("lock poisoned")
            .push((title.to_string(), url.to_string()));
        Ok(())
    }
}

/// Orchestrator that either accepts every request or is unreachable.
pub struct MockRemoteOrchestrator {
    unavailable: Option<String>,
    triggered: Mutex<Vec<String>>,
}

impl MockRemoteOrchestrator {
    #[must_use]
    pub fn accepting() -> Self {
        Self {
            unavailable: None,
            triggered: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            unavailable: Some(message.into()),
            triggered: Mutex::new(Vec::new()),
        }
    }

    /// Project codes passed to `trigger`.
    #[must_use]
    pub fn triggered(&self) -> Vec<String> {
        self.triggered.lock().expect("lock poisoned").clone()
    }
}

#[async_trait]
impl RemoteOrchestrator for MockRemoteOrchestrator {
    async fn trigger(&self, input: &ProvisioningInput) -> Result<ProvisioningLog> {
        self.triggered
            .lock()
            .expect("lock poisoned")
            .push(input.project_code.clone());
        match &self.unavailable {
            Some(message) => Err(OperationError::RemoteOrchestrator(message.clone())),
            None => Ok(ProvisioningLog::queued(input.clone(), Utc::now())),
        }
    }
}

#[derive(Default)]
pub struct InMemoryOfflineQueue {
    entries: Mutex<Vec<ProvisioningInput>>,
    fail: bool,
}

impl InMemoryOfflineQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// A queue holding `entries` that can be drained but rejects every
    /// enqueue.
    #[must_use]
    pub fn drain_only(entries: Vec<ProvisioningInput>) -> Self {
        Self {
            entries: Mutex::new(entries),
            fail: true,
        }
    }

    #[must_use]
    pub fn entries(&self) -> Vec<ProvisioningInput> {
        self.entries.lock().expect("lock poisoned").clone()
    }
}

#[async_trait]
impl OfflineQueue for InMemoryOfflineQueue {
    async fn enqueue(&self, input: &ProvisioningInput) -> Result<()> {
        if self.fail {
            return Err(OperationError::OfflineQueue {
                path: "memory://offline-queue".into(),
                source: std::io::Error::other("queue unavailable"),
            });
        }
        self.entries
            .lock()
            .expect("lock poisoned")
            .push(input.clone());
        Ok(())
    }

    async fn drain(&self) -> Result<Vec<ProvisioningInput>> {
        Ok(std::mem::take(
            &mut *self.entries.lock().expect("lock poisoned"),
        ))
    }
}
