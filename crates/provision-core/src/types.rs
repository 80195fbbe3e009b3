use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::alias::derive_alias;
use crate::error::{CoreError, Result};
use crate::token::IdempotencyToken;
use crate::{MAX_RETRIES, TOTAL_STEPS};

/// Request to provision a workspace for a won lead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisioningInput {
    /// Identifier of the originating lead record.
    pub lead_id: u64,
    /// Immutable natural key of the project, e.g. `25-042-01`.
    pub project_code: String,
    pub project_name: String,
    pub client_name: String,
    pub division: String,
    pub region: String,
    pub requested_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_name_override: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_name: Option<String>,
}

impl ProvisioningInput {
    /// # Errors
    ///
    /// Returns an error if the project code is blank or contains the token
    /// separator `:`, or if no workspace alias can be derived.
    pub fn validate(&self) -> Result<()> {
        if self.project_code.trim().is_empty() {
            return Err(CoreError::EmptyProjectCode);
        }
        if self.project_code.contains(':') {
            return Err(CoreError::ProjectCodeSeparator(self.project_code.clone()));
        }
        if self.alias().is_empty() {
            let source = self
                .site_name_override
                .clone()
                .unwrap_or_else(|| self.project_code.clone());
            return Err(CoreError::EmptyAlias(source));
        }
        Ok(())
    }

    /// The workspace alias step 1 creates the workspace under.
    #[must_use]
    pub fn alias(&self) -> String {
        derive_alias(&self.project_code, self.site_name_override.as_deref())
    }
}

/// Checks that `step` names one of the provisioning steps.
///
/// # Errors
///
/// Returns an error if `step` is outside `1..=TOTAL_STEPS`.
pub fn validate_step(step: u8) -> Result<u8> {
    if (1..=TOTAL_STEPS).contains(&step) {
        Ok(step)
    } else {
        Err(CoreError::StepOutOfRange {
            step,
            total: TOTAL_STEPS,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ProvisioningStatus {
    #[default]
    Queued,
    InProgress,
    Compensating,
    Completed,
    Failed,
}

impl ProvisioningStatus {
    /// Only a failed run may be resumed.
    #[must_use]
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Failed)
    }
}

impl fmt::Display for ProvisioningStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Queued => "Queued",
            Self::InProgress => "InProgress",
            Self::Compensating => "Compensating",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
        };
        write!(f, "{s}")
    }
}

/// Outcome of undoing one completed step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompensationResult {
    pub step: u8,
    pub label: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(rename = "duration")]
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
}

/// Persisted state of a provisioning run, keyed by project code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisioningLog {
    pub project_code: String,
    pub input: ProvisioningInput,
    pub status: ProvisioningStatus,
    pub current_step: u8,
    pub completed_steps: u8,
    pub retry_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_step: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default)]
    pub compensation_log: Vec<CompensationResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_token: Option<IdempotencyToken>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_url: Option<String>,
    pub requested_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl ProvisioningLog {
    /// Creates the initial log for a freshly triggered run.
    #[must_use]
    pub fn queued(input: ProvisioningInput, requested_at: DateTime<Utc>) -> Self {
        Self {
            project_code: input.project_code.clone(),
            input,
            status: ProvisioningStatus::Queued,
            current_step: 0,
            completed_steps: 0,
            retry_count: 0,
            failed_step: None,
            error_message: None,
            compensation_log: Vec::new(),
            idempotency_token: None,
            site_url: None,
            requested_at,
            completed_at: None,
        }
    }

    #[must_use]
    pub fn retries_exhausted(&self) -> bool {
        self.retry_count >= MAX_RETRIES
    }

    /// Resets the log for a retry that resumes at `from_step`.
    ///
    /// Steps before `from_step` count as completed. The previous failure and
    /// compensation log are cleared; the workspace address is kept.
    pub fn begin_retry(&mut self, from_step: u8) {
        self.retry_count += 1;
        self.status = ProvisioningStatus::InProgress;
        self.current_step = from_step;
        self.completed_steps = from_step.saturating_sub(1);
        self.failed_step = None;
        self.error_message = None;
        self.compensation_log.clear();
        self.completed_at = None;
    }

    /// `completed_steps <= current_step <= TOTAL_STEPS` and the retry budget holds.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.completed_steps <= self.current_step
            && self.current_step <= TOTAL_STEPS
            && self.retry_count <= MAX_RETRIES
    }
}

/// Partial update applied to a [`ProvisioningLog`]; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisioningLogPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ProvisioningStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_step: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_steps: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_step: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compensation_log: Option<Vec<CompensationResult>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_token: Option<IdempotencyToken>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl ProvisioningLogPatch {
    #[must_use]
    pub fn in_progress(current_step: u8, completed_steps: u8) -> Self {
        Self {
            status: Some(ProvisioningStatus::InProgress),
            current_step: Some(current_step),
            completed_steps: Some(completed_steps),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn compensating() -> Self {
        Self {
            status: Some(ProvisioningStatus::Compensating),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failed(failed_step: u8, error_message: impl Into<String>, completed_steps: u8) -> Self {
        Self {
            status: Some(ProvisioningStatus::Failed),
            current_step: Some(failed_step),
            completed_steps: Some(completed_steps),
            failed_step: Some(failed_step),
            error_message: Some(error_message.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn completed(site_url: Option<String>, completed_at: DateTime<Utc>) -> Self {
        Self {
            status: Some(ProvisioningStatus::Completed),
            current_step: Some(TOTAL_STEPS),
            completed_steps: Some(TOTAL_STEPS),
            site_url,
            completed_at: Some(completed_at),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_token(mut self, token: IdempotencyToken) -> Self {
        self.idempotency_token = Some(token);
        self
    }

    #[must_use]
    pub fn with_site_url(mut self, site_url: Option<String>) -> Self {
        self.site_url = site_url;
        self
    }

    #[must_use]
    pub fn with_compensation_log(mut self, log: Vec<CompensationResult>) -> Self {
        self.compensation_log = Some(log);
        self
    }

    pub fn apply(&self, log: &mut ProvisioningLog) {
        if let Some(status) = self.status {
            log.status = status;
        }
        if let Some(step) = self.current_step {
            log.current_step = step;
        }
        if let Some(completed) = self.completed_steps {
            log.completed_steps = completed;
        }
        if let Some(step) = self.failed_step {
            log.failed_step = Some(step);
        }
        if let Some(message) = &self.error_message {
            log.error_message = Some(message.clone());
        }
        if let Some(entries) = &self.compensation_log {
            log.compensation_log.clone_from(entries);
        }
        if let Some(token) = &self.idempotency_token {
            log.idempotency_token = Some(token.clone());
        }
        if let Some(url) = &self.site_url {
            log.site_url = Some(url.clone());
        }
        if let Some(at) = self.completed_at {
            log.completed_at = Some(at);
        }
    }
}
