use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuditAction {
    ProvisioningTriggered,
    ProvisioningCompleted,
    ProvisioningFailed,
    StepCompensated,
    CompensationFailed,
    RetryRequested,
    RemoteOrchestratorUsed,
    FallbackToLocal,
    QueuedOffline,
    OfflineReplayed,
    PostCompletionTask,
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ProvisioningTriggered => "SiteProvisioningTriggered",
            Self::ProvisioningCompleted => "SiteProvisioningCompleted",
            Self::ProvisioningFailed => "SiteProvisioningFailed",
            Self::StepCompensated => "SiteProvisioningStepCompensated",
            Self::CompensationFailed => "SiteProvisioningCompensationFailed",
            Self::RetryRequested => "SiteProvisioningRetried",
            Self::RemoteOrchestratorUsed => "SiteProvisioningRemoteTriggered",
            Self::FallbackToLocal => "SiteProvisioningFallbackToLocal",
            Self::QueuedOffline => "SiteProvisioningQueuedOffline",
            Self::OfflineReplayed => "SiteProvisioningOfflineReplayed",
            Self::PostCompletionTask => "SiteProvisioningPostCompletion",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityType {
    Project,
    Lead,
}

/// Audit trail record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AuditEntry {
    pub action: AuditAction,
    pub entity_type: EntityType,
    pub entity_id: String,
    pub project_code: String,
    pub user: String,
    pub details: String,
    pub timestamp: DateTime<Utc>,
}

impl AuditEntry {
    /// Entry about the project identified by `project_code`.
    #[must_use]
    pub fn project(
        action: AuditAction,
        project_code: &str,
        user: &str,
        details: impl Into<String>,
    ) -> Self {
        Self {
            action,
            entity_type: EntityType::Project,
            entity_id: project_code.to_string(),
            project_code: project_code.to_string(),
            user: user.to_string(),
            details: details.into(),
            timestamp: Utc::now(),
        }
    }
}
