use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OperationError {
    #[error(transparent)]
    Core(#[from] provision_core::CoreError),

    #[error(transparent)]
    Config(#[from] provision_config::ConfigError),

    /// A workspace platform call failed. Displays the platform's message
    /// unchanged; `operation` is kept for logging.
    #[error("{message}")]
    Workspace {
        operation: &'static str,
        message: String,
    },

    #[error("workspace address is unknown; the workspace has not been created for this project")]
    MissingWorkspaceAddress,

    #[error("no provisioning log found for project '{project_code}'")]
    LogNotFound { project_code: String },

    #[error("project '{project_code}' is {status}; only a failed run can be retried")]
    NotRetryable {
        project_code: String,
        status: provision_core::ProvisioningStatus,
    },

    #[error(
        "Maximum retries ({max}) exceeded for project '{project_code}'. Manual intervention required."
    )]
    RetriesExhausted { project_code: String, max: u32 },

    #[error("failed to read provisioning log '{path}'")]
    StoreRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write provisioning log '{path}'")]
    StoreWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse provisioning log '{path}'")]
    StoreParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize provisioning data for '{project_code}'")]
    StoreSerialize {
        project_code: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("remote orchestrator failed: {0}")]
    RemoteOrchestrator(String),

    #[error("failed to access offline queue '{path}'")]
    OfflineQueue {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse offline queue '{path}' at line {line}")]
    OfflineQueueParse {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error(
        "could not re-queue replayed requests for {}; they are no longer in the offline queue",
        .project_codes.join(", ")
    )]
    ReplayRequeue { project_codes: Vec<String> },

    #[error("audit sink rejected entry: {0}")]
    Audit(String),

    #[error("completion notification failed: {0}")]
    Notification(String),

    #[error("hub navigation update failed: {0}")]
    HubNavigation(String),

    #[error("provisioning task did not finish")]
    TaskJoin(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, OperationError>;
