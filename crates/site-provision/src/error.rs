use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("failed to start async runtime")]
    Runtime(#[source] std::io::Error),

    #[error("configuration error")]
    Config(#[from] provision_config::ConfigError),

    #[error("provisioning operation failed")]
    Operation(#[from] provision_operations::OperationError),

    #[error(
        "no workspace platform is configured; build with the `simulation` feature and set `[simulation] enabled = true` to provision against the simulator"
    )]
    NoWorkspacePlatform,

    #[error("no provisioning log found for project '{0}'")]
    UnknownProject(String),

    #[error("provisioning of '{project_code}' failed at step {step}: {message}")]
    RunFailed {
        project_code: String,
        step: u8,
        message: String,
    },

    #[error("{failed} of {total} replayed runs failed")]
    ReplayFailed { failed: usize, total: usize },

    #[error("failed to render output")]
    Render(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CliError>;
