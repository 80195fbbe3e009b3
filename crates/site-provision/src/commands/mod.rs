mod provision;
mod replay;
mod retry;
mod status;

use clap::Subcommand;

use crate::environment::Environment;
use crate::error::Result;

pub(crate) use provision::ProvisionArgs;

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Provision a workspace for a project and wait for the run to finish
    Provision(ProvisionArgs),
    /// Show the provisioning log of a project
    Status {
        /// Project code, e.g. 25-042-01
        project_code: String,
        /// Print the raw log as JSON
        #[arg(long)]
        json: bool,
    },
    /// Resume a failed run from a step
    Retry {
        /// Project code, e.g. 25-042-01
        project_code: String,
        /// Step to resume at (1-7)
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=7))]
        from_step: u8,
    },
    /// Start every request waiting in the offline queue
    ReplayQueue,
}

impl Commands {
    pub(crate) async fn execute(self, environment: &Environment) -> Result<()> {
        match self {
            Self::Provision(args) => provision::run(environment, args).await,
            Self::Status { project_code, json } => {
                status::run(environment, &project_code, json).await
            }
            Self::Retry {
                project_code,
                from_step,
            } => retry::run(environment, &project_code, from_step).await,
            Self::ReplayQueue => replay::run(environment).await,
        }
    }
}
