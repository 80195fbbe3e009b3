use tracing::info;

use super::provision::wait_for_run;
use crate::environment::Environment;
use crate::error::Result;

pub(crate) async fn run(environment: &Environment, project_code: &str, from_step: u8) -> Result<()> {
    let service = environment.service()?;
    let run = service.retry_from_step(project_code, from_step).await?;
    info!(
        %project_code,
        from_step,
        retry_count = run.log().retry_count,
        "retry started"
    );
    wait_for_run(project_code, run).await
}
