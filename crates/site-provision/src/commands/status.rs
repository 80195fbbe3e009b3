use provision_operations::traits::ProvisioningStore;

use crate::environment::Environment;
use crate::error::{CliError, Result};
use crate::output::format_log;

pub(crate) async fn run(environment: &Environment, project_code: &str, json: bool) -> Result<()> {
    let log = environment
        .store()
        .get_provisioning_status(project_code)
        .await?
        .ok_or_else(|| CliError::UnknownProject(project_code.to_string()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&log)?);
    } else {
        print!("{}", format_log(&log));
    }
    Ok(())
}
