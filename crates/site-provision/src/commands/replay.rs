use crate::environment::Environment;
use crate::error::{CliError, Result};
use crate::output::format_report;

pub(crate) async fn run(environment: &Environment) -> Result<()> {
    if !environment.config().offline_queue() {
        println!("Offline queue is disabled; set `offline_queue = true` to enable it");
        return Ok(());
    }

    let service = environment.service()?;
    let runs = service.replay_offline_queue().await?;
    if runs.is_empty() {
        println!("Offline queue is empty");
        return Ok(());
    }

    let total = runs.len();
    let mut failed = 0;
    for run in runs {
        let project_code = run.log().project_code.clone();
        let report = run.join().await?;
        if !report.result.success {
            failed += 1;
        }
        print!("{}", format_report(&project_code, &report));
    }

    if failed > 0 {
        return Err(CliError::ReplayFailed { failed, total });
    }
    Ok(())
}
