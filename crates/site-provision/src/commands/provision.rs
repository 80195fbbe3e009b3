use clap::Args;
use provision_core::ProvisioningInput;
use provision_operations::operations::{FallbackOutcome, ProvisioningRun};

use crate::environment::Environment;
use crate::error::{CliError, Result};
use crate::output::format_report;

#[derive(Args)]
pub(crate) struct ProvisionArgs {
    /// Source record (lead) the project was created from
    #[arg(long)]
    lead_id: u64,
    /// Project code, e.g. 25-042-01
    #[arg(long)]
    project_code: String,
    #[arg(long)]
    project_name: String,
    #[arg(long)]
    client_name: String,
    #[arg(long)]
    division: String,
    #[arg(long, default_value = "")]
    region: String,
    /// User recorded in the audit trail
    #[arg(long)]
    requested_by: String,
    /// Workspace alias instead of the project code digits
    #[arg(long)]
    site_name: Option<String>,
    /// Registered provisioning template to apply instead of copying
    #[arg(long)]
    template: Option<String>,
    /// Queue the request offline if the local engine cannot start it
    #[arg(long)]
    fallback: bool,
}

impl ProvisionArgs {
    fn into_input(self) -> ProvisioningInput {
        ProvisioningInput {
            lead_id: self.lead_id,
            project_code: self.project_code,
            project_name: self.project_name,
            client_name: self.client_name,
            division: self.division,
            region: self.region,
            requested_by: self.requested_by,
            site_name_override: self.site_name,
            template_name: self.template,
        }
    }
}

pub(crate) async fn run(environment: &Environment, args: ProvisionArgs) -> Result<()> {
    let fallback = args.fallback;
    let input = args.into_input();
    let project_code = input.project_code.clone();
    let service = environment.service()?;

    if !fallback {
        let run = service.provision_site(input).await?;
        return wait_for_run(&project_code, run).await;
    }

    match service.provision_site_with_fallback(input).await? {
        FallbackOutcome::Remote(log) => {
            println!(
                "Provisioning of '{}' handed to the remote orchestrator ({})",
                log.project_code, log.status
            );
            Ok(())
        }
        FallbackOutcome::Local(run) => wait_for_run(&project_code, run).await,
        FallbackOutcome::QueuedOffline => {
            println!("Provisioning of '{project_code}' queued offline; run `replay-queue` later");
            Ok(())
        }
    }
}

/// Waits for `run`, cancelling it on Ctrl-C so completed steps are rolled
/// back before the process exits.
pub(super) async fn wait_for_run(project_code: &str, run: ProvisioningRun) -> Result<()> {
    println!("Provisioning of '{project_code}' started");

    let token = run.cancellation_token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("interrupted, rolling back");
            token.cancel();
        }
    });
    let report = run.join().await;
    interrupt.abort();
    let report = report?;

    print!("{}", format_report(project_code, &report));

    let result = report.result;
    if result.success {
        return Ok(());
    }
    Err(CliError::RunFailed {
        project_code: project_code.to_string(),
        step: result.failed_step.unwrap_or(0),
        message: result.error.unwrap_or_default(),
    })
}
