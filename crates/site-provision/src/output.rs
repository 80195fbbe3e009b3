use std::fmt::Write as _;

use provision_core::{
    MAX_RETRIES, ProgressMessage, ProvisioningLog, StepStatus, TOTAL_STEPS,
};
use provision_operations::operations::{RunReport, step_label};
use provision_operations::tasks::TaskStatus;
use provision_operations::traits::ProgressSink;

/// Prints each progress message as one line on stdout.
pub(crate) struct ConsoleProgress;

impl ProgressSink for ConsoleProgress {
    fn broadcast(&self, message: &ProgressMessage) {
        println!("{}", format_progress(message));
    }
}

pub(crate) fn format_progress(message: &ProgressMessage) -> String {
    let state = match (message.step_status, &message.error) {
        (StepStatus::InProgress, _) => "started".to_string(),
        (StepStatus::Completed, _) => "completed".to_string(),
        (StepStatus::Failed, Some(error)) => format!("failed: {error}"),
        (StepStatus::Failed, None) => "failed".to_string(),
        (StepStatus::Compensating, _) => "rolling back".to_string(),
    };
    format!(
        "[{:>3}%] {}/{} {}: {state}",
        message.progress,
        message.current_step,
        message.total_steps,
        step_label(message.current_step)
    )
}

pub(crate) fn format_report(project_code: &str, report: &RunReport) -> String {
    let result = &report.result;
    let mut out = String::new();

    if result.success {
        let _ = writeln!(out, "Provisioning of '{project_code}' completed");
        if let Some(site_url) = &result.site_url {
            let _ = writeln!(out, "Workspace: {site_url}");
        }
    } else {
        let _ = writeln!(
            out,
            "Provisioning of '{project_code}' failed after {} of {TOTAL_STEPS} steps",
            result.completed_steps
        );
        for entry in result.compensation_results.iter().flatten() {
            let _ = writeln!(
                out,
                "  {} {}. {}{}",
                if entry.success { '↩' } else { '⚠' },
                entry.step,
                entry.label,
                entry
                    .error
                    .as_ref()
                    .map(|error| format!(": {error}"))
                    .unwrap_or_default()
            );
        }
    }

    for task in &report.post_completion {
        let status = match task.status {
            TaskStatus::Success => "ok",
            TaskStatus::Failed => "failed",
        };
        let _ = writeln!(out, "  {}: {status}", task.task);
    }

    out
}

pub(crate) fn format_log(log: &ProvisioningLog) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "Project:   {} ({})", log.project_code, log.input.project_name);
    let _ = writeln!(out, "Status:    {}", log.status);
    let _ = writeln!(
        out,
        "Step:      {}/{TOTAL_STEPS} ({} completed)",
        log.current_step, log.completed_steps
    );
    let _ = writeln!(out, "Retries:   {}/{MAX_RETRIES}", log.retry_count);
    if let Some(site_url) = &log.site_url {
        let _ = writeln!(out, "Workspace: {site_url}");
    }
    if let Some(step) = log.failed_step {
        let _ = writeln!(out, "Failed at: step {step} ({})", step_label(step));
    }
    if let Some(error) = &log.error_message {
        let _ = writeln!(out, "Error:     {error}");
    }
    if let Some(token) = &log.idempotency_token {
        let _ = writeln!(out, "Token:     {token}");
    }

    if !log.compensation_log.is_empty() {
        let _ = writeln!(out, "Compensation:");
        for entry in &log.compensation_log {
            match &entry.error {
                None => {
                    let _ = writeln!(
                        out,
                        "  ↩ {}. {} ({}ms)",
                        entry.step, entry.label, entry.duration_ms
                    );
                }
                Some(error) => {
                    let _ = writeln!(out, "  ⚠ {}. {}: {error}", entry.step, entry.label);
                }
            }
        }
    }

    out
}
