use chrono::{DateTime, Utc};

use crate::observer::StepInfo;

/// Status of a step in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum StepStatus {
    /// Step is running or executed successfully.
    Executed,
    /// Step failed during execution.
    Failed,
    /// Step was compensated successfully.
    Compensated,
    /// Step compensation failed.
    CompensationFailed,
}

/// Record of a step's execution in the saga.
#[derive(Debug, Clone)]
pub struct StepRecord {
    pub number: usize,
    pub name: String,
    pub status: StepStatus,
    pub started_at: DateTime<Utc>,
    /// When the step completed (execution or compensation).
    pub completed_at: Option<DateTime<Utc>>,
    pub compensation_description: Option<String>,
}

/// Audit log tracking all step executions of one saga run.
#[derive(Debug, Default, Clone)]
pub struct SagaAuditLog {
    records: Vec<StepRecord>,
}

impl SagaAuditLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_start(&mut self, step: StepInfo) {
        self.records.push(StepRecord {
            number: step.number,
            name: step.name.to_string(),
            status: StepStatus::Executed,
            started_at: Utc::now(),
            completed_at: None,
            compensation_description: None,
        });
    }

    /// Mark the last step as failed.
    pub(crate) fn record_failure(&mut self) {
        if let Some(record) = self.records.last_mut() {
            record.status = StepStatus::Failed;
            record.completed_at = Some(Utc::now());
        }
    }

    /// Mark the last step as completed successfully.
    pub(crate) fn record_success(&mut self, compensation_description: String) {
        if let Some(record) = self.records.last_mut() {
            record.status = StepStatus::Executed;
            record.completed_at = Some(Utc::now());
            record.compensation_description = Some(compensation_description);
        }
    }

    pub(crate) fn record_compensated(&mut self, number: usize) {
        self.mark(number, StepStatus::Compensated);
    }

    pub(crate) fn record_compensation_failed(&mut self, number: usize) {
        self.mark(number, StepStatus::CompensationFailed);
    }

    fn mark(&mut self, number: usize, status: StepStatus) {
        if let Some(record) = self.records.iter_mut().find(|r| r.number == number) {
            record.status = status;
            record.completed_at = Some(Utc::now());
        }
    }

    #[must_use]
    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    /// One line per step, prefixed with a status marker.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();
        for record in &self.records {
            let status = match record.status {
                StepStatus::Executed => "✓",
                StepStatus::Failed => "✗",
                StepStatus::Compensated => "↩",
                StepStatus::CompensationFailed => "⚠",
            };
            lines.push(format!("{status} {}. {}", record.number, record.name));
        }
        lines.join("\n")
    }
}
