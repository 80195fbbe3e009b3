use serde::{Deserialize, Serialize};

use crate::TOTAL_STEPS;

const MESSAGE_TYPE: &str = "ProvisioningStatus";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    InProgress,
    Completed,
    Failed,
    Compensating,
}

/// Progress update broadcast at each step and compensation transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressMessage {
    #[serde(rename = "type")]
    pub message_type: String,
    pub current_step: u8,
    pub total_steps: u8,
    pub step_status: StepStatus,
    pub progress: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProgressMessage {
    #[must_use]
    pub fn new(current_step: u8, step_status: StepStatus, completed_steps: u8) -> Self {
        Self {
            message_type: MESSAGE_TYPE.to_string(),
            current_step,
            total_steps: TOTAL_STEPS,
            step_status,
            progress: progress_percent(completed_steps),
            error: None,
        }
    }

    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// `round(completed / TOTAL_STEPS * 100)`, rounding halves up.
#[must_use]
pub fn progress_percent(completed_steps: u8) -> u8 {
    let completed = u32::from(completed_steps.min(TOTAL_STEPS));
    let total = u32::from(TOTAL_STEPS);
    let percent = (completed * 200 + total) / (2 * total);
    u8::try_from(percent).unwrap_or(100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_after_one_step_is_14() {
        assert_eq!(progress_percent(1), 14);
    }

    #[test]
    fn progress_after_all_steps_is_100() {
        assert_eq!(progress_percent(7), 100);
    }

    #[test]
    fn progress_table_matches_rounded_sevenths() {
        let table: Vec<u8> = (0..=7).map(progress_percent).collect();

        assert_eq!(table, vec![0, 14, 29, 43, 57, 71, 86, 100]);
    }

    #[test]
    fn message_serializes_type_tag_and_snake_case_status() {
        let msg = ProgressMessage::new(4, StepStatus::InProgress, 3).with_error("boom");

        let json = serde_json::to_value(&msg).expect("serialize message");

        assert_eq!(json["type"], "ProvisioningStatus");
        assert_eq!(json["currentStep"], 4);
        assert_eq!(json["totalSteps"], 7);
        assert_eq!(json["stepStatus"], "in_progress");
        assert_eq!(json["progress"], 43);
        assert_eq!(json["error"], "boom");
    }
}
