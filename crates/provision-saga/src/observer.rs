use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Identifies a step by its 1-based position in the saga.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepInfo {
    pub number: usize,
    pub name: &'static str,
    pub critical: bool,
}

/// Outcome of one compensation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompensationRecord {
    pub step: StepInfo,
    pub success: bool,
    pub error: Option<String>,
    pub duration: Duration,
    pub timestamp: DateTime<Utc>,
}

/// Receives saga transitions as they happen.
///
/// Hooks are awaited in order, so an observer sees `step_started` for step
/// *k* before `step_completed`/`step_failed` for *k*, and that before
/// anything for step *k*+1. Hooks cannot fail the saga; implementations
/// handle their own errors.
#[async_trait]
pub trait SagaObserver<S: Sync>: Send + Sync {
    async fn step_started(&self, step: StepInfo, state: &S) {
        let _ = (step, state);
    }

    async fn step_completed(&self, step: StepInfo, state: &S) {
        let _ = (step, state);
    }

    async fn step_failed(&self, step: StepInfo, error: &str) {
        let _ = (step, error);
    }

    async fn compensation_started(&self, step: StepInfo) {
        let _ = step;
    }

    async fn compensation_finished(&self, record: &CompensationRecord) {
        let _ = record;
    }
}

/// Observer that ignores every transition.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl<S: Sync> SagaObserver<S> for NoopObserver {}
