use std::time::Duration;

use thiserror::Error;

/// Why a step invocation did not succeed.
#[derive(Debug, Error)]
pub enum StepFailure<E> {
    /// The step itself returned an error.
    #[error("{0}")]
    Failed(E),

    /// The step did not finish within the configured timeout.
    #[error("step timed out after {0:?}")]
    TimedOut(Duration),

    /// The run's cancellation token fired while the step was running.
    #[error("step cancelled")]
    Cancelled,
}

/// Error from saga setup. Step failures are reported in the outcome instead.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SagaError {
    #[error("cannot start at step {start}: saga has steps 1..={len}")]
    InvalidStartStep { start: usize, len: usize },
}
