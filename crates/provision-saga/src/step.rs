use std::fmt::Display;

use async_trait::async_trait;

/// A step in a saga that can be executed and compensated.
///
/// Steps share a mutable `State`: values produced by earlier steps (such as
/// an address returned by a remote create call) are written there and read
/// by later steps and by compensations.
///
/// # Type Parameters
///
/// - `State`: Data threaded through the run
/// - `Context`: Shared dependencies (injected, not passed between steps)
/// - `Error`: The error type for step failures
#[async_trait]
pub trait SagaStep: Send + Sync {
    /// Data threaded through every step of a run.
    type State: Send + Sync;

    /// Shared context providing dependencies.
    type Context: Send + Sync;

    /// Error type for step failures.
    type Error: Display + Send;

    /// Human-readable label for logging and audit records.
    fn name(&self) -> &'static str;

    /// Whether a failed compensation of this step leaves resources that need
    /// manual cleanup. Only affects reporting.
    fn is_critical(&self) -> bool {
        false
    }

    /// Execute the step.
    ///
    /// # Errors
    ///
    /// Returns an error if the step fails to complete.
    async fn execute(
        &self,
        ctx: &Self::Context,
        state: &mut Self::State,
    ) -> Result<(), Self::Error>;

    /// Compensate (undo) the step's effects.
    ///
    /// Called during rollback when a later step fails. The default
    /// implementation is a no-op, suitable for steps with nothing to undo.
    ///
    /// # Errors
    ///
    /// Returns an error if compensation fails.
    async fn compensate(
        &self,
        ctx: &Self::Context,
        state: &Self::State,
    ) -> Result<(), Self::Error> {
        let _ = (ctx, state);
        Ok(())
    }

    /// Human-readable description of what compensation will do.
    fn compensation_description(&self) -> String {
        format!("undo {}", self.name())
    }
}
