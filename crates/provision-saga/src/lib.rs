//! Saga pattern for multi-step operations that cannot share a transaction.
//!
//! A [`Saga`] owns an immutable, ordered table of steps. Steps run one at a
//! time against a shared mutable state; when a step fails, the steps that
//! completed during this run are compensated in strict reverse order. A
//! failing compensation is recorded and the rollback continues.
//!
//! Runs can start at any step (resuming a previous attempt), observers are
//! notified at every transition, and each step invocation is raced against a
//! cancellation token and an optional timeout.

mod audit;
mod builder;
mod error;
mod observer;
mod saga;
mod step;

pub use audit::{SagaAuditLog, StepRecord, StepStatus};
pub use builder::{Empty, HasSteps, SagaBuilder};
pub use error::{SagaError, StepFailure};
pub use observer::{CompensationRecord, NoopObserver, SagaObserver, StepInfo};
pub use saga::{FailedStep, Saga, SagaOutcome};
pub use step::SagaStep;
pub use tokio_util::sync::CancellationToken;
