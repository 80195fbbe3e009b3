//! Core types for provisioning project workspaces.
//!
//! A provisioning run creates a workspace through a fixed sequence of
//! [`TOTAL_STEPS`] remote operations. The types here describe the run's input,
//! its persisted log, the progress messages it broadcasts, and the audit
//! entries it emits.

mod alias;
pub mod audit;
pub mod error;
mod progress;
mod token;
pub mod types;

pub use alias::derive_alias;
pub use audit::{AuditAction, AuditEntry, EntityType};
pub use error::{CoreError, Result};
pub use progress::{ProgressMessage, StepStatus, progress_percent};
pub use token::IdempotencyToken;
pub use types::*;

/// Number of steps in every provisioning run.
pub const TOTAL_STEPS: u8 = 7;

/// Retries allowed before a run requires manual intervention.
pub const MAX_RETRIES: u32 = 3;
