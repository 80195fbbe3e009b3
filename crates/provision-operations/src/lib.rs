//! Provisioning of project workspaces as a compensating saga.
//!
//! [`operations::SagaEngine`] runs the seven provisioning steps against the
//! collaborators in [`traits`]; [`operations::ProvisioningService`] adds
//! asynchronous triggering, retry-from-step, remote/offline fallback and
//! post-completion side effects.

mod audit_trail;
mod error;
pub mod operations;
pub mod providers;
pub mod tasks;
pub mod traits;

#[cfg(any(test, feature = "testing"))]
pub mod mocks;

pub use audit_trail::AuditTrail;
pub use error::{OperationError, Result};
