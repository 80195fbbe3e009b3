mod audit;
mod notification;
mod offline_queue;
#[cfg(feature = "simulation")]
mod simulated;
mod store;

pub use audit::TracingAuditSink;
pub use notification::TracingNotificationSink;
pub use offline_queue::FileSystemOfflineQueue;
#[cfg(feature = "simulation")]
pub use simulated::SimulatedWorkspaceOperations;
pub use store::FileSystemProvisioningStore;
