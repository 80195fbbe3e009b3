mod audit_sink;
mod hub_navigation;
mod notification_sink;
mod offline_queue;
mod progress_sink;
mod provisioning_store;
mod remote_orchestrator;
mod workspace_operations;

pub use audit_sink::AuditSink;
pub use hub_navigation::HubNavigation;
pub use notification_sink::{CompletionNotice, NotificationSink};
pub use offline_queue::OfflineQueue;
pub use progress_sink::ProgressSink;
pub use provisioning_store::ProvisioningStore;
pub use remote_orchestrator::RemoteOrchestrator;
pub use workspace_operations::{SourceRecordUpdate, WorkspaceOperations};
