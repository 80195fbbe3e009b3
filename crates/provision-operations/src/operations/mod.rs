mod fallback;
mod provision;
mod service;

pub use fallback::FallbackOutcome;
pub use provision::{
    EngineContext, ProgressBroadcaster, ProvisioningState, STEP_LABELS, SagaEngine,
    SagaExecutionResult, StepContext, TemplateStrategy, step_label,
};
pub use service::{ProvisioningRun, ProvisioningService, RunReport};
