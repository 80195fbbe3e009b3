use std::sync::Arc;

use provision_core::ProgressMessage;
use tracing::trace;

use crate::traits::ProgressSink;

/// Delivers progress messages to an optional sink.
#[derive(Clone, Default)]
pub struct ProgressBroadcaster {
    sink: Option<Arc<dyn ProgressSink>>,
}

impl ProgressBroadcaster {
    pub fn new(sink: Arc<dyn ProgressSink>) -> Self {
        Self { sink: Some(sink) }
    }

    #[must_use]
    pub fn disabled() -> Self {
        Self { sink: None }
    }

    pub fn broadcast(&self, message: &ProgressMessage) {
        trace!(
            step = message.current_step,
            status = ?message.step_status,
            progress = message.progress,
            "progress"
        );
        if let Some(sink) = &self.sink {
            sink.broadcast(message);
        }
    }
}
