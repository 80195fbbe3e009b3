use provision_core::ProgressMessage;

/// Receives progress messages as a run advances.
///
/// Delivery is fire-and-forget: a sink must not block and cannot fail the
/// run. Any `Fn(&ProgressMessage)` closure is a sink.
pub trait ProgressSink: Send + Sync {
    fn broadcast(&self, message: &ProgressMessage);
}

impl<F> ProgressSink for F
where
    F: Fn(&ProgressMessage) + Send + Sync,
{
    fn broadcast(&self, message: &ProgressMessage) {
        self(message);
    }
}
