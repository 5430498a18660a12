//! Step transition event stream
//!
//! The supervisor emits one [`StepEvent`] per attempted step invocation, in
//! order. Observers are optional; absence of a subscriber does not affect the
//! run.

use crate::state::{StepKind, StepStatus};
use async_trait::async_trait;
use std::time::Duration;
use tracing::info;

/// One step transition as seen by observers.
#[derive(Debug, Clone)]
pub struct StepEvent {
    pub step: StepKind,
    pub status: StepStatus,
    pub elapsed: Duration,
    pub message: String,
}

/// Observer for step transition events.
#[async_trait]
pub trait PipelineObserver: Send + Sync {
    async fn on_event(&self, event: &StepEvent);
}

/// No-op observer implementation.
pub struct NoOpObserver;

#[async_trait]
impl PipelineObserver for NoOpObserver {
    async fn on_event(&self, _event: &StepEvent) {}
}

/// Observer that bridges step events to `tracing`.
pub struct LoggingObserver;

#[async_trait]
impl PipelineObserver for LoggingObserver {
    async fn on_event(&self, event: &StepEvent) {
        info!(
            step = %event.step,
            status = ?event.status,
            elapsed_ms = event.elapsed.as_millis() as u64,
            "{}",
            event.message
        );
    }
}
