/// Operation telemetry
///
/// Publishes an "operation failed" signal when an operation that ended in an
/// error is aborted.

use crate::persistence::ProcessType;
use serde::Serialize;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedOperationEvent {
    pub mta_id: Option<String>,
    pub space_id: String,
    pub process_type: Option<ProcessType>,
}

pub trait OperationMetrics: Send + Sync {
    fn publish_failed_operation(&self, event: &FailedOperationEvent);
}

/// Emits telemetry as structured tracing events on the `telemetry` target
#[derive(Debug, Default, Clone)]
pub struct TracingOperationMetrics;

impl OperationMetrics for TracingOperationMetrics {
    fn publish_failed_operation(&self, event: &FailedOperationEvent) {
        tracing::info!(
            target: "telemetry",
            mta_id = event.mta_id.as_deref().unwrap_or_default(),
            space_id = %event.space_id,
            process_type = event.process_type.map(|t| t.as_str()).unwrap_or_default(),
            "📉 Operation failed"
        );
    }
}

/// Keeps published events in memory
#[derive(Debug, Default)]
pub struct RecordingOperationMetrics {
    events: Mutex<Vec<FailedOperationEvent>>,
}

impl RecordingOperationMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<FailedOperationEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

impl OperationMetrics for RecordingOperationMetrics {
    fn publish_failed_operation(&self, event: &FailedOperationEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event.clone()),
            Err(poisoned) => poisoned.into_inner().push(event.clone()),
        }
    }
}
