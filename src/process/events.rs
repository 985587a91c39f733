/// Historic operation event persister

use crate::persistence::{EventType, HistoricOperationEvent, HistoricOperationEventStore, Result};
use chrono::Utc;

#[derive(Debug, Clone)]
pub struct HistoricOperationEventPersister {
    store: HistoricOperationEventStore,
}

impl HistoricOperationEventPersister {
    pub fn new(store: HistoricOperationEventStore) -> Self {
        Self { store }
    }

    /// Append `event_type` for `process_id`, timestamped now
    pub async fn add(&self, process_id: &str, event_type: EventType) -> Result<()> {
        tracing::debug!(process_id = %process_id, event_type = %event_type, "📝 Recording operation event");
        self.store
            .add(&HistoricOperationEvent::new(process_id, event_type, Utc::now()))
            .await?;
        Ok(())
    }
}
