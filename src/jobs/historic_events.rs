/// Deletes historic operation events older than the expiration time

use crate::jobs::cleaner::{Cleaner, CleanerKind, CleanupPass};
use crate::persistence::HistoricOperationEventStore;
use async_trait::async_trait;

pub struct HistoricOperationEventsCleaner {
    store: HistoricOperationEventStore,
}

impl HistoricOperationEventsCleaner {
    pub fn new(store: HistoricOperationEventStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Cleaner for HistoricOperationEventsCleaner {
    fn kind(&self) -> CleanerKind {
        CleanerKind::HistoricOperationEvents
    }

    async fn execute(&self, pass: &CleanupPass) -> anyhow::Result<()> {
        let deleted = self
            .store
            .create_query()
            .older_than(pass.expiration_time())
            .delete()
            .await?;
        tracing::info!("🗑️ Deleted {} expired historic operation events", deleted);
        Ok(())
    }
}
