/// Deletes progress messages older than the expiration time

use crate::jobs::cleaner::{Cleaner, CleanerKind, CleanupPass};
use crate::persistence::ProgressMessageStore;
use async_trait::async_trait;

pub struct ProgressMessagesCleaner {
    store: ProgressMessageStore,
}

impl ProgressMessagesCleaner {
    pub fn new(store: ProgressMessageStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Cleaner for ProgressMessagesCleaner {
    fn kind(&self) -> CleanerKind {
        CleanerKind::ProgressMessages
    }

    async fn execute(&self, pass: &CleanupPass) -> anyhow::Result<()> {
        let deleted = self
            .store
            .create_query()
            .older_than(pass.expiration_time())
            .delete()
            .await?;
        tracing::info!("🗑️ Deleted {} expired progress messages", deleted);
        Ok(())
    }
}
