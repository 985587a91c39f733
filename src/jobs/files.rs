/// Deletes metadata of files not modified since the expiration time

use crate::jobs::cleaner::{Cleaner, CleanerKind, CleanupPass};
use crate::persistence::FileEntryStore;
use async_trait::async_trait;

pub struct FilesCleaner {
    store: FileEntryStore,
}

impl FilesCleaner {
    pub fn new(store: FileEntryStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Cleaner for FilesCleaner {
    fn kind(&self) -> CleanerKind {
        CleanerKind::Files
    }

    async fn execute(&self, pass: &CleanupPass) -> anyhow::Result<()> {
        tracing::debug!("Deleting files modified before {}", pass.expiration_time());
        let deleted = self
            .store
            .create_query()
            .modified_before(pass.expiration_time())
            .delete()
            .await?;
        tracing::info!("🗑️ Deleted {} expired files", deleted);
        Ok(())
    }
}
