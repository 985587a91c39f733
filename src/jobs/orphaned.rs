/// Orphaned space data cleaner
///
/// Configuration rows, operations and uploaded files reference platform
/// spaces. When the platform confirms a space is gone, its rows are audited
/// one by one and bulk-deleted. Rows in spaces that exist, or whose lookup
/// failed for any other reason, are kept.

use crate::audit::AuditLog;
use crate::jobs::cleaner::{Cleaner, CleanerKind, CleanupPass};
use crate::persistence::{
    AuditableConfiguration, ConfigurationEntry, ConfigurationEntryStore, ConfigurationSubscription,
    ConfigurationSubscriptionStore, FileEntry, FileEntryStore, Operation, OperationStore,
};
use crate::platform::{SpaceClient, SpaceLookup};
use async_trait::async_trait;
use std::{collections::BTreeMap, sync::Arc};

/// Rows that may become orphaned, and how to remove them per space
#[async_trait]
pub trait OrphanedDataSource: Send + Sync {
    type Item: AuditableConfiguration + Send + Sync;

    fn kind(&self) -> CleanerKind;

    async fn fetch(&self) -> anyhow::Result<Vec<Self::Item>>;

    fn space_id<'a>(&self, item: &'a Self::Item) -> &'a str;

    async fn delete_by_space_id(&self, space_id: &str) -> anyhow::Result<u64>;
}

pub struct OrphanedDataCleaner<S> {
    source: S,
    spaces: Arc<dyn SpaceClient>,
    audit_log: Arc<dyn AuditLog>,
}

impl<S: OrphanedDataSource> OrphanedDataCleaner<S> {
    pub fn new(source: S, spaces: Arc<dyn SpaceClient>, audit_log: Arc<dyn AuditLog>) -> Self {
        Self {
            source,
            spaces,
            audit_log,
        }
    }

    async fn delete_orphans(&self, space_id: &str, items: &[&S::Item]) {
        for item in items {
            self.audit_log.log_config_delete(*item);
        }

        match self.source.delete_by_space_id(space_id).await {
            Ok(deleted) => tracing::info!(
                cleaner = %self.source.kind(),
                space_id = %space_id,
                "🗑️ Deleted {} orphaned rows of deleted space",
                deleted
            ),
            Err(e) => tracing::warn!(
                cleaner = %self.source.kind(),
                space_id = %space_id,
                "⚠️ Deleting orphaned rows failed: {:#}",
                e
            ),
        }
    }
}

#[async_trait]
impl<S: OrphanedDataSource> Cleaner for OrphanedDataCleaner<S> {
    fn kind(&self) -> CleanerKind {
        self.source.kind()
    }

    async fn execute(&self, pass: &CleanupPass) -> anyhow::Result<()> {
        if !pass.mark_executed(self.source.kind()) {
            tracing::debug!(cleaner = %self.source.kind(), pass_id = %pass.id(), "Already executed in this pass");
            return Ok(());
        }

        let items = self.source.fetch().await?;
        let mut by_space: BTreeMap<&str, Vec<&S::Item>> = BTreeMap::new();
        for item in &items {
            by_space.entry(self.source.space_id(item)).or_default().push(item);
        }

        for (space_id, space_items) in by_space {
            match self.spaces.get_space(space_id).await {
                SpaceLookup::Exists => {}
                SpaceLookup::Absent => self.delete_orphans(space_id, &space_items).await,
                SpaceLookup::Unknown(reason) => tracing::warn!(
                    cleaner = %self.source.kind(),
                    space_id = %space_id,
                    "⚠️ Could not determine whether space exists, keeping its data: {}",
                    reason
                ),
            }
        }
        Ok(())
    }
}

pub struct ConfigurationEntrySource {
    store: ConfigurationEntryStore,
}

impl ConfigurationEntrySource {
    pub fn new(store: ConfigurationEntryStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl OrphanedDataSource for ConfigurationEntrySource {
    type Item = ConfigurationEntry;

    fn kind(&self) -> CleanerKind {
        CleanerKind::OrphanedConfigurationEntries
    }

    async fn fetch(&self) -> anyhow::Result<Vec<ConfigurationEntry>> {
        Ok(self.store.create_query().list().await?)
    }

    fn space_id<'a>(&self, item: &'a ConfigurationEntry) -> &'a str {
        &item.space_id
    }

    async fn delete_by_space_id(&self, space_id: &str) -> anyhow::Result<u64> {
        Ok(self.store.create_query().space_id(space_id).delete().await?)
    }
}

pub struct ConfigurationSubscriptionSource {
    store: ConfigurationSubscriptionStore,
}

impl ConfigurationSubscriptionSource {
    pub fn new(store: ConfigurationSubscriptionStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl OrphanedDataSource for ConfigurationSubscriptionSource {
    type Item = ConfigurationSubscription;

    fn kind(&self) -> CleanerKind {
        CleanerKind::OrphanedConfigurationSubscriptions
    }

    async fn fetch(&self) -> anyhow::Result<Vec<ConfigurationSubscription>> {
        Ok(self.store.create_query().list().await?)
    }

    fn space_id<'a>(&self, item: &'a ConfigurationSubscription) -> &'a str {
        &item.space_id
    }

    async fn delete_by_space_id(&self, space_id: &str) -> anyhow::Result<u64> {
        Ok(self.store.create_query().space_id(space_id).delete().await?)
    }
}

/// Operations of any state; in-flight ones of a deleted space cannot finish
pub struct OperationSource {
    store: OperationStore,
}

impl OperationSource {
    pub fn new(store: OperationStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl OrphanedDataSource for OperationSource {
    type Item = Operation;

    fn kind(&self) -> CleanerKind {
        CleanerKind::OrphanedOperations
    }

    async fn fetch(&self) -> anyhow::Result<Vec<Operation>> {
        Ok(self.store.create_query().list().await?)
    }

    fn space_id<'a>(&self, item: &'a Operation) -> &'a str {
        &item.space_id
    }

    async fn delete_by_space_id(&self, space_id: &str) -> anyhow::Result<u64> {
        Ok(self.store.create_query().space_id(space_id).delete().await?)
    }
}

pub struct FileEntrySource {
    store: FileEntryStore,
}

impl FileEntrySource {
    pub fn new(store: FileEntryStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl OrphanedDataSource for FileEntrySource {
    type Item = FileEntry;

    fn kind(&self) -> CleanerKind {
        CleanerKind::OrphanedFiles
    }

    async fn fetch(&self) -> anyhow::Result<Vec<FileEntry>> {
        Ok(self.store.create_query().list().await?)
    }

    fn space_id<'a>(&self, item: &'a FileEntry) -> &'a str {
        &item.space
    }

    async fn delete_by_space_id(&self, space_id: &str) -> anyhow::Result<u64> {
        Ok(self.store.create_query().space(space_id).delete().await?)
    }
}

pub type OrphanedConfigurationEntriesCleaner = OrphanedDataCleaner<ConfigurationEntrySource>;
pub type OrphanedConfigurationSubscriptionsCleaner = OrphanedDataCleaner<ConfigurationSubscriptionSource>;
pub type OrphanedOperationsCleaner = OrphanedDataCleaner<OperationSource>;
pub type OrphanedFilesCleaner = OrphanedDataCleaner<FileEntrySource>;
