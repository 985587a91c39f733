/// Stale lock owner reclaimer
///
/// A lock owner whose heartbeat is older than the stale threshold belongs to
/// an instance that stopped. Its engine job locks are cleared so a live
/// instance can pick the jobs up, then its heartbeat rows are removed.
/// Several instances may reclaim the same owner concurrently; clearing is
/// idempotent in the engine.

use crate::engine::ProcessEngineFacade;
use crate::persistence::LockOwnerStore;
use anyhow::Result;
use chrono::{Duration, Utc};

#[derive(Clone)]
pub struct LockOwnerReclaimer {
    engine: ProcessEngineFacade,
    lock_owners: LockOwnerStore,
    stale_after: Duration,
}

impl LockOwnerReclaimer {
    pub fn new(engine: ProcessEngineFacade, lock_owners: LockOwnerStore, stale_after: Duration) -> Self {
        Self {
            engine,
            lock_owners,
            stale_after,
        }
    }

    /// Clear the locks of every stale owner, then delete their rows
    ///
    /// Returns the number of deleted heartbeat rows.
    pub async fn reclaim(&self) -> Result<u64> {
        let threshold = Utc::now() - self.stale_after;
        let stale_owners: Vec<String> = self
            .lock_owners
            .create_query()
            .older_than(threshold)
            .list()
            .await?
            .into_iter()
            .map(|entry| entry.lock_owner)
            .collect();

        if stale_owners.is_empty() {
            tracing::debug!("No stale lock owners");
            return Ok(0);
        }

        for lock_owner in &stale_owners {
            match self.engine.clear_lock_owner(lock_owner).await {
                Ok(()) => tracing::info!(lock_owner = %lock_owner, "🔓 Cleared locks of stale lock owner"),
                Err(e) => tracing::warn!(lock_owner = %lock_owner, "⚠️ Clearing locks of stale lock owner failed: {}", e),
            }
        }

        let deleted = self
            .lock_owners
            .create_query()
            .lock_owners_in(&stale_owners)
            .older_than(threshold)
            .delete()
            .await?;

        tracing::info!("🧹 Deleted {} stale lock owner entries", deleted);
        Ok(deleted)
    }
}
