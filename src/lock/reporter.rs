/// Lock owner heartbeat reporter

use crate::engine::ProcessEngineFacade;
use crate::persistence::{LockOwnerEntry, LockOwnerStore, StoreError};
use anyhow::Result;
use chrono::Utc;

/// Records that this instance's engine lock owner is alive
#[derive(Clone)]
pub struct LockOwnerReporter {
    engine: ProcessEngineFacade,
    lock_owners: LockOwnerStore,
}

impl LockOwnerReporter {
    pub fn new(engine: ProcessEngineFacade, lock_owners: LockOwnerStore) -> Self {
        Self { engine, lock_owners }
    }

    /// Insert or refresh the heartbeat row of the current lock owner
    pub async fn report(&self) -> Result<()> {
        let lock_owner = self.engine.lock_owner();
        let entry = LockOwnerEntry::new(lock_owner.clone(), Utc::now());

        let existing = self
            .lock_owners
            .create_query()
            .lock_owner(&lock_owner)
            .single_result()
            .await?;

        if existing.is_some() {
            self.lock_owners.update(&entry).await?;
        } else {
            match self.lock_owners.add(&entry).await {
                Ok(_) => {}
                // Another reporter with the same identity inserted first
                Err(StoreError::Conflict { .. }) => self.lock_owners.update(&entry).await?,
                Err(e) => return Err(e.into()),
            }
        }

        tracing::debug!(lock_owner = %lock_owner, "💓 Reported lock owner heartbeat");
        Ok(())
    }
}
