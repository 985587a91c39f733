/// Per-mta-per-space lock bookkeeping on operations
///
/// At most one in-flight operation per (mta id, space id) may hold the lock.
/// The workflow engine serializes execution; this type only keeps the
/// `acquired_lock` flag of the operation records consistent with that.

use crate::persistence::{OperationState, OperationStore, StoreError};
use crate::process::ProcessActionError;
use chrono::Utc;

#[derive(Debug, Clone)]
pub struct ProcessConflictPreventer {
    operations: OperationStore,
}

impl ProcessConflictPreventer {
    pub fn new(operations: OperationStore) -> Self {
        Self { operations }
    }

    /// Mark `process_id` as lock holder, failing if another in-flight operation holds it
    ///
    /// Entry point for whatever creates operations when a deployment is
    /// triggered; nothing inside the control plane acquires locks itself.
    /// Call it after the operation row exists and before the workflow starts.
    pub async fn acquire_lock(&self, mta_id: &str, space_id: &str, process_id: &str) -> Result<(), ProcessActionError> {
        let holders = self
            .operations
            .create_query()
            .mta_id(mta_id)
            .space_id(space_id)
            .acquired_lock(true)
            .in_non_final_state()
            .list()
            .await?;

        if let Some(holder) = holders.into_iter().find(|o| o.process_id != process_id) {
            return Err(ProcessActionError::ConflictingOperation {
                mta_id: mta_id.to_string(),
                space_id: space_id.to_string(),
                conflicting_process_id: holder.process_id,
            });
        }

        let mut operation = self
            .operations
            .create_query()
            .process_id(process_id)
            .single_result()
            .await?
            .ok_or_else(|| ProcessActionError::OperationNotFound(process_id.to_string()))?;
        operation.acquired_lock = true;
        self.operations.update(&operation).await?;

        tracing::info!(process_id = %process_id, mta_id = %mta_id, space_id = %space_id, "🔒 Operation acquired lock");
        Ok(())
    }

    /// Move the operation to `state`, drop its lock and stamp its end time
    pub async fn release_lock(&self, process_id: &str, state: OperationState) -> Result<(), StoreError> {
        let mut operation = self
            .operations
            .create_query()
            .process_id(process_id)
            .single_result()
            .await?
            .ok_or_else(|| StoreError::not_found("operation", process_id))?;

        operation.state = Some(state);
        operation.acquired_lock = false;
        operation.ended_at = Some(Utc::now());
        self.operations.update(&operation).await?;

        tracing::info!(process_id = %process_id, state = %state, "🔓 Operation released lock");
        Ok(())
    }
}
