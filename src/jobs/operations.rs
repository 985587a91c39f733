/// Operations cleaner
///
/// Two phases, strictly in order:
/// 1. abort every in-flight operation started before the expiration time
/// 2. delete operations started before the expiration time that are final
///    and did not end during this pass
///
/// Operations closed by phase 1 carry an end time at or after the pass start,
/// so they are left for the next pass and never aborted and deleted by the
/// same run.

use crate::jobs::cleaner::{Cleaner, CleanerKind, CleanupPass};
use crate::persistence::{Operation, OperationState, OperationStore, OrderDirection};
use crate::process::{Action, ProcessActionRegistry, ProcessConflictPreventer};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

pub const DEFAULT_PAGE_SIZE: usize = 100;

pub struct OperationsCleaner {
    operations: OperationStore,
    actions: Arc<ProcessActionRegistry>,
    conflict_preventer: ProcessConflictPreventer,
    page_size: usize,
}

impl OperationsCleaner {
    pub fn new(
        operations: OperationStore,
        actions: Arc<ProcessActionRegistry>,
        conflict_preventer: ProcessConflictPreventer,
    ) -> Self {
        Self {
            operations,
            actions,
            conflict_preventer,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Abort in-flight operations page by page; returns how many were closed
    ///
    /// Offset paging is not stable against operations inserted or deleted
    /// concurrently; such rows may be skipped or seen twice and are picked
    /// up by a later pass.
    async fn abort_in_flight_operations(&self, expiration_time: DateTime<Utc>) -> anyhow::Result<usize> {
        let mut closed = 0;
        let mut page_index = 0;

        loop {
            let page = self
                .operations
                .create_query()
                .started_before(expiration_time)
                .order_by_process_id(OrderDirection::Ascending)
                .offset_on_select((page_index * self.page_size) as i64)
                .limit_on_select(self.page_size as i64)
                .list()
                .await?;

            for operation in page.iter().filter(|o| !o.is_in_final_state()) {
                if self.abort_safely(operation).await {
                    closed += 1;
                }
            }

            if page.len() < self.page_size {
                break;
            }
            page_index += 1;
        }

        Ok(closed)
    }

    /// Abort one operation; true if it ended up closed
    async fn abort_safely(&self, operation: &Operation) -> bool {
        let process_id = operation.process_id.as_str();
        tracing::info!(process_id = %process_id, "🛑 Aborting expired operation");

        let abort = match self.actions.get_action(Action::Abort) {
            Ok(action) => action,
            Err(e) => {
                tracing::error!(process_id = %process_id, "❌ Abort action unavailable: {}", e);
                return false;
            }
        };

        match abort.execute(None, process_id).await {
            Ok(()) => true,
            Err(e) if e.is_process_not_found() => {
                // The engine already dropped the process; close the record locally
                match self.conflict_preventer.release_lock(process_id, OperationState::Aborted).await {
                    Ok(()) => true,
                    Err(e) => {
                        tracing::warn!(process_id = %process_id, "⚠️ Could not mark operation as aborted: {}", e);
                        false
                    }
                }
            }
            Err(e) => {
                tracing::warn!(process_id = %process_id, "⚠️ Could not abort operation, will retry next pass: {}", e);
                false
            }
        }
    }
}

#[async_trait]
impl Cleaner for OperationsCleaner {
    fn kind(&self) -> CleanerKind {
        CleanerKind::Operations
    }

    async fn execute(&self, pass: &CleanupPass) -> anyhow::Result<()> {
        let expiration_time = pass.expiration_time();

        let closed = self.abort_in_flight_operations(expiration_time).await?;
        tracing::info!("Aborted {} expired operations", closed);

        let deleted = self
            .operations
            .create_query()
            .started_before(expiration_time)
            .in_final_state()
            .ended_before_or_open(pass.started_at())
            .delete()
            .await?;
        tracing::info!("🗑️ Deleted {} expired operations", deleted);

        Ok(())
    }
}
