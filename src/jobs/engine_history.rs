/// Finished historic processes cleaner
///
/// Removes engine history of processes that finished and were started
/// before the expiration time. Pages are fetched one after another; the
/// items of a page are deleted concurrently by a small worker pool.

use crate::engine::ProcessEngineFacade;
use crate::jobs::cleaner::{Cleaner, CleanerKind, CleanupPass};
use async_trait::async_trait;
use futures::{stream, StreamExt};
use std::sync::atomic::{AtomicUsize, Ordering};

pub const DEFAULT_PAGE_SIZE: usize = 100;
pub const DEFAULT_WORKER_COUNT: usize = 4;

pub struct FinishedHistoricProcessesCleaner {
    engine: ProcessEngineFacade,
    page_size: usize,
    worker_count: usize,
}

impl FinishedHistoricProcessesCleaner {
    pub fn new(engine: ProcessEngineFacade) -> Self {
        Self {
            engine,
            page_size: DEFAULT_PAGE_SIZE,
            worker_count: DEFAULT_WORKER_COUNT,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count.max(1);
        self
    }
}

#[async_trait]
impl Cleaner for FinishedHistoricProcessesCleaner {
    fn kind(&self) -> CleanerKind {
        CleanerKind::FinishedHistoricProcesses
    }

    async fn execute(&self, pass: &CleanupPass) -> anyhow::Result<()> {
        let expiration_time = pass.expiration_time();
        let deleted = AtomicUsize::new(0);
        // Failed items stay in the result set; skip past them
        let mut offset = 0;

        loop {
            let page = self
                .engine
                .find_finished_historic_processes_started_before(expiration_time, offset, self.page_size)
                .await?;
            let failures = AtomicUsize::new(0);

            stream::iter(&page)
                .for_each_concurrent(self.worker_count, |process| {
                    let deleted = &deleted;
                    let failures = &failures;
                    async move {
                        match self.engine.delete_historic_process_instance(&process.id).await {
                            Ok(()) => {
                                deleted.fetch_add(1, Ordering::Relaxed);
                            }
                            Err(e) => {
                                failures.fetch_add(1, Ordering::Relaxed);
                                tracing::warn!(process_id = %process.id, "⚠️ Deleting historic process failed: {}", e);
                            }
                        }
                    }
                })
                .await;

            if page.len() < self.page_size {
                break;
            }
            offset += failures.load(Ordering::Relaxed);
        }

        tracing::info!(
            "🗑️ Deleted {} finished historic processes",
            deleted.load(Ordering::Relaxed)
        );
        Ok(())
    }
}
