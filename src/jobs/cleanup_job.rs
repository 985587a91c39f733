/// Scheduled cleanup job
///
/// Runs every registered cleaner once per tick, in `CleanerKind` order, on
/// the designated instance only. There is no election: if instance 0 is
/// down, cleanup waits until it is back.

use crate::jobs::cleaner::{Cleaner, CleanerKind, CleanupPass};
use chrono::{Duration, Utc};
use futures::FutureExt;
use std::{any::Any, collections::BTreeMap, panic::AssertUnwindSafe, sync::Arc};

/// Index of the instance that runs cleanup
pub const DESIGNATED_INSTANCE_INDEX: u32 = 0;

pub struct CleanUpJob {
    instance_index: u32,
    max_ttl_for_old_data: Duration,
    cleaners: BTreeMap<CleanerKind, Arc<dyn Cleaner>>,
}

impl CleanUpJob {
    /// Cleaners are keyed by kind; a later cleaner of the same kind replaces an earlier one
    pub fn new(instance_index: u32, max_ttl_for_old_data: Duration, cleaners: Vec<Arc<dyn Cleaner>>) -> Self {
        let cleaners = cleaners
            .into_iter()
            .map(|cleaner| (cleaner.kind(), cleaner))
            .collect();

        Self {
            instance_index,
            max_ttl_for_old_data,
            cleaners,
        }
    }

    pub fn cleaner_kinds(&self) -> Vec<CleanerKind> {
        self.cleaners.keys().copied().collect()
    }

    /// One scheduled tick; returns the pass that ran, if this instance is the designated one
    pub async fn run(&self) -> Option<CleanupPass> {
        if self.instance_index != DESIGNATED_INSTANCE_INDEX {
            tracing::debug!(
                "Skipping cleanup on instance {} (designated instance is {})",
                self.instance_index,
                DESIGNATED_INSTANCE_INDEX
            );
            return None;
        }

        let pass = CleanupPass::new(Utc::now() - self.max_ttl_for_old_data);
        self.execute_pass(&pass).await;
        Some(pass)
    }

    /// Run every cleaner against `pass`, isolating failures and panics of each one
    pub async fn execute_pass(&self, pass: &CleanupPass) {
        tracing::info!(
            pass_id = %pass.id(),
            "🧹 Starting cleanup of data older than {}",
            pass.expiration_time()
        );

        for (kind, cleaner) in &self.cleaners {
            execute_safely(*kind, cleaner.as_ref(), pass).await;
        }

        tracing::info!(pass_id = %pass.id(), "✅ Cleanup finished");
    }
}

async fn execute_safely(kind: CleanerKind, cleaner: &dyn Cleaner, pass: &CleanupPass) {
    tracing::debug!(cleaner = %kind, "Executing cleaner");

    match AssertUnwindSafe(cleaner.execute(pass)).catch_unwind().await {
        Ok(Ok(())) => tracing::debug!(cleaner = %kind, "Cleaner finished"),
        Ok(Err(e)) => tracing::error!(cleaner = %kind, "❌ Cleaner failed: {:#}", e),
        Err(panic) => tracing::error!(cleaner = %kind, "❌ Cleaner panicked: {}", panic_message(panic.as_ref())),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct RecordingCleaner {
        kind: CleanerKind,
        calls: Arc<Mutex<Vec<CleanerKind>>>,
    }

    #[async_trait]
    impl Cleaner for RecordingCleaner {
        fn kind(&self) -> CleanerKind {
            self.kind
        }

        async fn execute(&self, _pass: &CleanupPass) -> anyhow::Result<()> {
            self.calls.lock().unwrap().push(self.kind);
            Ok(())
        }
    }

    fn recording(kind: CleanerKind, calls: &Arc<Mutex<Vec<CleanerKind>>>) -> Arc<dyn Cleaner> {
        Arc::new(RecordingCleaner {
            kind,
            calls: calls.clone(),
        })
    }

    #[tokio::test]
    async fn cleaners_run_in_priority_order_regardless_of_registration_order() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let job = CleanUpJob::new(
            0,
            Duration::days(5),
            vec![
                recording(CleanerKind::OrphanedConfigurationEntries, &calls),
                recording(CleanerKind::Files, &calls),
                recording(CleanerKind::Operations, &calls),
            ],
        );

        assert!(job.run().await.is_some());

        assert_eq!(
            *calls.lock().unwrap(),
            vec![
                CleanerKind::Operations,
                CleanerKind::Files,
                CleanerKind::OrphanedConfigurationEntries,
            ]
        );
    }

    #[tokio::test]
    async fn non_designated_instance_does_nothing() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let job = CleanUpJob::new(1, Duration::days(5), vec![recording(CleanerKind::Operations, &calls)]);

        assert!(job.run().await.is_none());
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn expiration_is_now_minus_ttl() {
        let job = CleanUpJob::new(0, Duration::days(5), Vec::new());
        let before = Utc::now() - Duration::days(5);

        let pass = job.run().await.unwrap();

        assert!(pass.expiration_time() >= before);
        assert!(pass.expiration_time() <= Utc::now() - Duration::days(5));
    }
}
