/// Cleaner contract and the per-run pass token

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::{
    collections::HashSet,
    fmt,
    sync::{Mutex, PoisonError},
};
use uuid::Uuid;

/// Every cleaner the cleanup job knows about
///
/// Declaration order is execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CleanerKind {
    Operations,
    ProgressMessages,
    HistoricOperationEvents,
    Files,
    FinishedHistoricProcesses,
    AccessTokens,
    SecretTokens,
    OrphanedConfigurationEntries,
    OrphanedConfigurationSubscriptions,
    OrphanedOperations,
    OrphanedFiles,
}

impl CleanerKind {
    pub fn name(&self) -> &'static str {
        match self {
            CleanerKind::Operations => "operations",
            CleanerKind::ProgressMessages => "progress-messages",
            CleanerKind::HistoricOperationEvents => "historic-operation-events",
            CleanerKind::Files => "files",
            CleanerKind::FinishedHistoricProcesses => "finished-historic-processes",
            CleanerKind::AccessTokens => "access-tokens",
            CleanerKind::SecretTokens => "secret-tokens",
            CleanerKind::OrphanedConfigurationEntries => "orphaned-configuration-entries",
            CleanerKind::OrphanedConfigurationSubscriptions => "orphaned-configuration-subscriptions",
            CleanerKind::OrphanedOperations => "orphaned-operations",
            CleanerKind::OrphanedFiles => "orphaned-files",
        }
    }
}

impl fmt::Display for CleanerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One cleanup run
///
/// Carries the expiration time shared by all cleaners and the instant the run
/// started, and remembers which run-once cleaners already did their work
/// during this run.
#[derive(Debug)]
pub struct CleanupPass {
    id: Uuid,
    started_at: DateTime<Utc>,
    expiration_time: DateTime<Utc>,
    executed: Mutex<HashSet<CleanerKind>>,
}

impl CleanupPass {
    pub fn new(expiration_time: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            expiration_time,
            executed: Mutex::new(HashSet::new()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Anything closed at or after this instant was closed by this run
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn expiration_time(&self) -> DateTime<Utc> {
        self.expiration_time
    }

    /// Record that `kind` ran; false if it already ran during this pass
    pub fn mark_executed(&self, kind: CleanerKind) -> bool {
        self.executed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(kind)
    }

    pub fn was_executed(&self, kind: CleanerKind) -> bool {
        self.executed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&kind)
    }
}

#[async_trait]
pub trait Cleaner: Send + Sync {
    fn kind(&self) -> CleanerKind;

    /// Remove data that expired before `pass.expiration_time()`
    ///
    /// Must be idempotent. Per-item failures are handled inside; a returned
    /// error means the cleaner as a whole failed.
    async fn execute(&self, pass: &CleanupPass) -> anyhow::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pass_records_each_kind_once() {
        let pass = CleanupPass::new(Utc::now());

        assert!(pass.mark_executed(CleanerKind::OrphanedConfigurationEntries));
        assert!(!pass.mark_executed(CleanerKind::OrphanedConfigurationEntries));
        assert!(pass.was_executed(CleanerKind::OrphanedConfigurationEntries));
        assert!(!pass.was_executed(CleanerKind::Files));
    }

    #[test]
    fn kinds_sort_in_priority_order() {
        let mut kinds = vec![
            CleanerKind::OrphanedFiles,
            CleanerKind::SecretTokens,
            CleanerKind::AccessTokens,
            CleanerKind::Operations,
            CleanerKind::OrphanedConfigurationSubscriptions,
            CleanerKind::ProgressMessages,
            CleanerKind::OrphanedOperations,
        ];
        kinds.sort();
        assert_eq!(
            kinds,
            vec![
                CleanerKind::Operations,
                CleanerKind::ProgressMessages,
                CleanerKind::AccessTokens,
                CleanerKind::SecretTokens,
                CleanerKind::OrphanedConfigurationSubscriptions,
                CleanerKind::OrphanedOperations,
                CleanerKind::OrphanedFiles,
            ]
        );
        assert_eq!(CleanerKind::OrphanedOperations.to_string(), "orphaned-operations");
    }
}
