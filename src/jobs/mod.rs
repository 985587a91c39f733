/// Cleanup Engine
///
/// `CleanUpJob` runs the registered cleaners on every scheduled tick:
/// - `OperationsCleaner`: abort expired in-flight operations, delete expired final ones
/// - age-based cleaners for progress messages, events, files, tokens, engine history
/// - `OrphanedDataCleaner`: configuration rows, operations and files of spaces the platform deleted

// Cleaner contract, kinds and the pass token
pub mod cleaner;

// Scheduled orchestrator
pub mod cleanup_job;

pub mod engine_history;
pub mod files;
pub mod historic_events;
pub mod operations;
pub mod orphaned;
pub mod progress_messages;
pub mod tokens;

pub use cleaner::{Cleaner, CleanerKind, CleanupPass};
pub use cleanup_job::CleanUpJob;
pub use engine_history::FinishedHistoricProcessesCleaner;
pub use files::FilesCleaner;
pub use historic_events::HistoricOperationEventsCleaner;
pub use operations::OperationsCleaner;
pub use orphaned::{
    ConfigurationEntrySource, ConfigurationSubscriptionSource, FileEntrySource, OperationSource,
    OrphanedConfigurationEntriesCleaner, OrphanedConfigurationSubscriptionsCleaner, OrphanedDataCleaner,
    OrphanedDataSource, OrphanedFilesCleaner, OrphanedOperationsCleaner,
};
pub use progress_messages::ProgressMessagesCleaner;
pub use tokens::{AccessTokensCleaner, SecretTokensCleaner};
