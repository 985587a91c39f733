/// MTA control plane
///
/// Tracks long-running deployment operations, lets operators start, resume,
/// retry and abort them, coordinates workflow engine lock ownership across
/// service instances, and periodically prunes expired and orphaned state.

// Core configuration and setup
pub mod config;

// Persistence layer - SQLite stores for operations, events, lock owners and configuration data
pub mod persistence;

// Workflow engine surface - raw engine trait, facade and embedded engine
pub mod engine;

// Platform client - space existence lookups
pub mod platform;

pub mod audit;
pub mod telemetry;

// Process actions - start/resume/retry/abort with additional action chains
pub mod process;

// Lock owner heartbeat and reclaim
pub mod lock;

// Cleanup engine - cleaners and the scheduled cleanup job
pub mod jobs;

// Background scheduling of periodic jobs
pub mod runtime;

// Server setup and initialization
pub mod server;

// Re-export commonly used types for external consumers
pub use jobs::{CleanUpJob, Cleaner, CleanerKind, CleanupPass};
pub use persistence::{Operation, OperationState};
pub use process::{Action, ProcessAction, ProcessActionRegistry};
pub use server::start_server;
