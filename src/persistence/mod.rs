/// Persistence Layer
///
/// SQLite-backed stores for everything the control plane tracks:
/// - Operations and their historic lifecycle events
/// - Lock owner heartbeats shared by all service instances
/// - Progress messages, files, access tokens, secret tokens
/// - Configuration entries/subscriptions (pruned when their space disappears)
///
/// Every store hands out builder-style queries with `list()`,
/// `single_result()` and `delete()` terminal operations.

// Pool creation and schema bootstrap
pub mod database;

// Store error taxonomy
pub mod error;

// Shared criteria rendering for builder-style queries
pub mod query;

pub mod access_token;
pub mod configuration;
pub mod file;
pub mod historic_event;
pub mod lock_owner;
pub mod operation;
pub mod progress_message;
pub mod secret_token;

pub use access_token::{AccessToken, AccessTokenQuery, AccessTokenStore};
pub use configuration::{
    AuditableConfiguration, ConfigurationEntry, ConfigurationIdentifier, ConfigurationEntryQuery, ConfigurationEntryStore,
    ConfigurationSubscription, ConfigurationSubscriptionQuery, ConfigurationSubscriptionStore,
};
pub use database::Database;
pub use error::{Result, StoreError};
pub use file::{FileEntry, FileEntryQuery, FileEntryStore};
pub use historic_event::{
    EventType, HistoricOperationEvent, HistoricOperationEventQuery, HistoricOperationEventStore,
};
pub use lock_owner::{LockOwnerEntry, LockOwnerQuery, LockOwnerStore};
pub use operation::{Operation, OperationQuery, OperationState, OperationStore, ProcessType};
pub use progress_message::{
    ProgressMessage, ProgressMessageQuery, ProgressMessageStore, ProgressMessageType,
};
pub use query::OrderDirection;
pub use secret_token::{SecretToken, SecretTokenQuery, SecretTokenStore};
