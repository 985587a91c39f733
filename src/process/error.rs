/// Process action errors

use crate::engine::EngineError;
use crate::persistence::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProcessActionError {
    /// The workflow engine no longer knows the process
    #[error("process {0} no longer exists in the workflow engine")]
    ProcessNotFound(String),

    #[error("operation {0} not found")]
    OperationNotFound(String),

    #[error("unsupported action: {0}")]
    UnsupportedAction(String),

    /// Another in-flight operation holds the lock for the same mta and space
    #[error("operation {conflicting_process_id} already holds the lock for mta {mta_id} in space {space_id}")]
    ConflictingOperation {
        mta_id: String,
        space_id: String,
        conflicting_process_id: String,
    },

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ProcessActionError {
    pub fn is_process_not_found(&self) -> bool {
        matches!(self, ProcessActionError::ProcessNotFound(_))
    }
}
