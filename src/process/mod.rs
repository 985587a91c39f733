/// Process Actions
///
/// Operator actions on operations (start, resume, retry, abort). Each action
/// drives the workflow engine, records a historic event and then runs its
/// chain of additional actions. Callers resolve actions through
/// `ProcessActionRegistry`.

use crate::engine::ProcessEngineFacade;
use crate::persistence::{OperationStore, ProgressMessageStore};
use crate::telemetry::OperationMetrics;
use serde_json::Value;
use std::{collections::HashMap, sync::Arc};

// Action taxonomy and executor
pub mod action;

// Plug-ins run after a core action
pub mod additional;

// Lock flag bookkeeping on operations
pub mod conflict;

pub mod error;
pub mod events;
pub mod registry;

mod abort;
mod resume;
mod retry;
mod start;

pub use abort::ABORT_DELETE_REASON;
pub use action::{Action, ProcessAction};
pub use additional::{
    AdditionalProcessAction, DeleteErrorProgressMessagesAdditionalProcessAction,
    SetRetryPhaseAdditionalProcessAction, STEP_PHASE_RETRY, STEP_PHASE_VARIABLE,
};
pub use conflict::ProcessConflictPreventer;
pub use error::ProcessActionError;
pub use events::HistoricOperationEventPersister;
pub use registry::ProcessActionRegistry;

/// Process variable carrying the user who triggered an execution
pub const USER_VARIABLE: &str = "user";

/// Collaborators shared by all core actions
#[derive(Clone)]
pub struct ActionServices {
    pub engine: ProcessEngineFacade,
    pub operations: OperationStore,
    pub events: HistoricOperationEventPersister,
    pub progress_messages: ProgressMessageStore,
    pub conflict_preventer: ProcessConflictPreventer,
    pub metrics: Arc<dyn OperationMetrics>,
}

pub(crate) fn user_variables(user: Option<&str>) -> HashMap<String, Value> {
    let user = user.map(Value::from).unwrap_or(Value::Null);
    HashMap::from([(USER_VARIABLE.to_string(), user)])
}
