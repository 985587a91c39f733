/// Action taxonomy and the `ProcessAction` executor

use crate::persistence::OperationState;
use crate::process::{
    abort, additional::AdditionalProcessAction, resume, retry, start, ActionServices, ProcessActionError,
};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr, sync::Arc};

/// Operator action on an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Start,
    Resume,
    Retry,
    Abort,
}

impl Action {
    pub const ALL: [Action; 4] = [Action::Start, Action::Resume, Action::Retry, Action::Abort];

    pub fn action_id(&self) -> &'static str {
        match self {
            Action::Start => "start",
            Action::Resume => "resume",
            Action::Retry => "retry",
            Action::Abort => "abort",
        }
    }

    /// Actions an operator may invoke on an operation in `state`
    pub fn available_for(state: OperationState) -> Vec<Action> {
        match state {
            OperationState::Finished | OperationState::Aborted => Vec::new(),
            OperationState::Error => vec![Action::Abort, Action::Retry],
            OperationState::Running => vec![Action::Abort],
            OperationState::ActionRequired => vec![Action::Abort, Action::Resume],
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.action_id())
    }
}

impl FromStr for Action {
    type Err = ProcessActionError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|action| action.action_id().eq_ignore_ascii_case(value))
            .ok_or_else(|| ProcessActionError::UnsupportedAction(value.to_string()))
    }
}

/// A core action followed by its chain of additional actions
#[derive(Clone)]
pub struct ProcessAction {
    action: Action,
    services: Arc<ActionServices>,
    additional_actions: Vec<Arc<dyn AdditionalProcessAction>>,
}

impl ProcessAction {
    pub fn new(
        action: Action,
        services: Arc<ActionServices>,
        additional_actions: Vec<Arc<dyn AdditionalProcessAction>>,
    ) -> Self {
        Self {
            action,
            services,
            additional_actions,
        }
    }

    pub fn action(&self) -> Action {
        self.action
    }

    /// Run the core action, then every additional action in order
    ///
    /// Core failures propagate. Additional actions are best effort: their
    /// failures are logged and never undo or fail the core action.
    pub async fn execute(&self, user: Option<&str>, process_id: &str) -> Result<(), ProcessActionError> {
        tracing::info!(process_id = %process_id, action = %self.action, "⚙️ Executing process action");

        match self.action {
            Action::Start => start::execute(&self.services, user, process_id).await?,
            Action::Resume => resume::execute(&self.services, user, process_id).await?,
            Action::Retry => retry::execute(&self.services, process_id).await?,
            Action::Abort => abort::execute(&self.services, process_id).await?,
        }

        for additional_action in &self.additional_actions {
            if let Err(e) = additional_action.execute(process_id).await {
                tracing::warn!(
                    process_id = %process_id,
                    additional_action = additional_action.name(),
                    "⚠️ Additional process action failed: {:#}",
                    e
                );
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_action_ids_case_insensitively() {
        assert_eq!("abort".parse::<Action>().unwrap(), Action::Abort);
        assert_eq!("RESUME".parse::<Action>().unwrap(), Action::Resume);
        assert!(matches!(
            "pause".parse::<Action>(),
            Err(ProcessActionError::UnsupportedAction(_))
        ));
    }

    #[test]
    fn available_actions_follow_operation_state() {
        assert!(Action::available_for(OperationState::Finished).is_empty());
        assert_eq!(
            Action::available_for(OperationState::Error),
            vec![Action::Abort, Action::Retry]
        );
        assert_eq!(
            Action::available_for(OperationState::ActionRequired),
            vec![Action::Abort, Action::Resume]
        );
    }
}
