/// Action registry
///
/// Built once at startup: one `ProcessAction` per `Action`, each carrying the
/// additional actions that declared it as their target.

use crate::process::{
    additional::AdditionalProcessAction, Action, ActionServices, ProcessAction, ProcessActionError,
};
use std::{collections::HashMap, sync::Arc};

pub struct ProcessActionRegistry {
    actions: HashMap<Action, ProcessAction>,
}

impl ProcessActionRegistry {
    pub fn new(services: Arc<ActionServices>, additional_actions: Vec<Arc<dyn AdditionalProcessAction>>) -> Self {
        let actions = Action::ALL
            .into_iter()
            .map(|action| {
                let chain = additional_actions
                    .iter()
                    .filter(|additional| additional.applicable_action() == action)
                    .cloned()
                    .collect();
                (action, ProcessAction::new(action, services.clone(), chain))
            })
            .collect();

        Self { actions }
    }

    pub fn get_action(&self, action: Action) -> Result<&ProcessAction, ProcessActionError> {
        self.actions
            .get(&action)
            .ok_or_else(|| ProcessActionError::UnsupportedAction(action.to_string()))
    }

    /// Resolve an action by its id, e.g. "abort"
    pub fn get_action_by_id(&self, action_id: &str) -> Result<&ProcessAction, ProcessActionError> {
        self.get_action(action_id.parse()?)
    }
}
