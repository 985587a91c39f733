/// Additional process actions
///
/// Plug-ins that run after a core action succeeded. Each one declares the
/// action it belongs to; the registry wires it into that action's chain.

use crate::engine::ProcessEngineFacade;
use crate::persistence::{ProgressMessageStore, ProgressMessageType};
use crate::process::Action;
use async_trait::async_trait;
use serde_json::Value;

/// Process variable holding the phase of the current step
pub const STEP_PHASE_VARIABLE: &str = "stepPhase";
pub const STEP_PHASE_RETRY: &str = "RETRY";

#[async_trait]
pub trait AdditionalProcessAction: Send + Sync {
    fn name(&self) -> &'static str;

    /// Core action this plug-in is attached to
    fn applicable_action(&self) -> Action;

    async fn execute(&self, process_id: &str) -> anyhow::Result<()>;
}

/// Puts every active execution of the process into the retry phase
pub struct SetRetryPhaseAdditionalProcessAction {
    engine: ProcessEngineFacade,
}

impl SetRetryPhaseAdditionalProcessAction {
    pub fn new(engine: ProcessEngineFacade) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl AdditionalProcessAction for SetRetryPhaseAdditionalProcessAction {
    fn name(&self) -> &'static str {
        "set-retry-phase"
    }

    fn applicable_action(&self) -> Action {
        Action::Retry
    }

    async fn execute(&self, process_id: &str) -> anyhow::Result<()> {
        for execution in self.engine.get_active_process_executions(process_id).await? {
            self.engine
                .set_variable(
                    &execution.process_instance_id,
                    STEP_PHASE_VARIABLE,
                    Value::from(STEP_PHASE_RETRY),
                )
                .await?;
        }
        Ok(())
    }
}

/// Drops the error messages left behind by the failed attempt
pub struct DeleteErrorProgressMessagesAdditionalProcessAction {
    progress_messages: ProgressMessageStore,
}

impl DeleteErrorProgressMessagesAdditionalProcessAction {
    pub fn new(progress_messages: ProgressMessageStore) -> Self {
        Self { progress_messages }
    }
}

#[async_trait]
impl AdditionalProcessAction for DeleteErrorProgressMessagesAdditionalProcessAction {
    fn name(&self) -> &'static str {
        "delete-error-progress-messages"
    }

    fn applicable_action(&self) -> Action {
        Action::Retry
    }

    async fn execute(&self, process_id: &str) -> anyhow::Result<()> {
        let deleted = self
            .progress_messages
            .create_query()
            .process_id(process_id)
            .message_type(ProgressMessageType::Error)
            .delete()
            .await?;
        tracing::debug!(process_id = %process_id, "Deleted {} error progress messages", deleted);
        Ok(())
    }
}
