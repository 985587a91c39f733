/// Start: release a freshly created process from its initial wait state

use crate::persistence::{EventType, OperationState};
use crate::process::{user_variables, ActionServices, ProcessActionError};

pub(crate) async fn execute(
    services: &ActionServices,
    user: Option<&str>,
    process_id: &str,
) -> Result<(), ProcessActionError> {
    let mut operation = services
        .operations
        .create_query()
        .process_id(process_id)
        .single_result()
        .await?
        .ok_or_else(|| ProcessActionError::OperationNotFound(process_id.to_string()))?;

    let variables = user_variables(user);
    for execution in services.engine.find_executions_at_receive_task(process_id).await? {
        tracing::debug!(process_id = %process_id, execution_id = %execution.id, "▶️ Triggering execution");
        services.engine.trigger(&execution.id, &variables).await?;
    }

    operation.state = Some(OperationState::Running);
    services.operations.update(&operation).await?;
    services.events.add(process_id, EventType::Started).await?;
    Ok(())
}
