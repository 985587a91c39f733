/// Resume: trigger the root process and active sub-processes waiting at a receive task

use crate::process::{user_variables, ActionServices, ProcessActionError};

pub(crate) async fn execute(
    services: &ActionServices,
    user: Option<&str>,
    process_id: &str,
) -> Result<(), ProcessActionError> {
    let mut process_ids = vec![process_id.to_string()];
    process_ids.extend(services.engine.get_active_historic_sub_process_ids(process_id).await?);

    let variables = user_variables(user);
    for id in &process_ids {
        if !services.engine.is_process_instance_at_receive_task(id).await? {
            continue;
        }
        // Execution ids change as nested sub-processes advance, so query again right before triggering
        for execution in services.engine.find_executions_at_receive_task(id).await? {
            tracing::debug!(process_id = %id, execution_id = %execution.id, "⏯️ Resuming execution");
            services.engine.trigger(&execution.id, &variables).await?;
        }
    }
    Ok(())
}
