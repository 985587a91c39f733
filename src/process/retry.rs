/// Retry: move dead-letter jobs of the whole process hierarchy back to executable

use crate::persistence::EventType;
use crate::process::{ActionServices, ProcessActionError};

pub(crate) async fn execute(services: &ActionServices, process_id: &str) -> Result<(), ProcessActionError> {
    let mut process_ids = vec![process_id.to_string()];
    process_ids.extend(services.engine.get_active_historic_sub_process_ids(process_id).await?);

    // Innermost sub-processes first, root last
    for id in process_ids.iter().rev() {
        if let Err(e) = services.engine.execute_job(id).await {
            tracing::warn!(process_id = %id, "⚠️ Retrying dead letter jobs failed: {}", e);
        }
    }

    services.events.add(process_id, EventType::Retried).await?;
    Ok(())
}
