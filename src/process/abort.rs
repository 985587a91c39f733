/// Abort: delete the process in the engine and close the operation

use crate::persistence::{EventType, OperationState, OrderDirection, ProgressMessageType};
use crate::process::{ActionServices, ProcessActionError};
use crate::telemetry::FailedOperationEvent;

/// Delete reason recorded by the engine for aborted processes
pub const ABORT_DELETE_REASON: &str = "ABORTED";

pub(crate) async fn execute(services: &ActionServices, process_id: &str) -> Result<(), ProcessActionError> {
    services.events.add(process_id, EventType::Aborted).await?;

    services
        .engine
        .delete_process_instance(process_id, ABORT_DELETE_REASON)
        .await
        .map_err(|e| {
            if e.is_not_found() {
                ProcessActionError::ProcessNotFound(process_id.to_string())
            } else {
                ProcessActionError::Engine(e)
            }
        })?;

    services
        .conflict_preventer
        .release_lock(process_id, OperationState::Aborted)
        .await?;
    services.events.add(process_id, EventType::AbortExecuted).await?;

    publish_failure_if_errored(services, process_id).await?;

    tracing::info!(process_id = %process_id, "🛑 Operation aborted");
    Ok(())
}

async fn publish_failure_if_errored(services: &ActionServices, process_id: &str) -> Result<(), ProcessActionError> {
    let latest_message = services
        .progress_messages
        .create_query()
        .process_id(process_id)
        .order_by_timestamp(OrderDirection::Descending)
        .limit_on_select(1)
        .single_result()
        .await?;

    let errored = latest_message.is_some_and(|message| message.message_type == ProgressMessageType::Error);
    if !errored {
        return Ok(());
    }

    let operation = services
        .operations
        .create_query()
        .process_id(process_id)
        .single_result()
        .await?
        .ok_or_else(|| ProcessActionError::OperationNotFound(process_id.to_string()))?;

    services.metrics.publish_failed_operation(&FailedOperationEvent {
        mta_id: operation.mta_id,
        space_id: operation.space_id,
        process_type: operation.process_type,
    });
    Ok(())
}
