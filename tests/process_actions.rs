mod common;

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use common::{days_ago, Harness};
use mta_control::{
    engine::EngineError,
    persistence::{EventType, OperationState, OrderDirection, ProcessType, ProgressMessage, ProgressMessageType},
    process::{
        Action, AdditionalProcessAction, ProcessActionError, ABORT_DELETE_REASON, STEP_PHASE_RETRY,
        STEP_PHASE_VARIABLE, USER_VARIABLE,
    },
    telemetry::FailedOperationEvent,
};
use serde_json::Value;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

async fn event_types(harness: &Harness, process_id: &str) -> Vec<EventType> {
    let mut events = harness
        .events
        .create_query()
        .process_id(process_id)
        .order_by_timestamp(OrderDirection::Ascending)
        .list()
        .await
        .unwrap();
    // Events of one action may share a millisecond; insertion order breaks ties
    events.sort_by_key(|event| (event.timestamp, event.id));
    events.into_iter().map(|event| event.event_type).collect()
}

#[tokio::test]
async fn start_triggers_waiting_executions_and_marks_operation_running() {
    let harness = Harness::new().await;
    harness.add_running_operation("p-1", Utc::now()).await;
    harness
        .engine
        .add_execution("p-1", "e-wait", "p-1", Some("startWait"), Some("receiveTask"));
    harness
        .engine
        .add_execution("p-1", "e-task", "p-1", Some("prepare"), Some("serviceTask"));

    let start = harness.actions.get_action(Action::Start).unwrap();
    start.execute(Some("alice"), "p-1").await.unwrap();

    let triggered = harness.engine.triggered_executions();
    assert_eq!(triggered.len(), 1);
    assert_eq!(triggered[0].0, "e-wait");
    assert_eq!(triggered[0].1.get(USER_VARIABLE), Some(&Value::from("alice")));

    let operation = harness.operation("p-1").await.unwrap();
    assert_eq!(operation.state, Some(OperationState::Running));
    assert_eq!(event_types(&harness, "p-1").await, vec![EventType::Started]);
}

#[tokio::test]
async fn start_without_operation_fails() {
    let harness = Harness::new().await;
    harness.engine.add_process("p-1", "deploy");

    let result = harness.actions.get_action(Action::Start).unwrap().execute(None, "p-1").await;

    assert!(matches!(result, Err(ProcessActionError::OperationNotFound(id)) if id == "p-1"));
    assert!(event_types(&harness, "p-1").await.is_empty());
}

#[tokio::test]
async fn resume_triggers_root_and_active_sub_processes() {
    let harness = Harness::new().await;
    let started = Utc::now() - Duration::minutes(5);
    harness.add_running_operation("root", started).await;
    harness.engine.add_historic_process("root", "root", started, None);
    harness.engine.add_historic_process("sub-active", "root", started, None);
    harness
        .engine
        .add_historic_process("sub-ended", "root", started, Some(Utc::now()));

    harness
        .engine
        .add_execution("root", "e-root", "root", Some("approve"), Some("receiveTask"));
    harness
        .engine
        .add_execution("sub-active", "e-sub", "sub-active", Some("approve"), Some("receiveTask"));
    harness
        .engine
        .add_execution("sub-ended", "e-ended", "sub-ended", Some("approve"), Some("receiveTask"));

    let resume = harness.actions.get_action_by_id("resume").unwrap();
    resume.execute(Some("bob"), "root").await.unwrap();

    let mut triggered: Vec<String> = harness
        .engine
        .triggered_executions()
        .into_iter()
        .map(|(execution_id, _)| execution_id)
        .collect();
    triggered.sort();
    assert_eq!(triggered, vec!["e-root", "e-sub"]);
    assert!(event_types(&harness, "root").await.is_empty());
}

#[tokio::test]
async fn retry_moves_dead_letter_jobs_and_runs_additional_actions() {
    let harness = Harness::new().await;
    let started = Utc::now() - Duration::minutes(5);
    harness.add_running_operation("root", started).await;
    harness.engine.add_historic_process("sub", "root", started, None);
    harness
        .engine
        .add_execution("root", "e-root", "root", Some("deployApp"), Some("serviceTask"));
    harness
        .engine
        .add_execution("sub", "e-sub", "sub", Some("stageApp"), Some("serviceTask"));
    harness.engine.add_dead_letter_job("job-root", "root", "e-root");
    harness.engine.add_dead_letter_job("job-sub", "sub", "e-sub");
    // The root job keeps failing; the sub-process job must still be retried
    harness
        .engine
        .fail_job_moves("job-root", EngineError::Failure("engine unavailable".to_string()));

    harness
        .progress_messages
        .add(&ProgressMessage::new("root", "deployApp", ProgressMessageType::Error, "boom", Utc::now()))
        .await
        .unwrap();
    harness
        .progress_messages
        .add(&ProgressMessage::new("root", "deployApp", ProgressMessageType::Info, "staging", Utc::now()))
        .await
        .unwrap();

    let retry = harness.actions.get_action(Action::Retry).unwrap();
    retry.execute(Some("alice"), "root").await.unwrap();

    assert_eq!(harness.engine.moved_jobs(), vec![("job-sub".to_string(), 0)]);
    assert_eq!(event_types(&harness, "root").await, vec![EventType::Retried]);
    assert_eq!(
        harness.engine.variable("root", STEP_PHASE_VARIABLE),
        Some(Value::from(STEP_PHASE_RETRY))
    );

    let remaining = harness
        .progress_messages
        .create_query()
        .process_id("root")
        .list()
        .await
        .unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].message_type, ProgressMessageType::Info);
}

#[tokio::test]
async fn abort_closes_operation_and_records_events_in_order() {
    let harness = Harness::new().await;
    harness.add_running_operation("p-1", days_ago(1)).await;

    let abort = harness.actions.get_action(Action::Abort).unwrap();
    abort.execute(Some("alice"), "p-1").await.unwrap();

    assert_eq!(
        harness.engine.deleted_processes(),
        vec![("p-1".to_string(), ABORT_DELETE_REASON.to_string())]
    );
    assert_eq!(
        event_types(&harness, "p-1").await,
        vec![EventType::Aborted, EventType::AbortExecuted]
    );

    let operation = harness.operation("p-1").await.unwrap();
    assert_eq!(operation.state, Some(OperationState::Aborted));
    assert!(!operation.acquired_lock);
    assert!(operation.ended_at.is_some());
    assert!(harness.metrics.events().is_empty());
}

#[tokio::test]
async fn abort_retries_optimistic_locking_conflicts() {
    let harness = Harness::new().await;
    harness.add_running_operation("p-1", days_ago(1)).await;
    harness.engine.fail_next_deletions(vec![
        EngineError::OptimisticLocking("p-1".to_string()),
        EngineError::OptimisticLocking("p-1".to_string()),
    ]);

    harness
        .actions
        .get_action(Action::Abort)
        .unwrap()
        .execute(None, "p-1")
        .await
        .unwrap();

    assert_eq!(harness.engine.deleted_processes().len(), 1);
    let operation = harness.operation("p-1").await.unwrap();
    assert_eq!(operation.state, Some(OperationState::Aborted));
}

#[tokio::test]
async fn abort_publishes_failure_when_latest_message_is_an_error() {
    let harness = Harness::new().await;
    harness.engine.add_process("p-1", "deploy");
    let operation = mta_control::Operation::new("p-1", "space-1", days_ago(1))
        .with_mta_id("mta-1")
        .with_process_type(ProcessType::Deploy)
        .with_acquired_lock(true);
    harness.operations.add(&operation).await.unwrap();

    let now = Utc::now();
    harness
        .progress_messages
        .add(&ProgressMessage::new(
            "p-1",
            "stage",
            ProgressMessageType::Info,
            "staging",
            now - Duration::seconds(10),
        ))
        .await
        .unwrap();
    harness
        .progress_messages
        .add(&ProgressMessage::new("p-1", "stage", ProgressMessageType::Error, "failed", now))
        .await
        .unwrap();

    harness
        .actions
        .get_action(Action::Abort)
        .unwrap()
        .execute(None, "p-1")
        .await
        .unwrap();

    assert_eq!(
        harness.metrics.events(),
        vec![FailedOperationEvent {
            mta_id: Some("mta-1".to_string()),
            space_id: "space-1".to_string(),
            process_type: Some(ProcessType::Deploy),
        }]
    );
}

#[tokio::test]
async fn abort_of_vanished_process_reports_process_not_found() {
    let harness = Harness::new().await;
    harness.add_operation("gone", days_ago(1), None).await;

    let result = harness
        .actions
        .get_action(Action::Abort)
        .unwrap()
        .execute(None, "gone")
        .await;

    assert!(matches!(result, Err(ref e) if e.is_process_not_found()));
    let operation = harness.operation("gone").await.unwrap();
    assert_eq!(operation.state, None);
    assert!(operation.acquired_lock);
}

struct FailingAction;

#[async_trait]
impl AdditionalProcessAction for FailingAction {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn applicable_action(&self) -> Action {
        Action::Abort
    }

    async fn execute(&self, _process_id: &str) -> anyhow::Result<()> {
        Err(anyhow!("side effect failed"))
    }
}

struct CountingAction {
    applicable_action: Action,
    invocations: Arc<AtomicUsize>,
}

#[async_trait]
impl AdditionalProcessAction for CountingAction {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn applicable_action(&self) -> Action {
        self.applicable_action
    }

    async fn execute(&self, _process_id: &str) -> anyhow::Result<()> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn failing_additional_action_neither_fails_nor_stops_the_chain() {
    let abort_invocations = Arc::new(AtomicUsize::new(0));
    let start_invocations = Arc::new(AtomicUsize::new(0));
    let harness = {
        let abort_invocations = abort_invocations.clone();
        let start_invocations = start_invocations.clone();
        Harness::with_additional_actions(move |_, _| {
            let actions: Vec<Arc<dyn AdditionalProcessAction>> = vec![
                Arc::new(FailingAction),
                Arc::new(CountingAction {
                    applicable_action: Action::Abort,
                    invocations: abort_invocations,
                }),
                Arc::new(CountingAction {
                    applicable_action: Action::Start,
                    invocations: start_invocations,
                }),
            ];
            actions
        })
        .await
    };
    harness.add_running_operation("p-1", days_ago(1)).await;

    harness
        .actions
        .get_action(Action::Abort)
        .unwrap()
        .execute(None, "p-1")
        .await
        .unwrap();

    assert_eq!(abort_invocations.load(Ordering::SeqCst), 1);
    assert_eq!(start_invocations.load(Ordering::SeqCst), 0);
    let operation = harness.operation("p-1").await.unwrap();
    assert_eq!(operation.state, Some(OperationState::Aborted));
}
