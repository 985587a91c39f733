#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use mta_control::{
    engine::{InMemoryProcessEngine, ProcessEngineFacade},
    jobs::OperationsCleaner,
    persistence::{
        Database, HistoricOperationEventStore, LockOwnerStore, Operation, OperationState, OperationStore,
        ProgressMessageStore,
    },
    platform::{SpaceClient, SpaceLookup},
    process::{
        ActionServices, AdditionalProcessAction, DeleteErrorProgressMessagesAdditionalProcessAction,
        HistoricOperationEventPersister, ProcessActionRegistry, ProcessConflictPreventer,
        SetRetryPhaseAdditionalProcessAction,
    },
    telemetry::RecordingOperationMetrics,
};
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration as StdDuration,
};

pub const LOCK_OWNER: &str = "instance-0";

/// Stores, engine and actions wired against an in-memory database
pub struct Harness {
    pub database: Database,
    pub operations: OperationStore,
    pub events: HistoricOperationEventStore,
    pub progress_messages: ProgressMessageStore,
    pub lock_owners: LockOwnerStore,
    pub engine: Arc<InMemoryProcessEngine>,
    pub facade: ProcessEngineFacade,
    pub metrics: Arc<RecordingOperationMetrics>,
    pub conflict_preventer: ProcessConflictPreventer,
    pub actions: Arc<ProcessActionRegistry>,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_additional_actions(|facade, progress_messages| {
            let actions: Vec<Arc<dyn AdditionalProcessAction>> = vec![
                Arc::new(SetRetryPhaseAdditionalProcessAction::new(facade.clone())),
                Arc::new(DeleteErrorProgressMessagesAdditionalProcessAction::new(progress_messages.clone())),
            ];
            actions
        })
        .await
    }

    pub async fn with_additional_actions(
        additional: impl FnOnce(&ProcessEngineFacade, &ProgressMessageStore) -> Vec<Arc<dyn AdditionalProcessAction>>,
    ) -> Self {
        let database = Database::connect_in_memory().await.unwrap();
        let pool = database.pool();
        let operations = OperationStore::new(pool.clone());
        let events = HistoricOperationEventStore::new(pool.clone());
        let progress_messages = ProgressMessageStore::new(pool.clone());
        let lock_owners = LockOwnerStore::new(pool);

        let engine = Arc::new(InMemoryProcessEngine::recording(LOCK_OWNER));
        let facade = ProcessEngineFacade::new(engine.clone(), StdDuration::from_millis(200))
            .with_abort_retry_interval(StdDuration::from_millis(1));
        let metrics = Arc::new(RecordingOperationMetrics::new());
        let conflict_preventer = ProcessConflictPreventer::new(operations.clone());

        let services = Arc::new(ActionServices {
            engine: facade.clone(),
            operations: operations.clone(),
            events: HistoricOperationEventPersister::new(events.clone()),
            progress_messages: progress_messages.clone(),
            conflict_preventer: conflict_preventer.clone(),
            metrics: metrics.clone(),
        });
        let actions = Arc::new(ProcessActionRegistry::new(
            services,
            additional(&facade, &progress_messages),
        ));

        Self {
            database,
            operations,
            events,
            progress_messages,
            lock_owners,
            engine,
            facade,
            metrics,
            conflict_preventer,
            actions,
        }
    }

    pub fn operations_cleaner(&self, page_size: usize) -> OperationsCleaner {
        OperationsCleaner::new(
            self.operations.clone(),
            Arc::clone(&self.actions),
            self.conflict_preventer.clone(),
        )
        .with_page_size(page_size)
    }

    /// Operation plus a matching running process in the engine
    pub async fn add_running_operation(&self, process_id: &str, started_at: DateTime<Utc>) {
        self.engine.add_process(process_id, "deploy");
        self.add_operation(process_id, started_at, None).await;
    }

    pub async fn add_operation(&self, process_id: &str, started_at: DateTime<Utc>, state: Option<OperationState>) {
        let mut operation = Operation::new(process_id, "space-1", started_at)
            .with_mta_id("mta-1")
            .with_acquired_lock(state.is_none());
        operation.state = state;
        self.operations.add(&operation).await.unwrap();
    }

    pub async fn operation(&self, process_id: &str) -> Option<Operation> {
        self.operations
            .create_query()
            .process_id(process_id)
            .single_result()
            .await
            .unwrap()
    }
}

pub fn days_ago(days: i64) -> DateTime<Utc> {
    Utc::now() - Duration::days(days)
}

/// Space client answering from a fixed table; unknown spaces exist
#[derive(Default)]
pub struct StaticSpaceClient {
    answers: HashMap<String, SpaceLookup>,
    lookups: AtomicUsize,
}

impl StaticSpaceClient {
    pub fn new(answers: &[(&str, SpaceLookup)]) -> Self {
        Self {
            answers: answers
                .iter()
                .map(|(space, lookup)| (space.to_string(), lookup.clone()))
                .collect(),
            lookups: AtomicUsize::new(0),
        }
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpaceClient for StaticSpaceClient {
    async fn get_space(&self, space_guid: &str) -> SpaceLookup {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.answers
            .get(space_guid)
            .cloned()
            .unwrap_or(SpaceLookup::Exists)
    }
}
