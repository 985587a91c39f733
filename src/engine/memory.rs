/// Embedded in-memory process engine
///
/// Keeps runtime, history and job state in process memory. An engine built
/// with [`InMemoryProcessEngine::recording`] additionally logs every mutating
/// call and lets callers script failures for deletions, job moves and lock
/// clearing; the plain engine keeps no logs.

use crate::engine::{
    DeadLetterJob, EngineError, Execution, HistoricProcessInstance, ProcessEngine, ProcessInstance, Result,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::{
    collections::{BTreeMap, HashMap, VecDeque},
    sync::{Mutex, MutexGuard, PoisonError},
};

#[derive(Debug, Clone)]
struct StoredExecution {
    root_process_instance_id: String,
    execution: Execution,
}

#[derive(Debug, Default)]
struct EngineState {
    processes: BTreeMap<String, ProcessInstance>,
    executions: Vec<StoredExecution>,
    historic: BTreeMap<String, HistoricProcessInstance>,
    dead_letter_jobs: BTreeMap<String, DeadLetterJob>,
    variables: HashMap<(String, String), Value>,
    locked_jobs: HashMap<String, Vec<String>>,
}

/// Call log and scripted failures of a recording engine
#[derive(Debug, Default)]
struct Recorder {
    deletion_failures: VecDeque<EngineError>,
    job_move_failures: HashMap<String, EngineError>,
    clear_lock_owner_failures: HashMap<String, EngineError>,
    historic_deletion_failures: HashMap<String, EngineError>,

    triggered: Vec<(String, HashMap<String, Value>)>,
    deleted: Vec<(String, String)>,
    moved: Vec<(String, u32)>,
    cleared_lock_owners: Vec<String>,
    deleted_historic: Vec<String>,
}

pub struct InMemoryProcessEngine {
    lock_owner: String,
    state: Mutex<EngineState>,
    recorder: Option<Mutex<Recorder>>,
}

impl InMemoryProcessEngine {
    pub fn new(lock_owner: impl Into<String>) -> Self {
        Self {
            lock_owner: lock_owner.into(),
            state: Mutex::new(EngineState::default()),
            recorder: None,
        }
    }

    /// Engine that logs mutating calls and honours scripted failures
    pub fn recording(lock_owner: impl Into<String>) -> Self {
        Self {
            recorder: Some(Mutex::new(Recorder::default())),
            ..Self::new(lock_owner)
        }
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_some()
    }

    fn state(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn recorder(&self) -> Option<MutexGuard<'_, Recorder>> {
        self.recorder
            .as_ref()
            .map(|recorder| recorder.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn record(&self, entry: impl FnOnce(&mut Recorder)) {
        if let Some(mut recorder) = self.recorder() {
            entry(&mut *recorder);
        }
    }

    fn scripted_failure(&self, failure: impl FnOnce(&mut Recorder) -> Option<EngineError>) -> Option<EngineError> {
        self.recorder().and_then(|mut recorder| failure(&mut *recorder))
    }

    fn recorded<T>(&self, read: impl FnOnce(&Recorder) -> Vec<T>) -> Vec<T> {
        self.recorder().map(|recorder| read(&*recorder)).unwrap_or_default()
    }

    // ------------------------------------------------------------------
    // Seeding
    // ------------------------------------------------------------------

    pub fn add_process(&self, id: &str, process_definition_key: &str) {
        self.state().processes.insert(
            id.to_string(),
            ProcessInstance {
                id: id.to_string(),
                process_definition_key: process_definition_key.to_string(),
                suspended: false,
            },
        );
    }

    /// Register an execution belonging to the hierarchy rooted at `root_process_instance_id`
    pub fn add_execution(
        &self,
        root_process_instance_id: &str,
        id: &str,
        process_instance_id: &str,
        activity_id: Option<&str>,
        activity_type: Option<&str>,
    ) {
        self.state().executions.push(StoredExecution {
            root_process_instance_id: root_process_instance_id.to_string(),
            execution: Execution {
                id: id.to_string(),
                process_instance_id: process_instance_id.to_string(),
                activity_id: activity_id.map(str::to_string),
                activity_type: activity_type.map(str::to_string),
            },
        });
    }

    pub fn add_historic_process(
        &self,
        id: &str,
        correlation_id: &str,
        started_at: DateTime<Utc>,
        ended_at: Option<DateTime<Utc>>,
    ) {
        self.state().historic.insert(
            id.to_string(),
            HistoricProcessInstance {
                id: id.to_string(),
                process_definition_key: "deploy".to_string(),
                correlation_id: Some(correlation_id.to_string()),
                started_at,
                ended_at,
                delete_reason: None,
            },
        );
    }

    pub fn add_dead_letter_job(&self, id: &str, process_instance_id: &str, execution_id: &str) {
        self.state().dead_letter_jobs.insert(
            id.to_string(),
            DeadLetterJob {
                id: id.to_string(),
                process_instance_id: process_instance_id.to_string(),
                execution_id: execution_id.to_string(),
            },
        );
    }

    /// Mark a job as locked by `lock_owner`
    pub fn lock_job(&self, lock_owner: &str, job_id: &str) {
        self.state()
            .locked_jobs
            .entry(lock_owner.to_string())
            .or_default()
            .push(job_id.to_string());
    }

    // ------------------------------------------------------------------
    // Failure injection, ignored unless recording
    // ------------------------------------------------------------------

    /// The next deletions fail with these errors, in order
    pub fn fail_next_deletions(&self, errors: Vec<EngineError>) {
        self.record(|recorder| recorder.deletion_failures.extend(errors));
    }

    /// The next move of `job_id` fails with `error`
    pub fn fail_job_moves(&self, job_id: &str, error: EngineError) {
        self.record(|recorder| {
            recorder.job_move_failures.insert(job_id.to_string(), error);
        });
    }

    /// Every clear of `lock_owner` fails with `error`
    pub fn fail_clear_lock_owner(&self, lock_owner: &str, error: EngineError) {
        self.record(|recorder| {
            recorder
                .clear_lock_owner_failures
                .insert(lock_owner.to_string(), error);
        });
    }

    /// Every history deletion of `process_instance_id` fails with `error`
    pub fn fail_historic_deletion(&self, process_instance_id: &str, error: EngineError) {
        self.record(|recorder| {
            recorder
                .historic_deletion_failures
                .insert(process_instance_id.to_string(), error);
        });
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    pub fn triggered_executions(&self) -> Vec<(String, HashMap<String, Value>)> {
        self.recorded(|recorder| recorder.triggered.clone())
    }

    /// `(process id, delete reason)` of every deleted process
    pub fn deleted_processes(&self) -> Vec<(String, String)> {
        self.recorded(|recorder| recorder.deleted.clone())
    }

    /// `(job id, retries)` of every moved dead-letter job
    pub fn moved_jobs(&self) -> Vec<(String, u32)> {
        self.recorded(|recorder| recorder.moved.clone())
    }

    pub fn cleared_lock_owners(&self) -> Vec<String> {
        self.recorded(|recorder| recorder.cleared_lock_owners.clone())
    }

    pub fn deleted_historic_processes(&self) -> Vec<String> {
        self.recorded(|recorder| recorder.deleted_historic.clone())
    }

    pub fn locked_jobs(&self, lock_owner: &str) -> Vec<String> {
        self.state()
            .locked_jobs
            .get(lock_owner)
            .cloned()
            .unwrap_or_default()
    }

    pub fn historic_process_ids(&self) -> Vec<String> {
        self.state().historic.keys().cloned().collect()
    }

    pub fn variable(&self, execution_id: &str, name: &str) -> Option<Value> {
        self.state()
            .variables
            .get(&(execution_id.to_string(), name.to_string()))
            .cloned()
    }
}

#[async_trait]
impl ProcessEngine for InMemoryProcessEngine {
    async fn get_process_instance(&self, process_instance_id: &str) -> Result<Option<ProcessInstance>> {
        Ok(self.state().processes.get(process_instance_id).cloned())
    }

    async fn delete_process_instance(&self, process_instance_id: &str, delete_reason: &str) -> Result<()> {
        if let Some(error) = self.scripted_failure(|recorder| recorder.deletion_failures.pop_front()) {
            return Err(error);
        }
        {
            let mut state = self.state();
            if state.processes.remove(process_instance_id).is_none() {
                return Err(EngineError::NotFound(process_instance_id.to_string()));
            }

            let mut scopes = vec![process_instance_id.to_string()];
            state.executions.retain(|stored| {
                let removed = stored.root_process_instance_id == process_instance_id;
                if removed {
                    scopes.push(stored.execution.id.clone());
                    scopes.push(stored.execution.process_instance_id.clone());
                }
                !removed
            });
            state.variables.retain(|(scope, _), _| !scopes.contains(scope));
            if let Some(historic) = state.historic.get_mut(process_instance_id) {
                historic.delete_reason = Some(delete_reason.to_string());
                historic.ended_at = Some(Utc::now());
            }
        }
        self.record(|recorder| {
            recorder
                .deleted
                .push((process_instance_id.to_string(), delete_reason.to_string()))
        });
        Ok(())
    }

    async fn list_executions(&self, root_process_instance_id: &str) -> Result<Vec<Execution>> {
        Ok(self
            .state()
            .executions
            .iter()
            .filter(|stored| stored.root_process_instance_id == root_process_instance_id)
            .map(|stored| stored.execution.clone())
            .collect())
    }

    async fn trigger(&self, execution_id: &str, variables: &HashMap<String, Value>) -> Result<()> {
        {
            let mut state = self.state();
            let execution = state
                .executions
                .iter_mut()
                .find(|stored| stored.execution.id == execution_id)
                .ok_or_else(|| EngineError::NotFound(execution_id.to_string()))?;

            // The execution leaves its wait state
            execution.execution.activity_type = None;

            for (name, value) in variables {
                state
                    .variables
                    .insert((execution_id.to_string(), name.clone()), value.clone());
            }
        }
        self.record(|recorder| recorder.triggered.push((execution_id.to_string(), variables.clone())));
        Ok(())
    }

    async fn set_variable(&self, execution_id: &str, name: &str, value: Value) -> Result<()> {
        let mut state = self.state();
        let exists = state.processes.contains_key(execution_id)
            || state
                .executions
                .iter()
                .any(|stored| {
                    stored.execution.id == execution_id || stored.execution.process_instance_id == execution_id
                });
        if !exists {
            return Err(EngineError::NotFound(execution_id.to_string()));
        }

        state
            .variables
            .insert((execution_id.to_string(), name.to_string()), value);
        Ok(())
    }

    async fn get_historic_process_instance(&self, process_instance_id: &str) -> Result<Option<HistoricProcessInstance>> {
        Ok(self.state().historic.get(process_instance_id).cloned())
    }

    async fn list_historic_processes_by_correlation_id(&self, correlation_id: &str) -> Result<Vec<HistoricProcessInstance>> {
        Ok(self
            .state()
            .historic
            .values()
            .filter(|process| process.correlation_id.as_deref() == Some(correlation_id))
            .cloned()
            .collect())
    }

    async fn list_dead_letter_jobs(&self, process_instance_id: &str) -> Result<Vec<DeadLetterJob>> {
        Ok(self
            .state()
            .dead_letter_jobs
            .values()
            .filter(|job| job.process_instance_id == process_instance_id)
            .cloned()
            .collect())
    }

    async fn move_dead_letter_job(&self, job_id: &str, retries: u32) -> Result<()> {
        if let Some(error) = self.scripted_failure(|recorder| recorder.job_move_failures.remove(job_id)) {
            return Err(error);
        }
        if self.state().dead_letter_jobs.remove(job_id).is_none() {
            return Err(EngineError::NotFound(job_id.to_string()));
        }
        self.record(|recorder| recorder.moved.push((job_id.to_string(), retries)));
        Ok(())
    }

    fn lock_owner(&self) -> String {
        self.lock_owner.clone()
    }

    async fn clear_lock_owner(&self, lock_owner: &str) -> Result<()> {
        if let Some(error) = self.scripted_failure(|recorder| recorder.clear_lock_owner_failures.get(lock_owner).cloned()) {
            return Err(error);
        }
        self.state().locked_jobs.remove(lock_owner);
        self.record(|recorder| recorder.cleared_lock_owners.push(lock_owner.to_string()));
        Ok(())
    }

    async fn list_finished_historic_processes_started_before(
        &self,
        started_before: DateTime<Utc>,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<HistoricProcessInstance>> {
        Ok(self
            .state()
            .historic
            .values()
            .filter(|process| process.ended_at.is_some() && process.started_at < started_before)
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn delete_historic_process_instance(&self, process_instance_id: &str) -> Result<()> {
        if let Some(error) =
            self.scripted_failure(|recorder| recorder.historic_deletion_failures.get(process_instance_id).cloned())
        {
            return Err(error);
        }
        if self.state().historic.remove(process_instance_id).is_none() {
            return Err(EngineError::NotFound(process_instance_id.to_string()));
        }
        self.record(|recorder| recorder.deleted_historic.push(process_instance_id.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn trigger_records_variables_and_leaves_wait_state() {
        let engine = InMemoryProcessEngine::recording("owner");
        engine.add_process("p", "deploy");
        engine.add_execution("p", "e", "p", Some("approve"), Some("receiveTask"));

        let variables = HashMap::from([("user".to_string(), Value::from("alice"))]);
        engine.trigger("e", &variables).await.unwrap();

        let executions = engine.list_executions("p").await.unwrap();
        assert!(!executions[0].is_at_receive_task());
        assert_eq!(engine.variable("e", "user"), Some(Value::from("alice")));
        assert_eq!(engine.triggered_executions().len(), 1);
    }

    #[tokio::test]
    async fn clearing_lock_owner_releases_its_jobs() {
        let engine = InMemoryProcessEngine::recording("owner");
        engine.lock_job("crashed", "job-1");

        engine.clear_lock_owner("crashed").await.unwrap();

        assert!(engine.locked_jobs("crashed").is_empty());
        assert_eq!(engine.cleared_lock_owners(), vec!["crashed"]);
    }

    #[tokio::test]
    async fn finished_history_is_paged_in_id_order() {
        let engine = InMemoryProcessEngine::recording("owner");
        let now = Utc::now();
        let earlier = now - chrono::Duration::days(10);
        for id in ["c", "a", "b"] {
            engine.add_historic_process(id, id, earlier, Some(earlier));
        }
        engine.add_historic_process("running", "running", earlier, None);

        let page = engine
            .list_finished_historic_processes_started_before(now, 1, 5)
            .await
            .unwrap();

        let ids: Vec<&str> = page.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[tokio::test]
    async fn plain_engine_keeps_no_call_log() {
        let engine = InMemoryProcessEngine::new("owner");
        engine.add_process("p", "deploy");
        engine.add_execution("p", "e", "p", Some("approve"), Some("receiveTask"));
        engine.add_dead_letter_job("job", "p", "e");
        engine.fail_next_deletions(vec![EngineError::Failure("scripted".to_string())]);

        engine.trigger("e", &HashMap::new()).await.unwrap();
        engine.move_dead_letter_job("job", 1).await.unwrap();
        engine.delete_process_instance("p", "ABORTED").await.unwrap();

        assert!(!engine.is_recording());
        assert!(engine.triggered_executions().is_empty());
        assert!(engine.moved_jobs().is_empty());
        assert!(engine.deleted_processes().is_empty());
        assert!(engine.get_process_instance("p").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn deleting_a_process_drops_its_variables() {
        let engine = InMemoryProcessEngine::recording("owner");
        engine.add_process("p", "deploy");
        engine.add_execution("p", "e", "p", Some("approve"), Some("receiveTask"));
        engine.set_variable("p", "phase", Value::from("RETRY")).await.unwrap();
        engine
            .trigger("e", &HashMap::from([("user".to_string(), Value::from("alice"))]))
            .await
            .unwrap();

        engine.delete_process_instance("p", "ABORTED").await.unwrap();

        assert_eq!(engine.variable("p", "phase"), None);
        assert_eq!(engine.variable("e", "user"), None);
        assert_eq!(engine.deleted_processes(), vec![("p".to_string(), "ABORTED".to_string())]);
    }
}
