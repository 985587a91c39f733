/// Process engine facade
///
/// Composite queries over the raw engine (receive-task detection, active
/// sub-processes, derived process state) plus the two behaviours that need
/// more than a single engine call: abort with optimistic-locking retry and
/// re-execution of dead-letter jobs.

use crate::engine::{
    DeadLetterJob, EngineError, Execution, HistoricProcessInstance, ProcessEngine, ProcessInstance, Result,
    PROCESS_ABORTED_VARIABLE,
};
use crate::persistence::OperationState;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::Duration,
};
use tokio::time::Instant;

/// Retries granted to a dead-letter job moved back to the executable queue
const DEAD_LETTER_JOB_RETRIES: u32 = 0;

const DEFAULT_ABORT_RETRY_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Clone)]
pub struct ProcessEngineFacade {
    engine: Arc<dyn ProcessEngine>,
    abort_timeout: Duration,
    abort_retry_interval: Duration,
}

impl ProcessEngineFacade {
    pub fn new(engine: Arc<dyn ProcessEngine>, abort_timeout: Duration) -> Self {
        Self {
            engine,
            abort_timeout,
            abort_retry_interval: DEFAULT_ABORT_RETRY_INTERVAL,
        }
    }

    pub fn with_abort_retry_interval(mut self, interval: Duration) -> Self {
        self.abort_retry_interval = interval;
        self
    }

    pub async fn get_process_instance(&self, process_instance_id: &str) -> Result<Option<ProcessInstance>> {
        self.engine.get_process_instance(process_instance_id).await
    }

    /// Delete a running process, retrying optimistic-locking conflicts until the abort timeout
    pub async fn delete_process_instance(&self, process_instance_id: &str, delete_reason: &str) -> Result<()> {
        let deadline = Instant::now() + self.abort_timeout;

        loop {
            match self.try_delete_process_instance(process_instance_id, delete_reason).await {
                Ok(()) => return Ok(()),
                Err(EngineError::OptimisticLocking(_)) => {
                    if Instant::now() >= deadline {
                        return Err(EngineError::AbortTimedOut(process_instance_id.to_string()));
                    }
                    tracing::warn!(process_id = %process_instance_id, "🔁 Optimistic locking conflict, retrying process abort");
                    tokio::time::sleep(self.abort_retry_interval).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn try_delete_process_instance(&self, process_instance_id: &str, delete_reason: &str) -> Result<()> {
        tracing::debug!(process_id = %process_instance_id, "Setting variable {} to true", PROCESS_ABORTED_VARIABLE);
        self.engine
            .set_variable(process_instance_id, PROCESS_ABORTED_VARIABLE, Value::Bool(true))
            .await?;
        self.engine
            .delete_process_instance(process_instance_id, delete_reason)
            .await
    }

    /// Executions of the process hierarchy that currently sit at an activity
    pub async fn get_active_process_executions(&self, process_instance_id: &str) -> Result<Vec<Execution>> {
        let executions = self.engine.list_executions(process_instance_id).await?;
        Ok(executions.into_iter().filter(Execution::is_active).collect())
    }

    pub async fn find_executions_at_receive_task(&self, process_instance_id: &str) -> Result<Vec<Execution>> {
        let executions = self.get_active_process_executions(process_instance_id).await?;
        Ok(executions
            .into_iter()
            .filter(Execution::is_at_receive_task)
            .collect())
    }

    pub async fn is_process_instance_at_receive_task(&self, process_instance_id: &str) -> Result<bool> {
        Ok(!self
            .find_executions_at_receive_task(process_instance_id)
            .await?
            .is_empty())
    }

    pub async fn trigger(&self, execution_id: &str, variables: &HashMap<String, Value>) -> Result<()> {
        self.engine.trigger(execution_id, variables).await
    }

    pub async fn set_variable(&self, execution_id: &str, name: &str, value: Value) -> Result<()> {
        self.engine.set_variable(execution_id, name, value).await
    }

    /// Ids of every sub-process started under `correlation_id`, excluding the root itself
    pub async fn get_historic_sub_process_ids(&self, correlation_id: &str) -> Result<Vec<String>> {
        Ok(self
            .historic_sub_processes(correlation_id)
            .await?
            .into_iter()
            .map(|process| process.id)
            .collect())
    }

    /// Same as `get_historic_sub_process_ids`, restricted to sub-processes that have not ended
    pub async fn get_active_historic_sub_process_ids(&self, correlation_id: &str) -> Result<Vec<String>> {
        Ok(self
            .historic_sub_processes(correlation_id)
            .await?
            .into_iter()
            .filter(|process| process.ended_at.is_none())
            .map(|process| process.id)
            .collect())
    }

    async fn historic_sub_processes(&self, correlation_id: &str) -> Result<Vec<HistoricProcessInstance>> {
        let processes = self
            .engine
            .list_historic_processes_by_correlation_id(correlation_id)
            .await?;
        Ok(processes
            .into_iter()
            .filter(|process| process.id != correlation_id)
            .collect())
    }

    /// Move every dead-letter job of the process hierarchy back to the executable queue
    pub async fn execute_job(&self, process_instance_id: &str) -> Result<()> {
        let jobs = self.get_dead_letter_jobs(process_instance_id).await?;
        if jobs.is_empty() {
            tracing::info!(process_id = %process_instance_id, "No dead letter jobs found for process");
            return Ok(());
        }

        for job in jobs {
            match self.engine.move_dead_letter_job(&job.id, DEAD_LETTER_JOB_RETRIES).await {
                Ok(()) => tracing::debug!(job_id = %job.id, "Moved dead letter job to executable jobs"),
                Err(e) if e.is_not_found() => {
                    tracing::info!(job_id = %job.id, "Dead letter job no longer exists, skipping")
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    async fn get_dead_letter_jobs(&self, process_instance_id: &str) -> Result<Vec<DeadLetterJob>> {
        let executions = self.engine.list_executions(process_instance_id).await?;

        let mut visited_processes = HashSet::new();
        let mut seen_jobs = HashSet::new();
        let mut jobs = Vec::new();
        for execution in executions {
            if !visited_processes.insert(execution.process_instance_id.clone()) {
                continue;
            }
            for job in self.engine.list_dead_letter_jobs(&execution.process_instance_id).await? {
                if seen_jobs.insert(job.id.clone()) {
                    jobs.push(job);
                }
            }
        }
        Ok(jobs)
    }

    /// Operation state derived from the engine's view of the process
    pub async fn get_process_instance_state(&self, process_instance_id: &str) -> Result<OperationState> {
        if self.get_process_instance(process_instance_id).await?.is_some() {
            if self.is_process_instance_at_receive_task(process_instance_id).await? {
                return Ok(OperationState::ActionRequired);
            }
            if !self.get_dead_letter_jobs(process_instance_id).await?.is_empty() {
                return Ok(OperationState::Error);
            }
            return Ok(OperationState::Running);
        }

        if self.hierarchy_has_delete_reason(process_instance_id).await? {
            Ok(OperationState::Aborted)
        } else {
            Ok(OperationState::Finished)
        }
    }

    async fn hierarchy_has_delete_reason(&self, process_instance_id: &str) -> Result<bool> {
        let Some(root) = self.engine.get_historic_process_instance(process_instance_id).await? else {
            return Ok(false);
        };
        if root.delete_reason.is_some() {
            return Ok(true);
        }
        Ok(self
            .historic_sub_processes(process_instance_id)
            .await?
            .iter()
            .any(|process| process.delete_reason.is_some()))
    }

    pub fn lock_owner(&self) -> String {
        self.engine.lock_owner()
    }

    pub async fn clear_lock_owner(&self, lock_owner: &str) -> Result<()> {
        self.engine.clear_lock_owner(lock_owner).await
    }

    pub async fn find_finished_historic_processes_started_before(
        &self,
        started_before: DateTime<Utc>,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<HistoricProcessInstance>> {
        self.engine
            .list_finished_historic_processes_started_before(started_before, offset, limit)
            .await
    }

    pub async fn delete_historic_process_instance(&self, process_instance_id: &str) -> Result<()> {
        self.engine.delete_historic_process_instance(process_instance_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::InMemoryProcessEngine;

    fn facade(engine: &Arc<InMemoryProcessEngine>, timeout: Duration) -> ProcessEngineFacade {
        ProcessEngineFacade::new(engine.clone(), timeout).with_abort_retry_interval(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn delete_retries_optimistic_locking_until_success() {
        let engine = Arc::new(InMemoryProcessEngine::recording("owner"));
        engine.add_process("p-1", "deploy");
        engine.fail_next_deletions(vec![
            EngineError::OptimisticLocking("p-1".into()),
            EngineError::OptimisticLocking("p-1".into()),
        ]);

        facade(&engine, Duration::from_secs(5))
            .delete_process_instance("p-1", "ABORTED")
            .await
            .unwrap();

        assert_eq!(engine.deleted_processes(), vec![("p-1".to_string(), "ABORTED".to_string())]);
        assert_eq!(engine.variable("p-1", PROCESS_ABORTED_VARIABLE), Some(Value::Bool(true)));
    }

    #[tokio::test]
    async fn delete_times_out_on_persistent_conflicts() {
        let engine = Arc::new(InMemoryProcessEngine::recording("owner"));
        engine.add_process("p-1", "deploy");
        engine.fail_next_deletions(vec![EngineError::OptimisticLocking("p-1".into()); 50]);

        let error = facade(&engine, Duration::ZERO)
            .delete_process_instance("p-1", "ABORTED")
            .await
            .unwrap_err();

        assert_eq!(error, EngineError::AbortTimedOut("p-1".into()));
        assert!(engine.deleted_processes().is_empty());
    }

    #[tokio::test]
    async fn delete_of_missing_process_is_not_found() {
        let engine = Arc::new(InMemoryProcessEngine::recording("owner"));

        let error = facade(&engine, Duration::from_secs(1))
            .delete_process_instance("ghost", "ABORTED")
            .await
            .unwrap_err();

        assert!(error.is_not_found());
    }

    #[tokio::test]
    async fn receive_task_detection_ignores_inactive_executions() {
        let engine = Arc::new(InMemoryProcessEngine::recording("owner"));
        engine.add_process("p-1", "deploy");
        engine.add_execution("p-1", "scope", "p-1", None, None);
        engine.add_execution("p-1", "wait", "p-1", Some("approve"), Some("receiveTask"));
        engine.add_execution("p-1", "busy", "p-1", Some("deployApps"), Some("serviceTask"));

        let facade = facade(&engine, Duration::from_secs(1));
        let waiting: Vec<String> = facade
            .find_executions_at_receive_task("p-1")
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();

        assert_eq!(waiting, vec!["wait"]);
        assert_eq!(facade.get_active_process_executions("p-1").await.unwrap().len(), 2);
        assert!(facade.is_process_instance_at_receive_task("p-1").await.unwrap());
    }

    #[tokio::test]
    async fn historic_sub_processes_exclude_root_and_ended() {
        let engine = Arc::new(InMemoryProcessEngine::recording("owner"));
        let started = Utc::now();
        engine.add_historic_process("root", "root", started, None);
        engine.add_historic_process("sub-active", "root", started, None);
        engine.add_historic_process("sub-ended", "root", started, Some(started));

        let facade = facade(&engine, Duration::from_secs(1));

        assert_eq!(
            facade.get_historic_sub_process_ids("root").await.unwrap(),
            vec!["sub-active", "sub-ended"]
        );
        assert_eq!(
            facade.get_active_historic_sub_process_ids("root").await.unwrap(),
            vec!["sub-active"]
        );
    }

    #[tokio::test]
    async fn execute_job_moves_each_dead_letter_job_once_and_skips_vanished() {
        let engine = Arc::new(InMemoryProcessEngine::recording("owner"));
        engine.add_process("p-1", "deploy");
        engine.add_execution("p-1", "e-1", "p-1", Some("a"), Some("serviceTask"));
        engine.add_execution("p-1", "e-2", "p-1", Some("b"), Some("serviceTask"));
        engine.add_dead_letter_job("job-1", "p-1", "e-1");
        engine.add_dead_letter_job("job-2", "p-1", "e-2");
        engine.fail_job_moves("job-2", EngineError::NotFound("job-2".into()));

        facade(&engine, Duration::from_secs(1)).execute_job("p-1").await.unwrap();

        assert_eq!(engine.moved_jobs(), vec![("job-1".to_string(), 0)]);
    }

    #[tokio::test]
    async fn execute_job_without_dead_letters_is_noop() {
        let engine = Arc::new(InMemoryProcessEngine::recording("owner"));
        engine.add_process("p-1", "deploy");
        engine.add_execution("p-1", "e-1", "p-1", Some("a"), Some("serviceTask"));

        facade(&engine, Duration::from_secs(1)).execute_job("p-1").await.unwrap();

        assert!(engine.moved_jobs().is_empty());
    }

    #[tokio::test]
    async fn derived_state_follows_engine_view() {
        let engine = Arc::new(InMemoryProcessEngine::recording("owner"));
        let facade = facade(&engine, Duration::from_secs(1));
        let started = Utc::now();

        engine.add_process("waiting", "deploy");
        engine.add_execution("waiting", "e", "waiting", Some("approve"), Some("receiveTask"));
        assert_eq!(
            facade.get_process_instance_state("waiting").await.unwrap(),
            OperationState::ActionRequired
        );

        engine.add_process("failing", "deploy");
        engine.add_execution("failing", "e-f", "failing", Some("a"), Some("serviceTask"));
        engine.add_dead_letter_job("job", "failing", "e-f");
        assert_eq!(
            facade.get_process_instance_state("failing").await.unwrap(),
            OperationState::Error
        );

        engine.add_historic_process("done", "done", started, Some(started));
        assert_eq!(
            facade.get_process_instance_state("done").await.unwrap(),
            OperationState::Finished
        );

        engine.add_process("stopped", "deploy");
        engine.add_historic_process("stopped", "stopped", started, None);
        facade.delete_process_instance("stopped", "ABORTED").await.unwrap();
        assert_eq!(
            facade.get_process_instance_state("stopped").await.unwrap(),
            OperationState::Aborted
        );
    }
}
