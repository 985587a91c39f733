/// Workflow Engine Surface
///
/// The control plane never runs deployment steps itself; it drives an external
/// BPMN-style workflow engine. This module defines the small surface it needs:
/// - `ProcessEngine`: raw engine calls (runtime, history, jobs, locks)
/// - `ProcessEngineFacade`: composite queries and retry semantics on top
/// - `InMemoryProcessEngine`: embedded engine for development and tests

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

// Composite queries, abort retry and dead-letter handling
pub mod facade;

// Embedded engine with call recording and failure injection
pub mod memory;

pub use facade::ProcessEngineFacade;
pub use memory::InMemoryProcessEngine;

/// Activity type of a wait state that needs an external trigger
pub const RECEIVE_TASK: &str = "receiveTask";

/// Variable set on a process right before it is deleted
pub const PROCESS_ABORTED_VARIABLE: &str = "processAborted";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("process instance not found: {0}")]
    NotFound(String),

    /// Concurrent modification of the same process; safe to retry
    #[error("optimistic locking conflict on {0}")]
    OptimisticLocking(String),

    #[error("abort of process {0} timed out")]
    AbortTimedOut(String),

    #[error("engine failure: {0}")]
    Failure(String),
}

impl EngineError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, EngineError::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// A running process instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessInstance {
    pub id: String,
    pub process_definition_key: String,
    pub suspended: bool,
}

/// A path of execution inside a (sub)process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    pub id: String,
    pub process_instance_id: String,
    /// Current activity; `None` for scope executions
    pub activity_id: Option<String>,
    pub activity_type: Option<String>,
}

impl Execution {
    pub fn is_active(&self) -> bool {
        self.activity_id.is_some()
    }

    pub fn is_at_receive_task(&self) -> bool {
        self.is_active() && self.activity_type.as_deref() == Some(RECEIVE_TASK)
    }
}

/// History record of a (sub)process, kept after the process ends
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricProcessInstance {
    pub id: String,
    pub process_definition_key: String,
    /// Root process id shared by the whole process hierarchy
    pub correlation_id: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub delete_reason: Option<String>,
}

/// A job whose retries are exhausted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetterJob {
    pub id: String,
    pub process_instance_id: String,
    pub execution_id: String,
}

/// Raw workflow engine operations
#[async_trait]
pub trait ProcessEngine: Send + Sync {
    async fn get_process_instance(&self, process_instance_id: &str) -> Result<Option<ProcessInstance>>;

    /// Delete a running process; `NotFound` if it no longer runs
    async fn delete_process_instance(&self, process_instance_id: &str, delete_reason: &str) -> Result<()>;

    /// All executions whose root process is `root_process_instance_id`
    async fn list_executions(&self, root_process_instance_id: &str) -> Result<Vec<Execution>>;

    async fn trigger(&self, execution_id: &str, variables: &HashMap<String, Value>) -> Result<()>;

    async fn set_variable(&self, execution_id: &str, name: &str, value: Value) -> Result<()>;

    async fn get_historic_process_instance(&self, process_instance_id: &str) -> Result<Option<HistoricProcessInstance>>;

    /// History records of every process sharing `correlation_id`, ordered by id
    async fn list_historic_processes_by_correlation_id(&self, correlation_id: &str) -> Result<Vec<HistoricProcessInstance>>;

    async fn list_dead_letter_jobs(&self, process_instance_id: &str) -> Result<Vec<DeadLetterJob>>;

    async fn move_dead_letter_job(&self, job_id: &str, retries: u32) -> Result<()>;

    /// Identity under which this instance's job executor locks jobs
    fn lock_owner(&self) -> String;

    /// Release every job lock held by `lock_owner`
    async fn clear_lock_owner(&self, lock_owner: &str) -> Result<()>;

    async fn list_finished_historic_processes_started_before(
        &self,
        started_before: DateTime<Utc>,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<HistoricProcessInstance>>;

    async fn delete_historic_process_instance(&self, process_instance_id: &str) -> Result<()>;
}
