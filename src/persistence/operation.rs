/// Operation persistence
///
/// An Operation is one tracked deployment attempt, keyed by the workflow
/// engine's process id. Operations are mutated by process actions and by the
/// cleanup engine; once they reach a final state only the retention cleaner
/// touches them again (by deleting them).

use crate::persistence::configuration::{AuditableConfiguration, ConfigurationIdentifier};
use crate::persistence::error::{Result, StoreError};
use crate::persistence::query::{from_millis, to_millis, Comparison, OrderDirection, QueryCriteria};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use std::{fmt, str::FromStr};

const TABLE: &str = "operation";
const COLUMNS: &str =
    "process_id, process_type, mta_id, space_id, username, started_at, ended_at, state, acquired_lock";

/// Lifecycle state of an operation
///
/// FINISHED and ABORTED are final and absorbing. An operation without a state
/// or with a non-final state is still in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationState {
    Running,
    Finished,
    Error,
    Aborted,
    ActionRequired,
}

impl OperationState {
    pub const FINAL_STATES: [OperationState; 2] = [OperationState::Finished, OperationState::Aborted];
    pub const NON_FINAL_STATES: [OperationState; 3] = [
        OperationState::Running,
        OperationState::Error,
        OperationState::ActionRequired,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationState::Running => "RUNNING",
            OperationState::Finished => "FINISHED",
            OperationState::Error => "ERROR",
            OperationState::Aborted => "ABORTED",
            OperationState::ActionRequired => "ACTION_REQUIRED",
        }
    }

    pub fn is_final(self) -> bool {
        Self::FINAL_STATES.contains(&self)
    }
}

impl fmt::Display for OperationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationState {
    type Err = StoreError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "RUNNING" => Ok(OperationState::Running),
            "FINISHED" => Ok(OperationState::Finished),
            "ERROR" => Ok(OperationState::Error),
            "ABORTED" => Ok(OperationState::Aborted),
            "ACTION_REQUIRED" => Ok(OperationState::ActionRequired),
            other => Err(StoreError::InvalidData(format!("unknown operation state: {other}"))),
        }
    }
}

/// Kind of deployment process behind an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessType {
    Deploy,
    BlueGreenDeploy,
    Undeploy,
    CtsDeploy,
}

impl ProcessType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessType::Deploy => "DEPLOY",
            ProcessType::BlueGreenDeploy => "BLUE_GREEN_DEPLOY",
            ProcessType::Undeploy => "UNDEPLOY",
            ProcessType::CtsDeploy => "CTS_DEPLOY",
        }
    }
}

impl fmt::Display for ProcessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProcessType {
    type Err = StoreError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "DEPLOY" => Ok(ProcessType::Deploy),
            "BLUE_GREEN_DEPLOY" => Ok(ProcessType::BlueGreenDeploy),
            "UNDEPLOY" => Ok(ProcessType::Undeploy),
            "CTS_DEPLOY" => Ok(ProcessType::CtsDeploy),
            other => Err(StoreError::InvalidData(format!("unknown process type: {other}"))),
        }
    }
}

/// A tracked deployment attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    /// Workflow engine correlation id of the root process
    pub process_id: String,
    pub process_type: Option<ProcessType>,
    pub mta_id: Option<String>,
    pub space_id: String,
    pub user: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub state: Option<OperationState>,
    /// True while this operation holds the engine's per-mta-per-space lock
    pub acquired_lock: bool,
}

impl Operation {
    pub fn new(process_id: impl Into<String>, space_id: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            process_id: process_id.into(),
            process_type: None,
            mta_id: None,
            space_id: space_id.into(),
            user: None,
            started_at,
            ended_at: None,
            state: None,
            acquired_lock: false,
        }
    }

    pub fn with_process_type(mut self, process_type: ProcessType) -> Self {
        self.process_type = Some(process_type);
        self
    }

    pub fn with_mta_id(mut self, mta_id: impl Into<String>) -> Self {
        self.mta_id = Some(mta_id.into());
        self
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_state(mut self, state: OperationState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn with_acquired_lock(mut self, acquired_lock: bool) -> Self {
        self.acquired_lock = acquired_lock;
        self
    }

    pub fn is_in_final_state(&self) -> bool {
        self.state.is_some_and(OperationState::is_final)
    }

    fn from_row(row: &SqliteRow) -> Result<Self> {
        let process_type: Option<String> = row.try_get("process_type")?;
        let state: Option<String> = row.try_get("state")?;
        let ended_at: Option<i64> = row.try_get("ended_at")?;
        let acquired_lock: i64 = row.try_get("acquired_lock")?;

        Ok(Self {
            process_id: row.try_get("process_id")?,
            process_type: process_type.as_deref().map(ProcessType::from_str).transpose()?,
            mta_id: row.try_get("mta_id")?,
            space_id: row.try_get("space_id")?,
            user: row.try_get("username")?,
            started_at: from_millis(row.try_get("started_at")?)?,
            ended_at: ended_at.map(from_millis).transpose()?,
            state: state.as_deref().map(OperationState::from_str).transpose()?,
            acquired_lock: acquired_lock != 0,
        })
    }
}

impl AuditableConfiguration for Operation {
    fn configuration_type(&self) -> &'static str {
        "operation"
    }

    fn configuration_name(&self) -> String {
        self.process_id.clone()
    }

    fn configuration_identifiers(&self) -> Vec<ConfigurationIdentifier> {
        let mut identifiers = Vec::new();
        if let Some(mta_id) = &self.mta_id {
            identifiers.push(ConfigurationIdentifier::new("mta id", mta_id));
        }
        if let Some(process_type) = self.process_type {
            identifiers.push(ConfigurationIdentifier::new("process type", process_type.as_str()));
        }
        identifiers.push(ConfigurationIdentifier::new("space id", &self.space_id));
        identifiers
    }
}

/// SQLite-backed operation store
#[derive(Debug, Clone)]
pub struct OperationStore {
    pool: SqlitePool,
}

impl OperationStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new operation, failing with `Conflict` if the process id is taken
    pub async fn add(&self, operation: &Operation) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO operation (process_id, process_type, mta_id, space_id, username, started_at, ended_at, state, acquired_lock)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&operation.process_id)
        .bind(operation.process_type.map(|t| t.as_str()))
        .bind(&operation.mta_id)
        .bind(&operation.space_id)
        .bind(&operation.user)
        .bind(to_millis(operation.started_at))
        .bind(operation.ended_at.map(to_millis))
        .bind(operation.state.map(|s| s.as_str()))
        .bind(i64::from(operation.acquired_lock))
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::from_insert(e, "operation", operation.process_id.clone()))?;

        Ok(())
    }

    /// Overwrite the mutable attributes of an existing operation
    pub async fn update(&self, operation: &Operation) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE operation
            SET process_type = ?, mta_id = ?, space_id = ?, username = ?, started_at = ?,
                ended_at = ?, state = ?, acquired_lock = ?
            WHERE process_id = ?
            "#,
        )
        .bind(operation.process_type.map(|t| t.as_str()))
        .bind(&operation.mta_id)
        .bind(&operation.space_id)
        .bind(&operation.user)
        .bind(to_millis(operation.started_at))
        .bind(operation.ended_at.map(to_millis))
        .bind(operation.state.map(|s| s.as_str()))
        .bind(i64::from(operation.acquired_lock))
        .bind(&operation.process_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("operation", operation.process_id.clone()));
        }
        Ok(())
    }

    pub fn create_query(&self) -> OperationQuery {
        OperationQuery {
            pool: self.pool.clone(),
            criteria: QueryCriteria::default(),
        }
    }
}

/// Builder-style operation query
#[derive(Debug, Clone)]
pub struct OperationQuery {
    pool: SqlitePool,
    criteria: QueryCriteria,
}

impl OperationQuery {
    pub fn process_id(mut self, process_id: &str) -> Self {
        self.criteria.equal("process_id", process_id);
        self
    }

    pub fn process_type(mut self, process_type: ProcessType) -> Self {
        self.criteria.equal("process_type", process_type.as_str());
        self
    }

    pub fn space_id(mut self, space_id: &str) -> Self {
        self.criteria.equal("space_id", space_id);
        self
    }

    pub fn mta_id(mut self, mta_id: &str) -> Self {
        self.criteria.equal("mta_id", mta_id);
        self
    }

    pub fn user(mut self, user: &str) -> Self {
        self.criteria.equal("username", user);
        self
    }

    pub fn acquired_lock(mut self, acquired_lock: bool) -> Self {
        self.criteria.equal("acquired_lock", acquired_lock);
        self
    }

    pub fn state(mut self, state: OperationState) -> Self {
        self.criteria.equal("state", state.as_str());
        self
    }

    pub fn with_state_any_of(mut self, states: &[OperationState]) -> Self {
        self.criteria
            .any_of("state", states.iter().map(|s| s.as_str().to_string()).collect());
        self
    }

    pub fn in_final_state(self) -> Self {
        self.with_state_any_of(&OperationState::FINAL_STATES)
    }

    /// Operations without a state or in a non-final state
    pub fn in_non_final_state(mut self) -> Self {
        self.criteria.null_or_any_of(
            "state",
            OperationState::NON_FINAL_STATES
                .iter()
                .map(|s| s.as_str().to_string())
                .collect(),
        );
        self
    }

    pub fn started_before(mut self, timestamp: DateTime<Utc>) -> Self {
        self.criteria.compare("started_at", Comparison::LessThan, timestamp);
        self
    }

    pub fn started_after(mut self, timestamp: DateTime<Utc>) -> Self {
        self.criteria
            .compare("started_at", Comparison::GreaterThanOrEqual, timestamp);
        self
    }

    pub fn ended_before(mut self, timestamp: DateTime<Utc>) -> Self {
        self.criteria.compare("ended_at", Comparison::LessThan, timestamp);
        self
    }

    /// Never ended, or ended strictly before `timestamp`
    pub fn ended_before_or_open(mut self, timestamp: DateTime<Utc>) -> Self {
        self.criteria.null_or_compare("ended_at", Comparison::LessThan, timestamp);
        self
    }

    pub fn ended_after(mut self, timestamp: DateTime<Utc>) -> Self {
        self.criteria.compare("ended_at", Comparison::GreaterThan, timestamp);
        self
    }

    pub fn order_by_process_id(mut self, direction: OrderDirection) -> Self {
        self.criteria.order_by("process_id", direction);
        self
    }

    pub fn order_by_start_time(mut self, direction: OrderDirection) -> Self {
        self.criteria.order_by("started_at", direction);
        self
    }

    pub fn order_by_end_time(mut self, direction: OrderDirection) -> Self {
        self.criteria.order_by("ended_at", direction);
        self
    }

    pub fn limit_on_select(mut self, limit: i64) -> Self {
        self.criteria.limit(limit);
        self
    }

    pub fn offset_on_select(mut self, offset: i64) -> Self {
        self.criteria.offset(offset);
        self
    }

    pub async fn list(self) -> Result<Vec<Operation>> {
        let rows = self
            .criteria
            .select(TABLE, COLUMNS)
            .build()
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Operation::from_row).collect()
    }

    pub async fn single_result(self) -> Result<Option<Operation>> {
        let row = self
            .criteria
            .select(TABLE, COLUMNS)
            .build()
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Operation::from_row).transpose()
    }

    /// Delete every matching operation, returning the number removed
    pub async fn delete(self) -> Result<u64> {
        let result = self
            .criteria
            .delete(TABLE)
            .build()
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
