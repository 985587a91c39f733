/// Historic operation events
///
/// Append-only audit trail of operation lifecycle transitions
/// (STARTED, RETRIED, ABORTED, ABORT_EXECUTED, ...).

use crate::persistence::error::{Result, StoreError};
use crate::persistence::query::{from_millis, to_millis, Comparison, OrderDirection, QueryCriteria};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use std::{fmt, str::FromStr};

const TABLE: &str = "historic_operation_event";
const COLUMNS: &str = "id, process_id, event_type, timestamp";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    Started,
    Retried,
    Aborted,
    AbortExecuted,
    FailedByContentError,
    FailedByInfrastructureError,
    Finished,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Started => "STARTED",
            EventType::Retried => "RETRIED",
            EventType::Aborted => "ABORTED",
            EventType::AbortExecuted => "ABORT_EXECUTED",
            EventType::FailedByContentError => "FAILED_BY_CONTENT_ERROR",
            EventType::FailedByInfrastructureError => "FAILED_BY_INFRASTRUCTURE_ERROR",
            EventType::Finished => "FINISHED",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = StoreError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "STARTED" => Ok(EventType::Started),
            "RETRIED" => Ok(EventType::Retried),
            "ABORTED" => Ok(EventType::Aborted),
            "ABORT_EXECUTED" => Ok(EventType::AbortExecuted),
            "FAILED_BY_CONTENT_ERROR" => Ok(EventType::FailedByContentError),
            "FAILED_BY_INFRASTRUCTURE_ERROR" => Ok(EventType::FailedByInfrastructureError),
            "FINISHED" => Ok(EventType::Finished),
            other => Err(StoreError::InvalidData(format!("unknown event type: {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricOperationEvent {
    /// Assigned by the store on insert
    pub id: Option<i64>,
    pub process_id: String,
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
}

impl HistoricOperationEvent {
    pub fn new(process_id: impl Into<String>, event_type: EventType, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: None,
            process_id: process_id.into(),
            event_type,
            timestamp,
        }
    }

    fn from_row(row: &SqliteRow) -> Result<Self> {
        let event_type: String = row.try_get("event_type")?;
        Ok(Self {
            id: Some(row.try_get("id")?),
            process_id: row.try_get("process_id")?,
            event_type: event_type.parse()?,
            timestamp: from_millis(row.try_get("timestamp")?)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct HistoricOperationEventStore {
    pool: SqlitePool,
}

impl HistoricOperationEventStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Append an event and return its generated id
    pub async fn add(&self, event: &HistoricOperationEvent) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO historic_operation_event (process_id, event_type, timestamp) VALUES (?, ?, ?)",
        )
        .bind(&event.process_id)
        .bind(event.event_type.as_str())
        .bind(to_millis(event.timestamp))
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub fn create_query(&self) -> HistoricOperationEventQuery {
        HistoricOperationEventQuery {
            pool: self.pool.clone(),
            criteria: QueryCriteria::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HistoricOperationEventQuery {
    pool: SqlitePool,
    criteria: QueryCriteria,
}

impl HistoricOperationEventQuery {
    pub fn id(mut self, id: i64) -> Self {
        self.criteria.equal("id", id);
        self
    }

    pub fn process_id(mut self, process_id: &str) -> Self {
        self.criteria.equal("process_id", process_id);
        self
    }

    pub fn event_type(mut self, event_type: EventType) -> Self {
        self.criteria.equal("event_type", event_type.as_str());
        self
    }

    pub fn older_than(mut self, timestamp: DateTime<Utc>) -> Self {
        self.criteria.compare("timestamp", Comparison::LessThan, timestamp);
        self
    }

    pub fn order_by_timestamp(mut self, direction: OrderDirection) -> Self {
        self.criteria.order_by("timestamp", direction);
        self
    }

    pub async fn list(self) -> Result<Vec<HistoricOperationEvent>> {
        let rows = self
            .criteria
            .select(TABLE, COLUMNS)
            .build()
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(HistoricOperationEvent::from_row).collect()
    }

    pub async fn single_result(self) -> Result<Option<HistoricOperationEvent>> {
        let row = self
            .criteria
            .select(TABLE, COLUMNS)
            .build()
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(HistoricOperationEvent::from_row).transpose()
    }

    pub async fn delete(self) -> Result<u64> {
        let result = self.criteria.delete(TABLE).build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}
