/// Progress messages emitted by running processes

use crate::persistence::error::{Result, StoreError};
use crate::persistence::query::{from_millis, to_millis, Comparison, OrderDirection, QueryCriteria};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use std::{fmt, str::FromStr};

const TABLE: &str = "progress_message";
const COLUMNS: &str = "id, process_id, task_id, message_type, text, timestamp";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProgressMessageType {
    Error,
    Warning,
    Info,
    Ext,
    TaskStartup,
}

impl ProgressMessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressMessageType::Error => "ERROR",
            ProgressMessageType::Warning => "WARNING",
            ProgressMessageType::Info => "INFO",
            ProgressMessageType::Ext => "EXT",
            ProgressMessageType::TaskStartup => "TASK_STARTUP",
        }
    }
}

impl fmt::Display for ProgressMessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProgressMessageType {
    type Err = StoreError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "ERROR" => Ok(ProgressMessageType::Error),
            "WARNING" => Ok(ProgressMessageType::Warning),
            "INFO" => Ok(ProgressMessageType::Info),
            "EXT" => Ok(ProgressMessageType::Ext),
            "TASK_STARTUP" => Ok(ProgressMessageType::TaskStartup),
            other => Err(StoreError::InvalidData(format!("unknown progress message type: {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressMessage {
    pub id: Option<i64>,
    pub process_id: String,
    pub task_id: String,
    pub message_type: ProgressMessageType,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl ProgressMessage {
    pub fn new(
        process_id: impl Into<String>,
        task_id: impl Into<String>,
        message_type: ProgressMessageType,
        text: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: None,
            process_id: process_id.into(),
            task_id: task_id.into(),
            message_type,
            text: text.into(),
            timestamp,
        }
    }

    fn from_row(row: &SqliteRow) -> Result<Self> {
        let message_type: String = row.try_get("message_type")?;
        Ok(Self {
            id: Some(row.try_get("id")?),
            process_id: row.try_get("process_id")?,
            task_id: row.try_get("task_id")?,
            message_type: message_type.parse()?,
            text: row.try_get("text")?,
            timestamp: from_millis(row.try_get("timestamp")?)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ProgressMessageStore {
    pool: SqlitePool,
}

impl ProgressMessageStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn add(&self, message: &ProgressMessage) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO progress_message (process_id, task_id, message_type, text, timestamp)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&message.process_id)
        .bind(&message.task_id)
        .bind(message.message_type.as_str())
        .bind(&message.text)
        .bind(to_millis(message.timestamp))
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub fn create_query(&self) -> ProgressMessageQuery {
        ProgressMessageQuery {
            pool: self.pool.clone(),
            criteria: QueryCriteria::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProgressMessageQuery {
    pool: SqlitePool,
    criteria: QueryCriteria,
}

impl ProgressMessageQuery {
    pub fn process_id(mut self, process_id: &str) -> Self {
        self.criteria.equal("process_id", process_id);
        self
    }

    pub fn message_type(mut self, message_type: ProgressMessageType) -> Self {
        self.criteria.equal("message_type", message_type.as_str());
        self
    }

    pub fn with_type_any_of(mut self, types: &[ProgressMessageType]) -> Self {
        self.criteria
            .any_of("message_type", types.iter().map(|t| t.as_str().to_string()).collect());
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

    pub fn limit_on_select(mut self, limit: i64) -> Self {
        self.criteria.limit(limit);
        self
    }

    pub fn offset_on_select(mut self, offset: i64) -> Self {
        self.criteria.offset(offset);
        self
    }

    pub async fn list(self) -> Result<Vec<ProgressMessage>> {
        let rows = self
            .criteria
            .select(TABLE, COLUMNS)
            .build()
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(ProgressMessage::from_row).collect()
    }

    pub async fn single_result(self) -> Result<Option<ProgressMessage>> {
        let row = self
            .criteria
            .select(TABLE, COLUMNS)
            .build()
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(ProgressMessage::from_row).transpose()
    }

    pub async fn delete(self) -> Result<u64> {
        let result = self.criteria.delete(TABLE).build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}
