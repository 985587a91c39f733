/// Lock owner heartbeats
///
/// Each service instance periodically records the engine lock owner it runs
/// as, together with a timestamp. Entries that stop being refreshed identify
/// crashed instances whose engine job locks can be reclaimed.

use crate::persistence::error::{Result, StoreError};
use crate::persistence::query::{from_millis, to_millis, Comparison, QueryCriteria};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

const TABLE: &str = "lock_owner";
const COLUMNS: &str = "id, lock_owner, timestamp";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockOwnerEntry {
    pub id: Option<i64>,
    pub lock_owner: String,
    /// Last heartbeat
    pub timestamp: DateTime<Utc>,
}

impl LockOwnerEntry {
    pub fn new(lock_owner: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: None,
            lock_owner: lock_owner.into(),
            timestamp,
        }
    }

    fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: Some(row.try_get("id")?),
            lock_owner: row.try_get("lock_owner")?,
            timestamp: from_millis(row.try_get("timestamp")?)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct LockOwnerStore {
    pool: SqlitePool,
}

impl LockOwnerStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a heartbeat entry; `Conflict` if the owner is already present
    pub async fn add(&self, entry: &LockOwnerEntry) -> Result<i64> {
        let result = sqlx::query("INSERT INTO lock_owner (lock_owner, timestamp) VALUES (?, ?)")
            .bind(&entry.lock_owner)
            .bind(to_millis(entry.timestamp))
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::from_insert(e, "lock_owner", entry.lock_owner.clone()))?;

        Ok(result.last_insert_rowid())
    }

    /// Refresh the heartbeat timestamp of an existing owner
    pub async fn update(&self, entry: &LockOwnerEntry) -> Result<()> {
        let result = sqlx::query("UPDATE lock_owner SET timestamp = ? WHERE lock_owner = ?")
            .bind(to_millis(entry.timestamp))
            .bind(&entry.lock_owner)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("lock_owner", entry.lock_owner.clone()));
        }
        Ok(())
    }

    pub fn create_query(&self) -> LockOwnerQuery {
        LockOwnerQuery {
            pool: self.pool.clone(),
            criteria: QueryCriteria::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LockOwnerQuery {
    pool: SqlitePool,
    criteria: QueryCriteria,
}

impl LockOwnerQuery {
    pub fn id(mut self, id: i64) -> Self {
        self.criteria.equal("id", id);
        self
    }

    pub fn lock_owner(mut self, lock_owner: &str) -> Self {
        self.criteria.equal("lock_owner", lock_owner);
        self
    }

    pub fn lock_owners_in(mut self, lock_owners: &[String]) -> Self {
        self.criteria.any_of("lock_owner", lock_owners.to_vec());
        self
    }

    pub fn older_than(mut self, timestamp: DateTime<Utc>) -> Self {
        self.criteria.compare("timestamp", Comparison::LessThan, timestamp);
        self
    }

    pub async fn list(self) -> Result<Vec<LockOwnerEntry>> {
        let rows = self
            .criteria
            .select(TABLE, COLUMNS)
            .build()
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(LockOwnerEntry::from_row).collect()
    }

    pub async fn single_result(self) -> Result<Option<LockOwnerEntry>> {
        let row = self
            .criteria
            .select(TABLE, COLUMNS)
            .build()
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(LockOwnerEntry::from_row).transpose()
    }

    pub async fn delete(self) -> Result<u64> {
        let result = self.criteria.delete(TABLE).build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}
