/// Encrypted process variables kept outside the engine
///
/// A secret token holds the ciphertext of one sensitive variable of a
/// process. Tokens are removed once they are older than the retention window.

use crate::persistence::error::Result;
use crate::persistence::query::{from_millis, to_millis, Comparison, QueryCriteria};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

const TABLE: &str = "secret_token";
const COLUMNS: &str = "id, process_instance_id, variable_name, content, timestamp";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecretToken {
    pub id: Option<i64>,
    pub process_instance_id: String,
    pub variable_name: String,
    pub content: Vec<u8>,
    pub timestamp: DateTime<Utc>,
}

impl SecretToken {
    pub fn new(
        process_instance_id: impl Into<String>,
        variable_name: impl Into<String>,
        content: impl Into<Vec<u8>>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: None,
            process_instance_id: process_instance_id.into(),
            variable_name: variable_name.into(),
            content: content.into(),
            timestamp,
        }
    }

    fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: Some(row.try_get("id")?),
            process_instance_id: row.try_get("process_instance_id")?,
            variable_name: row.try_get("variable_name")?,
            content: row.try_get("content")?,
            timestamp: from_millis(row.try_get("timestamp")?)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct SecretTokenStore {
    pool: SqlitePool,
}

impl SecretTokenStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn add(&self, token: &SecretToken) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO secret_token (process_instance_id, variable_name, content, timestamp) VALUES (?, ?, ?, ?)",
        )
        .bind(&token.process_instance_id)
        .bind(&token.variable_name)
        .bind(&token.content)
        .bind(to_millis(token.timestamp))
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub fn create_query(&self) -> SecretTokenQuery {
        SecretTokenQuery {
            pool: self.pool.clone(),
            criteria: QueryCriteria::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SecretTokenQuery {
    pool: SqlitePool,
    criteria: QueryCriteria,
}

impl SecretTokenQuery {
    pub fn id(mut self, id: i64) -> Self {
        self.criteria.equal("id", id);
        self
    }

    pub fn process_instance_id(mut self, process_instance_id: &str) -> Self {
        self.criteria.equal("process_instance_id", process_instance_id);
        self
    }

    pub fn variable_name(mut self, variable_name: &str) -> Self {
        self.criteria.equal("variable_name", variable_name);
        self
    }

    /// Created strictly before `timestamp`
    pub fn older_than(mut self, timestamp: DateTime<Utc>) -> Self {
        self.criteria.compare("timestamp", Comparison::LessThan, timestamp);
        self
    }

    pub async fn list(self) -> Result<Vec<SecretToken>> {
        let rows = self
            .criteria
            .select(TABLE, COLUMNS)
            .build()
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(SecretToken::from_row).collect()
    }

    pub async fn single_result(self) -> Result<Option<SecretToken>> {
        let row = self
            .criteria
            .select(TABLE, COLUMNS)
            .build()
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(SecretToken::from_row).transpose()
    }

    pub async fn delete(self) -> Result<u64> {
        let result = self.criteria.delete(TABLE).build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::Database;

    fn at(millis: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(millis).unwrap()
    }

    #[tokio::test]
    async fn tokens_round_trip_their_ciphertext() {
        let database = Database::connect_in_memory().await.unwrap();
        let store = SecretTokenStore::new(database.pool());
        let id = store
            .add(&SecretToken::new("p-1", "password", vec![0x00_u8, 0xff, 0x10], at(1_000)))
            .await
            .unwrap();

        let token = store.create_query().id(id).single_result().await.unwrap().unwrap();

        assert_eq!(token.id, Some(id));
        assert_eq!(token.content, vec![0x00, 0xff, 0x10]);
        assert_eq!(token.timestamp, at(1_000));
    }

    #[tokio::test]
    async fn older_than_is_strict() {
        let database = Database::connect_in_memory().await.unwrap();
        let store = SecretTokenStore::new(database.pool());
        for (variable_name, millis) in [("old", 1_000), ("edge", 5_000), ("new", 9_000)] {
            store
                .add(&SecretToken::new("p-1", variable_name, b"secret".to_vec(), at(millis)))
                .await
                .unwrap();
        }

        let deleted = store.create_query().older_than(at(5_000)).delete().await.unwrap();

        assert_eq!(deleted, 1);
        let mut remaining: Vec<String> = store
            .create_query()
            .process_instance_id("p-1")
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|token| token.variable_name)
            .collect();
        remaining.sort();
        assert_eq!(remaining, vec!["edge", "new"]);
    }
}
