/// Cached OAuth access tokens

use crate::persistence::error::Result;
use crate::persistence::query::{from_millis, to_millis, Comparison, QueryCriteria};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

const TABLE: &str = "access_token";
const COLUMNS: &str = "id, value, username, expires_at";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessToken {
    pub id: Option<i64>,
    pub value: String,
    pub username: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn new(value: impl Into<String>, username: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            id: None,
            value: value.into(),
            username: username.into(),
            expires_at,
        }
    }

    fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: Some(row.try_get("id")?),
            value: row.try_get("value")?,
            username: row.try_get("username")?,
            expires_at: from_millis(row.try_get("expires_at")?)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct AccessTokenStore {
    pool: SqlitePool,
}

impl AccessTokenStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn add(&self, token: &AccessToken) -> Result<i64> {
        let result = sqlx::query("INSERT INTO access_token (value, username, expires_at) VALUES (?, ?, ?)")
            .bind(&token.value)
            .bind(&token.username)
            .bind(to_millis(token.expires_at))
            .execute(&self.pool)
            .await?;

        Ok(result.last_insert_rowid())
    }

    pub fn create_query(&self) -> AccessTokenQuery {
        AccessTokenQuery {
            pool: self.pool.clone(),
            criteria: QueryCriteria::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AccessTokenQuery {
    pool: SqlitePool,
    criteria: QueryCriteria,
}

impl AccessTokenQuery {
    pub fn id(mut self, id: i64) -> Self {
        self.criteria.equal("id", id);
        self
    }

    pub fn username(mut self, username: &str) -> Self {
        self.criteria.equal("username", username);
        self
    }

    pub fn expires_before(mut self, timestamp: DateTime<Utc>) -> Self {
        self.criteria.compare("expires_at", Comparison::LessThan, timestamp);
        self
    }

    pub async fn list(self) -> Result<Vec<AccessToken>> {
        let rows = self
            .criteria
            .select(TABLE, COLUMNS)
            .build()
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(AccessToken::from_row).collect()
    }

    pub async fn single_result(self) -> Result<Option<AccessToken>> {
        let row = self
            .criteria
            .select(TABLE, COLUMNS)
            .build()
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(AccessToken::from_row).transpose()
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

    #[tokio::test]
    async fn expired_tokens_are_deleted() {
        let database = Database::connect_in_memory().await.unwrap();
        let store = AccessTokenStore::new(database.pool());
        let now = Utc::now();
        store
            .add(&AccessToken::new("old", "alice", now - chrono::Duration::minutes(1)))
            .await
            .unwrap();
        store
            .add(&AccessToken::new("new", "alice", now + chrono::Duration::hours(1)))
            .await
            .unwrap();

        let deleted = store.create_query().expires_before(now).delete().await.unwrap();

        assert_eq!(deleted, 1);
        let remaining = store.create_query().username("alice").list().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].value, "new");
    }
}
