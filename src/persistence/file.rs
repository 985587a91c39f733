/// Uploaded file metadata

use crate::persistence::configuration::{AuditableConfiguration, ConfigurationIdentifier};
use crate::persistence::error::{Result, StoreError};
use crate::persistence::query::{from_millis, to_millis, Comparison, QueryCriteria};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

const TABLE: &str = "file_entry";
const COLUMNS: &str = "id, space, name, size, modified";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    pub id: String,
    pub space: String,
    pub name: String,
    pub size: i64,
    pub modified: DateTime<Utc>,
}

impl FileEntry {
    fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            space: row.try_get("space")?,
            name: row.try_get("name")?,
            size: row.try_get("size")?,
            modified: from_millis(row.try_get("modified")?)?,
        })
    }
}

impl AuditableConfiguration for FileEntry {
    fn configuration_type(&self) -> &'static str {
        "file"
    }

    fn configuration_name(&self) -> String {
        self.name.clone()
    }

    fn configuration_identifiers(&self) -> Vec<ConfigurationIdentifier> {
        vec![
            ConfigurationIdentifier::new("file id", &self.id),
            ConfigurationIdentifier::new("space id", &self.space),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct FileEntryStore {
    pool: SqlitePool,
}

impl FileEntryStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn add(&self, file: &FileEntry) -> Result<()> {
        sqlx::query("INSERT INTO file_entry (id, space, name, size, modified) VALUES (?, ?, ?, ?, ?)")
            .bind(&file.id)
            .bind(&file.space)
            .bind(&file.name)
            .bind(file.size)
            .bind(to_millis(file.modified))
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::from_insert(e, "file", file.id.clone()))?;

        Ok(())
    }

    pub fn create_query(&self) -> FileEntryQuery {
        FileEntryQuery {
            pool: self.pool.clone(),
            criteria: QueryCriteria::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FileEntryQuery {
    pool: SqlitePool,
    criteria: QueryCriteria,
}

impl FileEntryQuery {
    pub fn id(mut self, id: &str) -> Self {
        self.criteria.equal("id", id);
        self
    }

    pub fn space(mut self, space: &str) -> Self {
        self.criteria.equal("space", space);
        self
    }

    pub fn modified_before(mut self, timestamp: DateTime<Utc>) -> Self {
        self.criteria.compare("modified", Comparison::LessThan, timestamp);
        self
    }

    pub async fn list(self) -> Result<Vec<FileEntry>> {
        let rows = self
            .criteria
            .select(TABLE, COLUMNS)
            .build()
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(FileEntry::from_row).collect()
    }

    pub async fn single_result(self) -> Result<Option<FileEntry>> {
        let row = self
            .criteria
            .select(TABLE, COLUMNS)
            .build()
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(FileEntry::from_row).transpose()
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

    fn file(id: &str, modified_millis: i64) -> FileEntry {
        FileEntry {
            id: id.to_string(),
            space: "space-a".to_string(),
            name: format!("{id}.mtar"),
            size: 1024,
            modified: DateTime::from_timestamp_millis(modified_millis).unwrap(),
        }
    }

    #[tokio::test]
    async fn modified_before_selects_stale_files() {
        let database = Database::connect_in_memory().await.unwrap();
        let store = FileEntryStore::new(database.pool());
        store.add(&file("old", 1_000)).await.unwrap();
        store.add(&file("new", 9_000)).await.unwrap();

        let cutoff = DateTime::from_timestamp_millis(5_000).unwrap();
        let stale = store.create_query().space("space-a").modified_before(cutoff).list().await.unwrap();

        assert_eq!(stale, vec![file("old", 1_000)]);
    }
}
