/// Configuration entries and subscriptions
///
/// Cross-MTA configuration published by providers (entries) and the
/// consumers bound to them (subscriptions). Both are scoped to a platform
/// space and become orphaned when that space is deleted.

use crate::persistence::error::Result;
use crate::persistence::query::QueryCriteria;
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

/// Named attribute identifying an audited configuration record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigurationIdentifier {
    pub name: String,
    pub value: String,
}

impl ConfigurationIdentifier {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A configuration record whose deletion must be written to the audit log
pub trait AuditableConfiguration {
    /// Human readable kind, e.g. "configuration entry"
    fn configuration_type(&self) -> &'static str;

    fn configuration_name(&self) -> String;

    fn configuration_identifiers(&self) -> Vec<ConfigurationIdentifier>;
}

// ============================================================================
// Configuration entries
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationEntry {
    pub id: Option<i64>,
    pub provider_nid: String,
    pub provider_id: String,
    pub version: String,
    pub space_id: String,
    pub content: Option<String>,
}

impl ConfigurationEntry {
    pub fn new(
        provider_nid: impl Into<String>,
        provider_id: impl Into<String>,
        version: impl Into<String>,
        space_id: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            provider_nid: provider_nid.into(),
            provider_id: provider_id.into(),
            version: version.into(),
            space_id: space_id.into(),
            content: None,
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: Some(row.try_get("id")?),
            provider_nid: row.try_get("provider_nid")?,
            provider_id: row.try_get("provider_id")?,
            version: row.try_get("version")?,
            space_id: row.try_get("space_id")?,
            content: row.try_get("content")?,
        })
    }
}

impl AuditableConfiguration for ConfigurationEntry {
    fn configuration_type(&self) -> &'static str {
        "configuration entry"
    }

    fn configuration_name(&self) -> String {
        self.provider_id.clone()
    }

    fn configuration_identifiers(&self) -> Vec<ConfigurationIdentifier> {
        vec![
            ConfigurationIdentifier::new("provider namespace", &self.provider_nid),
            ConfigurationIdentifier::new("provider version", &self.version),
            ConfigurationIdentifier::new("space id", &self.space_id),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct ConfigurationEntryStore {
    pool: SqlitePool,
}

impl ConfigurationEntryStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn add(&self, entry: &ConfigurationEntry) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO configuration_entry (provider_nid, provider_id, version, space_id, content)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.provider_nid)
        .bind(&entry.provider_id)
        .bind(&entry.version)
        .bind(&entry.space_id)
        .bind(&entry.content)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub fn create_query(&self) -> ConfigurationEntryQuery {
        ConfigurationEntryQuery {
            pool: self.pool.clone(),
            criteria: QueryCriteria::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConfigurationEntryQuery {
    pool: SqlitePool,
    criteria: QueryCriteria,
}

impl ConfigurationEntryQuery {
    pub fn id(mut self, id: i64) -> Self {
        self.criteria.equal("id", id);
        self
    }

    pub fn provider_id(mut self, provider_id: &str) -> Self {
        self.criteria.equal("provider_id", provider_id);
        self
    }

    pub fn space_id(mut self, space_id: &str) -> Self {
        self.criteria.equal("space_id", space_id);
        self
    }

    pub async fn list(self) -> Result<Vec<ConfigurationEntry>> {
        let rows = self
            .criteria
            .select("configuration_entry", "*")
            .build()
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(ConfigurationEntry::from_row).collect()
    }

    pub async fn single_result(self) -> Result<Option<ConfigurationEntry>> {
        let row = self
            .criteria
            .select("configuration_entry", "*")
            .build()
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(ConfigurationEntry::from_row).transpose()
    }

    pub async fn delete(self) -> Result<u64> {
        let result = self
            .criteria
            .delete("configuration_entry")
            .build()
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

// ============================================================================
// Configuration subscriptions
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationSubscription {
    pub id: Option<i64>,
    pub mta_id: String,
    pub space_id: String,
    pub app_name: String,
    pub resource_name: String,
}

impl ConfigurationSubscription {
    pub fn new(
        mta_id: impl Into<String>,
        space_id: impl Into<String>,
        app_name: impl Into<String>,
        resource_name: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            mta_id: mta_id.into(),
            space_id: space_id.into(),
            app_name: app_name.into(),
            resource_name: resource_name.into(),
        }
    }

    fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: Some(row.try_get("id")?),
            mta_id: row.try_get("mta_id")?,
            space_id: row.try_get("space_id")?,
            app_name: row.try_get("app_name")?,
            resource_name: row.try_get("resource_name")?,
        })
    }
}

impl AuditableConfiguration for ConfigurationSubscription {
    fn configuration_type(&self) -> &'static str {
        "configuration subscription"
    }

    fn configuration_name(&self) -> String {
        self.id.map(|id| id.to_string()).unwrap_or_default()
    }

    fn configuration_identifiers(&self) -> Vec<ConfigurationIdentifier> {
        vec![
            ConfigurationIdentifier::new("mta id", &self.mta_id),
            ConfigurationIdentifier::new("application name", &self.app_name),
            ConfigurationIdentifier::new("space id", &self.space_id),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct ConfigurationSubscriptionStore {
    pool: SqlitePool,
}

impl ConfigurationSubscriptionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn add(&self, subscription: &ConfigurationSubscription) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO configuration_subscription (mta_id, space_id, app_name, resource_name)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&subscription.mta_id)
        .bind(&subscription.space_id)
        .bind(&subscription.app_name)
        .bind(&subscription.resource_name)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub fn create_query(&self) -> ConfigurationSubscriptionQuery {
        ConfigurationSubscriptionQuery {
            pool: self.pool.clone(),
            criteria: QueryCriteria::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConfigurationSubscriptionQuery {
    pool: SqlitePool,
    criteria: QueryCriteria,
}

impl ConfigurationSubscriptionQuery {
    pub fn id(mut self, id: i64) -> Self {
        self.criteria.equal("id", id);
        self
    }

    pub fn mta_id(mut self, mta_id: &str) -> Self {
        self.criteria.equal("mta_id", mta_id);
        self
    }

    pub fn space_id(mut self, space_id: &str) -> Self {
        self.criteria.equal("space_id", space_id);
        self
    }

    pub async fn list(self) -> Result<Vec<ConfigurationSubscription>> {
        let rows = self
            .criteria
            .select("configuration_subscription", "*")
            .build()
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(ConfigurationSubscription::from_row).collect()
    }

    pub async fn single_result(self) -> Result<Option<ConfigurationSubscription>> {
        let row = self
            .criteria
            .select("configuration_subscription", "*")
            .build()
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(ConfigurationSubscription::from_row).transpose()
    }

    pub async fn delete(self) -> Result<u64> {
        let result = self
            .criteria
            .delete("configuration_subscription")
            .build()
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::Database;

    #[tokio::test]
    async fn entries_are_deleted_per_space() {
        let database = Database::connect_in_memory().await.unwrap();
        let store = ConfigurationEntryStore::new(database.pool());
        store
            .add(&ConfigurationEntry::new("mta", "provider:a", "1.0.0", "space-a").with_content("{}"))
            .await
            .unwrap();
        store
            .add(&ConfigurationEntry::new("mta", "provider:b", "1.0.0", "space-b"))
            .await
            .unwrap();

        let deleted = store.create_query().space_id("space-b").delete().await.unwrap();

        assert_eq!(deleted, 1);
        let remaining = store.create_query().list().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].content.as_deref(), Some("{}"));
    }

    #[tokio::test]
    async fn subscription_is_audited_by_generated_id() {
        let database = Database::connect_in_memory().await.unwrap();
        let store = ConfigurationSubscriptionStore::new(database.pool());
        let id = store
            .add(&ConfigurationSubscription::new("mta", "space-a", "app", "resource"))
            .await
            .unwrap();

        let subscription = store.create_query().id(id).single_result().await.unwrap().unwrap();

        assert_eq!(subscription.configuration_type(), "configuration subscription");
        assert_eq!(subscription.configuration_name(), id.to_string());
        assert!(subscription
            .configuration_identifiers()
            .contains(&ConfigurationIdentifier::new("space id", "space-a")));
    }
}
