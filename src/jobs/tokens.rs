/// Token cleaners
///
/// Access token expiry is absolute, so that cleaner compares against the
/// current time. Secret tokens carry a creation time and follow the pass
/// expiration time like the other age-based cleaners.

use crate::jobs::cleaner::{Cleaner, CleanerKind, CleanupPass};
use crate::persistence::{AccessTokenStore, SecretTokenStore};
use async_trait::async_trait;
use chrono::Utc;

pub struct AccessTokensCleaner {
    store: AccessTokenStore,
}

impl AccessTokensCleaner {
    pub fn new(store: AccessTokenStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Cleaner for AccessTokensCleaner {
    fn kind(&self) -> CleanerKind {
        CleanerKind::AccessTokens
    }

    async fn execute(&self, _pass: &CleanupPass) -> anyhow::Result<()> {
        let deleted = self.store.create_query().expires_before(Utc::now()).delete().await?;
        tracing::info!("🗑️ Deleted {} expired access tokens", deleted);
        Ok(())
    }
}

pub struct SecretTokensCleaner {
    store: SecretTokenStore,
}

impl SecretTokensCleaner {
    pub fn new(store: SecretTokenStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Cleaner for SecretTokensCleaner {
    fn kind(&self) -> CleanerKind {
        CleanerKind::SecretTokens
    }

    async fn execute(&self, pass: &CleanupPass) -> anyhow::Result<()> {
        let deleted = self
            .store
            .create_query()
            .older_than(pass.expiration_time())
            .delete()
            .await?;
        tracing::info!("🗑️ Deleted {} secret tokens older than {}", deleted, pass.expiration_time());
        Ok(())
    }
}
