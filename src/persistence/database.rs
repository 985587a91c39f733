/// Database bootstrap for the control plane
///
/// Creates the SQLite connection pool shared by every store and initializes
/// the schema. All instances of the service point at the same database; the
/// schema statements are idempotent so any instance may run them on startup.

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

/// Pool factory and schema owner
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connect to the database at `url`, creating the file if missing
    pub async fn connect(url: &str) -> Result<Self> {
        tracing::info!("🗄️ Connecting to control plane database: {}", url);

        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| anyhow::anyhow!("Invalid database url '{}': {}", url, e))?
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await?;

        let database = Self { pool };
        database.init_schema().await?;

        tracing::info!("✅ Control plane database ready");
        Ok(database)
    }

    /// Private in-memory database (single connection, so every query sees the same data)
    pub async fn connect_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        let database = Self { pool };
        database.init_schema().await?;
        Ok(database)
    }

    pub fn pool(&self) -> SqlitePool {
        self.pool.clone()
    }

    /// Create all tables and indexes
    ///
    /// Safe to call multiple times (uses IF NOT EXISTS).
    pub async fn init_schema(&self) -> Result<()> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS operation (
                process_id TEXT PRIMARY KEY,
                process_type TEXT,
                mta_id TEXT,
                space_id TEXT NOT NULL,
                username TEXT,
                started_at INTEGER NOT NULL,
                ended_at INTEGER,
                state TEXT,
                acquired_lock INTEGER NOT NULL DEFAULT 0
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_operation_started_at ON operation(started_at)",
            "CREATE INDEX IF NOT EXISTS idx_operation_space_id ON operation(space_id)",
            r#"
            CREATE TABLE IF NOT EXISTS historic_operation_event (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                process_id TEXT NOT NULL,
                event_type TEXT NOT NULL,
                timestamp INTEGER NOT NULL
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_historic_event_process_id ON historic_operation_event(process_id)",
            r#"
            CREATE TABLE IF NOT EXISTS lock_owner (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                lock_owner TEXT NOT NULL UNIQUE,
                timestamp INTEGER NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS progress_message (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                process_id TEXT NOT NULL,
                task_id TEXT NOT NULL,
                message_type TEXT NOT NULL,
                text TEXT NOT NULL,
                timestamp INTEGER NOT NULL
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_progress_message_process_id ON progress_message(process_id)",
            r#"
            CREATE TABLE IF NOT EXISTS configuration_entry (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                provider_nid TEXT NOT NULL,
                provider_id TEXT NOT NULL,
                version TEXT NOT NULL,
                space_id TEXT NOT NULL,
                content TEXT
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_configuration_entry_space_id ON configuration_entry(space_id)",
            r#"
            CREATE TABLE IF NOT EXISTS configuration_subscription (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                mta_id TEXT NOT NULL,
                space_id TEXT NOT NULL,
                app_name TEXT NOT NULL,
                resource_name TEXT NOT NULL
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_configuration_subscription_space_id ON configuration_subscription(space_id)",
            r#"
            CREATE TABLE IF NOT EXISTS access_token (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                value TEXT NOT NULL,
                username TEXT NOT NULL,
                expires_at INTEGER NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS file_entry (
                id TEXT PRIMARY KEY,
                space TEXT NOT NULL,
                name TEXT NOT NULL,
                size INTEGER NOT NULL,
                modified INTEGER NOT NULL
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_file_entry_space ON file_entry(space)",
            r#"
            CREATE TABLE IF NOT EXISTS secret_token (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                process_instance_id TEXT NOT NULL,
                variable_name TEXT NOT NULL,
                content BLOB NOT NULL,
                timestamp INTEGER NOT NULL
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_secret_token_timestamp ON secret_token(timestamp)",
        ];

        for statement in statements {
            sqlx::query(statement).execute(&self.pool).await?;
        }

        Ok(())
    }
}
