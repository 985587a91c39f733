/// Configuration management for the MTA control plane
///
/// Server, database, instance identity, cleanup retention, lock owner
/// coordination, engine and platform settings. Every value can be
/// overridden through an environment variable; unparseable values fall back
/// to the default.

use serde::{Deserialize, Serialize};
use std::{str::FromStr, time::Duration};
use uuid::Uuid;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub instance: InstanceConfig,
    pub cleanup: CleanupConfig,
    pub lock_owner: LockOwnerConfig,
    pub engine: EngineConfig,
    pub platform: PlatformConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server bind address (e.g., "0.0.0.0")
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite url shared by all instances
    pub url: String,
}

/// Identity of this service instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceConfig {
    /// Externally assigned replica index; 0 runs the cleanup job
    pub index: u32,
    /// Lock owner identity this instance's engine runs jobs under
    pub lock_owner: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupConfig {
    /// Six-field cron expression (with seconds)
    pub cron: String,
    pub max_ttl_for_old_data: Duration,
    pub page_size: usize,
    /// Parallel deletions of finished engine history
    pub worker_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockOwnerConfig {
    pub report_interval: Duration,
    pub reclaim_interval: Duration,
    /// Heartbeat age after which an owner counts as dead
    pub stale_after: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Upper bound on retrying optimistic-locking conflicts during abort
    pub abort_timeout: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    pub controller_url: String,
    pub token: Option<String>,
}

impl Default for Config {
    /// Default configuration with ENV_VAR support for container deployment
    fn default() -> Self {
        let index = env_or("CF_INSTANCE_INDEX", 0);

        Self {
            server: ServerConfig {
                host: std::env::var("MTA_CONTROL_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env_or("MTA_CONTROL_PORT", 3004),
            },
            database: DatabaseConfig {
                url: std::env::var("MTA_CONTROL_DATABASE_URL")
                    .unwrap_or_else(|_| "sqlite://data/mta-control.db".to_string()),
            },
            instance: InstanceConfig {
                index,
                lock_owner: std::env::var("MTA_CONTROL_LOCK_OWNER")
                    .unwrap_or_else(|_| format!("mta-control-{}-{}", index, Uuid::new_v4())),
            },
            cleanup: CleanupConfig {
                cron: std::env::var("MTA_CONTROL_CLEANUP_CRON").unwrap_or_else(|_| "0 0 */6 * * *".to_string()),
                max_ttl_for_old_data: env_seconds_or("MTA_CONTROL_MAX_TTL_FOR_OLD_DATA", 432_000),
                page_size: env_or("MTA_CONTROL_CLEANUP_PAGE_SIZE", 100),
                worker_count: env_or("MTA_CONTROL_CLEANUP_WORKERS", 4),
            },
            lock_owner: LockOwnerConfig {
                report_interval: env_seconds_or("MTA_CONTROL_LOCK_REPORT_INTERVAL", 300),
                reclaim_interval: env_seconds_or("MTA_CONTROL_LOCK_RECLAIM_INTERVAL", 360),
                stale_after: env_seconds_or("MTA_CONTROL_LOCK_STALE_AFTER", 360),
            },
            engine: EngineConfig {
                abort_timeout: env_seconds_or("MTA_CONTROL_ABORT_TIMEOUT", 90),
            },
            platform: PlatformConfig {
                controller_url: std::env::var("MTA_CONTROL_CONTROLLER_URL")
                    .unwrap_or_else(|_| "http://localhost:8080".to_string()),
                token: std::env::var("MTA_CONTROL_CONTROLLER_TOKEN").ok(),
            },
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

fn env_seconds_or(name: &str, default_seconds: u64) -> Duration {
    Duration::from_secs(env_or(name, default_seconds))
}
