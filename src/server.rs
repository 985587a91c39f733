/// Server setup and initialization
///
/// Wires together all components: stores, engine facade, process actions,
/// lock coordination, cleaners and the job scheduler, and exposes the
/// health endpoint.

use crate::{
    audit::TracingAuditLog,
    config::Config,
    engine::{InMemoryProcessEngine, ProcessEngineFacade},
    jobs::{
        AccessTokensCleaner, CleanUpJob, Cleaner, ConfigurationEntrySource, ConfigurationSubscriptionSource,
        FileEntrySource, FilesCleaner, FinishedHistoricProcessesCleaner, HistoricOperationEventsCleaner,
        OperationSource, OperationsCleaner, OrphanedDataCleaner, ProgressMessagesCleaner, SecretTokensCleaner,
    },
    lock::{LockOwnerReclaimer, LockOwnerReporter},
    persistence::{
        AccessTokenStore, ConfigurationEntryStore, ConfigurationSubscriptionStore, Database, FileEntryStore,
        HistoricOperationEventStore, LockOwnerStore, OperationStore, ProgressMessageStore, SecretTokenStore,
    },
    platform::CloudControllerSpaceClient,
    process::{
        ActionServices, AdditionalProcessAction, DeleteErrorProgressMessagesAdditionalProcessAction,
        HistoricOperationEventPersister, ProcessActionRegistry, ProcessConflictPreventer,
        SetRetryPhaseAdditionalProcessAction,
    },
    runtime::{JobSchedulerService, JobSchedules},
    telemetry::TracingOperationMetrics,
};
use anyhow::Result;
use axum::{routing::get, Router};
use std::{path::Path, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// Fully wired control plane
pub struct ControlPlane {
    pub actions: Arc<ProcessActionRegistry>,
    pub cleanup_job: Arc<CleanUpJob>,
    pub scheduler: Arc<JobSchedulerService>,
}

/// Build every component from `config`
pub async fn build_control_plane(config: &Config) -> Result<ControlPlane> {
    ensure_database_directory(&config.database.url)?;
    let database = Database::connect(&config.database.url).await?;
    let pool = database.pool();

    tracing::info!("🗄️ Initializing stores");
    let operations = OperationStore::new(pool.clone());
    let events = HistoricOperationEventStore::new(pool.clone());
    let lock_owners = LockOwnerStore::new(pool.clone());
    let progress_messages = ProgressMessageStore::new(pool.clone());

    tracing::info!(lock_owner = %config.instance.lock_owner, "⚙️ Initializing embedded process engine");
    let engine = ProcessEngineFacade::new(
        Arc::new(InMemoryProcessEngine::new(config.instance.lock_owner.clone())),
        config.engine.abort_timeout,
    );

    let conflict_preventer = ProcessConflictPreventer::new(operations.clone());
    let services = Arc::new(ActionServices {
        engine: engine.clone(),
        operations: operations.clone(),
        events: HistoricOperationEventPersister::new(events.clone()),
        progress_messages: progress_messages.clone(),
        conflict_preventer: conflict_preventer.clone(),
        metrics: Arc::new(TracingOperationMetrics),
    });
    let additional_actions: Vec<Arc<dyn AdditionalProcessAction>> = vec![
        Arc::new(SetRetryPhaseAdditionalProcessAction::new(engine.clone())),
        Arc::new(DeleteErrorProgressMessagesAdditionalProcessAction::new(progress_messages.clone())),
    ];
    let actions = Arc::new(ProcessActionRegistry::new(services, additional_actions));

    tracing::info!("🧹 Initializing cleaners");
    let spaces = Arc::new(CloudControllerSpaceClient::new(
        config.platform.controller_url.clone(),
        config.platform.token.clone(),
    )?);
    let audit_log = Arc::new(TracingAuditLog);
    let cleaners: Vec<Arc<dyn Cleaner>> = vec![
        Arc::new(
            OperationsCleaner::new(operations.clone(), Arc::clone(&actions), conflict_preventer)
                .with_page_size(config.cleanup.page_size),
        ),
        Arc::new(ProgressMessagesCleaner::new(progress_messages)),
        Arc::new(HistoricOperationEventsCleaner::new(events)),
        Arc::new(FilesCleaner::new(FileEntryStore::new(pool.clone()))),
        Arc::new(
            FinishedHistoricProcessesCleaner::new(engine.clone())
                .with_page_size(config.cleanup.page_size)
                .with_worker_count(config.cleanup.worker_count),
        ),
        Arc::new(AccessTokensCleaner::new(AccessTokenStore::new(pool.clone()))),
        Arc::new(SecretTokensCleaner::new(SecretTokenStore::new(pool.clone()))),
        Arc::new(OrphanedDataCleaner::new(
            ConfigurationEntrySource::new(ConfigurationEntryStore::new(pool.clone())),
            spaces.clone(),
            audit_log.clone(),
        )),
        Arc::new(OrphanedDataCleaner::new(
            ConfigurationSubscriptionSource::new(ConfigurationSubscriptionStore::new(pool.clone())),
            spaces.clone(),
            audit_log.clone(),
        )),
        Arc::new(OrphanedDataCleaner::new(
            OperationSource::new(operations.clone()),
            spaces.clone(),
            audit_log.clone(),
        )),
        Arc::new(OrphanedDataCleaner::new(
            FileEntrySource::new(FileEntryStore::new(pool)),
            spaces,
            audit_log,
        )),
    ];
    let max_ttl = chrono::Duration::from_std(config.cleanup.max_ttl_for_old_data)?;
    let cleanup_job = Arc::new(CleanUpJob::new(config.instance.index, max_ttl, cleaners));

    tracing::info!("🔒 Initializing lock owner coordination");
    let reporter = Arc::new(LockOwnerReporter::new(engine.clone(), lock_owners.clone()));
    let reclaimer = Arc::new(LockOwnerReclaimer::new(
        engine,
        lock_owners,
        chrono::Duration::from_std(config.lock_owner.stale_after)?,
    ));

    tracing::info!("⏰ Initializing job scheduler service");
    let scheduler = Arc::new(
        JobSchedulerService::new(
            JobSchedules {
                cleanup_cron: config.cleanup.cron.clone(),
                lock_owner_report_interval: config.lock_owner.report_interval,
                lock_owner_reclaim_interval: config.lock_owner.reclaim_interval,
            },
            Arc::clone(&cleanup_job),
            reporter,
            reclaimer,
        )
        .await
        .map_err(|e| anyhow::anyhow!("Failed to initialize job scheduler: {}", e))?,
    );

    Ok(ControlPlane {
        actions,
        cleanup_job,
        scheduler,
    })
}

/// Create the Axum application and start the background jobs
pub async fn create_app(config: Config) -> Result<Router> {
    let control_plane = build_control_plane(&config).await?;

    tracing::info!("🚀 Starting job scheduler");
    let scheduler = Arc::clone(&control_plane.scheduler);
    tokio::spawn(async move {
        if let Err(e) = scheduler.start().await {
            tracing::error!("❌ Failed to start job scheduler: {}", e);
        }
    });

    let app = Router::new().route("/healthz", get(health_check));

    tracing::info!("✅ Application initialized successfully");
    Ok(app)
}

/// Start the HTTP server with the given configuration
pub async fn start_server(config: Config) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_thread_ids(true)
        .with_level(true)
        .init();

    tracing::info!(instance_index = config.instance.index, "Starting MTA control plane...");

    let app = create_app(config.clone()).await?;

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&bind_addr).await?;
    tracing::info!("Server listening on http://{}", bind_addr);

    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

/// Create the parent directory of a file-backed SQLite url
fn ensure_database_directory(url: &str) -> Result<()> {
    let Some(path) = url.strip_prefix("sqlite://").or_else(|| url.strip_prefix("sqlite:")) else {
        return Ok(());
    };
    if path.starts_with(":memory:") {
        return Ok(());
    }

    let path = path.split('?').next().unwrap_or(path);
    if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
        tracing::info!("📁 Ensuring database directory exists: {}", parent.display());
        std::fs::create_dir_all(parent)
            .map_err(|e| anyhow::anyhow!("Failed to create database directory: {}", e))?;
    }
    Ok(())
}

async fn health_check() -> &'static str {
    "ok"
}
