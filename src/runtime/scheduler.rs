/// Background job scheduler service
///
/// Registers the control plane's periodic routines with tokio-cron-scheduler:
/// the cleanup job on a cron expression, and the lock owner reporter and
/// reclaimer on fixed intervals. Every instance registers every job; the
/// cleanup job itself decides whether this instance is the designated one.

use crate::jobs::CleanUpJob;
use crate::lock::{LockOwnerReclaimer, LockOwnerReporter};
use anyhow::Result;
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::sync::RwLock;
use tokio_cron_scheduler::{Job, JobScheduler};
use uuid::Uuid;

pub const CLEANUP_JOB: &str = "cleanup";
pub const LOCK_OWNER_REPORTER_JOB: &str = "lock-owner-reporter";
pub const LOCK_OWNER_RECLAIMER_JOB: &str = "lock-owner-reclaimer";

/// Schedules for the periodic routines
#[derive(Debug, Clone)]
pub struct JobSchedules {
    pub cleanup_cron: String,
    pub lock_owner_report_interval: Duration,
    pub lock_owner_reclaim_interval: Duration,
}

pub struct JobSchedulerService {
    scheduler: Arc<RwLock<JobScheduler>>,
    job_uuid_map: Arc<RwLock<HashMap<String, Uuid>>>, // Job name -> scheduler UUID, for removal
    schedules: JobSchedules,
    cleanup_job: Arc<CleanUpJob>,
    reporter: Arc<LockOwnerReporter>,
    reclaimer: Arc<LockOwnerReclaimer>,
}

impl JobSchedulerService {
    pub async fn new(
        schedules: JobSchedules,
        cleanup_job: Arc<CleanUpJob>,
        reporter: Arc<LockOwnerReporter>,
        reclaimer: Arc<LockOwnerReclaimer>,
    ) -> Result<Self> {
        let scheduler = JobScheduler::new().await?;

        Ok(Self {
            scheduler: Arc::new(RwLock::new(scheduler)),
            job_uuid_map: Arc::new(RwLock::new(HashMap::new())),
            schedules,
            cleanup_job,
            reporter,
            reclaimer,
        })
    }

    /// Register all jobs and start ticking
    pub async fn start(&self) -> Result<()> {
        tracing::info!("⏰ Starting job scheduler service");

        self.register_cleanup_job().await?;
        self.register_lock_owner_reporter().await?;
        self.register_lock_owner_reclaimer().await?;

        {
            let scheduler = self.scheduler.read().await;
            scheduler.start().await?;
        }

        tracing::info!("✅ Job scheduler started with {} jobs", self.job_uuid_map.read().await.len());
        Ok(())
    }

    pub async fn stop(&self) -> Result<()> {
        tracing::info!("⏹️ Stopping job scheduler service");

        {
            let mut job_uuid_map = self.job_uuid_map.write().await;
            job_uuid_map.clear();
        }

        {
            let mut scheduler = self.scheduler.write().await;
            scheduler.shutdown().await?;
        }

        tracing::info!("✅ Job scheduler stopped");
        Ok(())
    }

    /// Names of the registered jobs
    pub async fn registered_jobs(&self) -> Vec<String> {
        let mut names: Vec<String> = self.job_uuid_map.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Remove a job by name; false if no such job is registered
    pub async fn remove_job(&self, name: &str) -> Result<bool> {
        let Some(job_uuid) = self.job_uuid_map.write().await.remove(name) else {
            return Ok(false);
        };

        let scheduler = self.scheduler.read().await;
        scheduler.remove(&job_uuid).await?;
        tracing::debug!("🛑 Removed job from scheduler: {}", name);
        Ok(true)
    }

    async fn register_cleanup_job(&self) -> Result<()> {
        let cleanup_job = Arc::clone(&self.cleanup_job);

        let job = Job::new_async(self.schedules.cleanup_cron.as_str(), move |_uuid, _l| {
            let cleanup_job = Arc::clone(&cleanup_job);
            Box::pin(async move {
                tracing::debug!("🔔 Cleanup trigger activated");
                cleanup_job.run().await;
            })
        })?;

        self.track(CLEANUP_JOB, job).await?;
        tracing::info!("📅 Registered cleanup job: {}", self.schedules.cleanup_cron);
        Ok(())
    }

    async fn register_lock_owner_reporter(&self) -> Result<()> {
        let reporter = Arc::clone(&self.reporter);

        let job = Job::new_repeated_async(self.schedules.lock_owner_report_interval, move |_uuid, _l| {
            let reporter = Arc::clone(&reporter);
            Box::pin(async move {
                if let Err(e) = reporter.report().await {
                    tracing::error!("❌ Reporting lock owner failed: {:#}", e);
                }
            })
        })?;

        self.track(LOCK_OWNER_REPORTER_JOB, job).await?;
        tracing::info!(
            "📅 Registered lock owner reporter every {:?}",
            self.schedules.lock_owner_report_interval
        );
        Ok(())
    }

    async fn register_lock_owner_reclaimer(&self) -> Result<()> {
        let reclaimer = Arc::clone(&self.reclaimer);

        let job = Job::new_repeated_async(self.schedules.lock_owner_reclaim_interval, move |_uuid, _l| {
            let reclaimer = Arc::clone(&reclaimer);
            Box::pin(async move {
                if let Err(e) = reclaimer.reclaim().await {
                    tracing::error!("❌ Reclaiming stale lock owners failed: {:#}", e);
                }
            })
        })?;

        self.track(LOCK_OWNER_RECLAIMER_JOB, job).await?;
        tracing::info!(
            "📅 Registered lock owner reclaimer every {:?}",
            self.schedules.lock_owner_reclaim_interval
        );
        Ok(())
    }

    /// Add `job` to the scheduler, replacing any job registered under `name`
    async fn track(&self, name: &str, job: Job) -> Result<()> {
        self.remove_job(name).await?;

        let job_uuid = {
            let scheduler = self.scheduler.write().await;
            scheduler.add(job).await?
        };

        self.job_uuid_map.write().await.insert(name.to_string(), job_uuid);
        tracing::debug!("📝 Tracked job UUID for: {}", name);
        Ok(())
    }
}
