mod common;

use chrono::Duration;
use common::Harness;
use mta_control::{
    jobs::CleanUpJob,
    lock::{LockOwnerReclaimer, LockOwnerReporter},
    runtime::{JobSchedulerService, JobSchedules},
};
use std::{sync::Arc, time::Duration as StdDuration};

async fn scheduler(harness: &Harness, cleanup_cron: &str) -> JobSchedulerService {
    JobSchedulerService::new(
        JobSchedules {
            cleanup_cron: cleanup_cron.to_string(),
            lock_owner_report_interval: StdDuration::from_secs(300),
            lock_owner_reclaim_interval: StdDuration::from_secs(360),
        },
        Arc::new(CleanUpJob::new(0, Duration::days(5), Vec::new())),
        Arc::new(LockOwnerReporter::new(harness.facade.clone(), harness.lock_owners.clone())),
        Arc::new(LockOwnerReclaimer::new(
            harness.facade.clone(),
            harness.lock_owners.clone(),
            Duration::minutes(6),
        )),
    )
    .await
    .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn start_registers_every_periodic_job() {
    let harness = Harness::new().await;
    let service = scheduler(&harness, "0 0 */6 * * *").await;

    service.start().await.unwrap();

    assert_eq!(
        service.registered_jobs().await,
        vec!["cleanup", "lock-owner-reclaimer", "lock-owner-reporter"]
    );
    assert!(service.remove_job("lock-owner-reclaimer").await.unwrap());
    assert!(!service.remove_job("lock-owner-reclaimer").await.unwrap());

    service.stop().await.unwrap();
    assert!(service.registered_jobs().await.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn invalid_cron_expression_fails_start() {
    let harness = Harness::new().await;
    let service = scheduler(&harness, "every six hours").await;

    assert!(service.start().await.is_err());
}
