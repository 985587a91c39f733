/// Runtime Scheduling
///
/// Drives the periodic routines of the control plane (cleanup, lock owner
/// heartbeat and reclaim) from a tokio-cron-scheduler instance.

// Background job scheduler service
pub mod scheduler;

pub use scheduler::{JobSchedulerService, JobSchedules};
