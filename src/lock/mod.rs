/// Lock Owner Coordination
///
/// Every instance heartbeats its engine lock owner identity and every
/// instance reclaims owners that stopped heartbeating. Neither routine
/// arbitrates ownership; the workflow engine does that.

// Periodic heartbeat
pub mod reporter;

// Stale owner cleanup
pub mod reclaimer;

pub use reclaimer::LockOwnerReclaimer;
pub use reporter::LockOwnerReporter;
