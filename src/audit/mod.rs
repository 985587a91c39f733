/// Audit Log
///
/// Records deletions of space data that happen without a user request
/// (orphaned entries, subscriptions, operations and files removed by the
/// cleanup engine).

use crate::persistence::AuditableConfiguration;
use std::sync::Mutex;

pub trait AuditLog: Send + Sync {
    fn log_config_delete(&self, configuration: &dyn AuditableConfiguration);
}

/// Writes audit entries on the `audit` tracing target
#[derive(Debug, Default, Clone)]
pub struct TracingAuditLog;

impl AuditLog for TracingAuditLog {
    fn log_config_delete(&self, configuration: &dyn AuditableConfiguration) {
        let identifiers = configuration
            .configuration_identifiers()
            .iter()
            .map(|identifier| format!("{}={}", identifier.name, identifier.value))
            .collect::<Vec<_>>()
            .join(", ");

        tracing::info!(
            target: "audit",
            configuration_type = configuration.configuration_type(),
            configuration_name = %configuration.configuration_name(),
            identifiers = %identifiers,
            "Configuration deleted"
        );
    }
}

/// Deleted configuration as captured by `RecordingAuditLog`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRecord {
    pub configuration_type: String,
    pub configuration_name: String,
}

/// Keeps audit entries in memory
#[derive(Debug, Default)]
pub struct RecordingAuditLog {
    records: Mutex<Vec<AuditRecord>>,
}

impl RecordingAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

impl AuditLog for RecordingAuditLog {
    fn log_config_delete(&self, configuration: &dyn AuditableConfiguration) {
        let record = AuditRecord {
            configuration_type: configuration.configuration_type().to_string(),
            configuration_name: configuration.configuration_name(),
        };
        match self.records.lock() {
            Ok(mut records) => records.push(record),
            Err(poisoned) => poisoned.into_inner().push(record),
        }
    }
}
