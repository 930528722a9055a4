//! Backup jobs, execution, retention and scheduling.

mod manager;

pub use manager::{BackupManager, BackupOutcome};
