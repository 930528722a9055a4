//! Recovery plans, execution and backup validation.

mod manager;

pub use manager::{filter_resources, RecoveryManager, RecoveryOutcome, ValidationReport};
