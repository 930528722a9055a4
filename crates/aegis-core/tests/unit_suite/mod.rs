//! Behavioural tests for aegis-core.

pub mod backup;
pub mod helpers;
pub mod recovery;
pub mod schedule;
