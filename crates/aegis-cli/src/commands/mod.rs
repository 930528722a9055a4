pub mod backup;
pub mod context;
pub mod describe;
pub mod job;
pub mod output;
pub mod plan;
pub mod recover;
pub mod retention;
pub mod schedule;
pub mod scheduler;
pub mod validate;
