//! Background jobs

pub mod rebuild_scheduler;

pub use rebuild_scheduler::{run_rebuild_cycle, start_rebuild_scheduler, RebuildSchedulerConfig};
