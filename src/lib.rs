// ABOUTME: Library entry point for folder-replicator
// ABOUTME: Exposes mirror reconciliation, change logging, scheduling and config modules

pub mod config;
pub mod daemon;
pub mod error;
pub mod mirror;
pub mod utils;

pub use error::MirrorError;
pub use mirror::{
    ChangeLogger, ChangeReport, ErrorPolicy, PathKey, ReconcileConfig, Reconciler,
    SchedulerConfig, SyncScheduler,
};
