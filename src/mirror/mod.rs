// ABOUTME: One-way folder mirroring: listing, reconciliation, change logging, scheduling
// ABOUTME: Keeps a replica directory tree in sync with a source tree on a polling interval

pub mod fs_ops;
pub mod lister;
pub mod logger;
pub mod path_key;
pub mod reconciler;
pub mod report;
pub mod scheduler;

pub use fs_ops::copy_preserving_mtime;
pub use lister::{list_dirs_deepest_first, list_files};
pub use logger::{format_record, ChangeLogger, FileSink, MemorySink, RecordSink};
pub use path_key::PathKey;
pub use reconciler::{ReconcileConfig, Reconciler};
pub use report::{ChangeReport, ReportSummary};
pub use scheduler::{ErrorPolicy, RunSummary, SchedulerConfig, SchedulerState, SyncScheduler};
