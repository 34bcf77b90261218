// ABOUTME: Typed configuration errors for folder mirroring
// ABOUTME: Wrapped in anyhow::Error so callers can downcast fatal conditions

use std::path::PathBuf;
use thiserror::Error;

/// Conditions that indicate a misconfigured mirror rather than a transient
/// I/O failure.
///
/// These are returned wrapped in [`anyhow::Error`]; use
/// `err.downcast_ref::<MirrorError>()` to tell them apart from filesystem
/// errors raised during a pass.
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("source folder {} does not exist", .0.display())]
    SourceMissing(PathBuf),

    #[error("source path {} is not a directory", .0.display())]
    SourceNotDirectory(PathBuf),

    #[error("replica path {} exists but is not a directory", .0.display())]
    ReplicaNotDirectory(PathBuf),

    #[error(
        "source {} and replica {} overlap; they must be distinct, non-nested folders",
        source_root.display(),
        replica_root.display()
    )]
    OverlappingRoots {
        source_root: PathBuf,
        replica_root: PathBuf,
    },

    #[error(
        "log file {} is inside mirrored folder {}; it must live outside both roots",
        log_file.display(),
        root.display()
    )]
    LogInsideRoot { log_file: PathBuf, root: PathBuf },
}
