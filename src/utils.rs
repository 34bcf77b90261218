// ABOUTME: Utility functions for validating and resolving mirror roots
// ABOUTME: Guards against a replica that overlaps its source or a log inside either root

use anyhow::{Context, Result};
use std::path::{Component, Path, PathBuf};

use crate::error::MirrorError;

/// Resolve a path to an absolute, normalized form for comparison
///
/// Relative paths are resolved against the current working directory, then
/// `.` and `..` components are folded lexically. The longest existing prefix
/// is canonicalized (resolving symlinks), and any missing tail is appended
/// unchanged, so the replica root can be resolved before it exists.
///
/// # Arguments
///
/// * `path` - Path to resolve; it does not need to exist
///
/// # Returns
///
/// The resolved absolute path.
///
/// # Errors
///
/// Returns an error if the current directory cannot be determined or an
/// existing prefix cannot be canonicalized.
///
/// # Examples
///
/// ```no_run
/// # use folder_replicator::utils::resolve_path;
/// # use anyhow::Result;
/// # fn example() -> Result<()> {
/// let replica = resolve_path("backups/../replica/./docs".as_ref())?;
/// assert!(replica.is_absolute());
/// assert!(replica.ends_with("replica/docs"));
/// # Ok(())
/// # }
/// ```
pub fn resolve_path(path: &Path) -> Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .context("Failed to determine current directory")?
            .join(path)
    };
    let normalized = normalize_lexically(&absolute);

    // Canonicalize the longest prefix that exists
    let mut existing = normalized.as_path();
    let mut missing = Vec::new();
    while !existing.exists() {
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                existing = parent;
            }
            _ => return Ok(normalized),
        }
    }

    let mut resolved = existing
        .canonicalize()
        .with_context(|| format!("Failed to resolve path {}", existing.display()))?;
    resolved.extend(missing.iter().rev());
    Ok(resolved)
}

/// Fold `.` and `..` components without touching the filesystem
///
/// # Examples
///
/// ```
/// # use folder_replicator::utils::normalize_lexically;
/// # use std::path::{Path, PathBuf};
/// assert_eq!(
///     normalize_lexically(Path::new("/data/./a/../b")),
///     PathBuf::from("/data/b")
/// );
/// ```
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Validate that source and replica are distinct, non-nested folders
///
/// This is a critical safety check. A replica inside its source would be
/// listed as source content and copied into itself on every pass; a source
/// inside its replica would be deleted as an orphan by the first pass.
///
/// # Arguments
///
/// * `source` - Source root
/// * `replica` - Replica root
///
/// # Errors
///
/// Returns [`MirrorError::OverlappingRoots`] if the resolved paths are equal
/// or one contains the other.
///
/// # Examples
///
/// ```no_run
/// # use folder_replicator::utils::validate_source_replica_different;
/// # use anyhow::Result;
/// # use std::path::Path;
/// # fn example() -> Result<()> {
/// // Valid - sibling folders
/// validate_source_replica_different(Path::new("/data/source"), Path::new("/data/replica"))?;
///
/// // Invalid - replica nested inside source
/// assert!(validate_source_replica_different(
///     Path::new("/data/source"),
///     Path::new("/data/source/replica")
/// )
/// .is_err());
/// # Ok(())
/// # }
/// ```
pub fn validate_source_replica_different(source: &Path, replica: &Path) -> Result<()> {
    let source_resolved = resolve_path(source)
        .with_context(|| format!("Failed to resolve source path {}", source.display()))?;
    let replica_resolved = resolve_path(replica)
        .with_context(|| format!("Failed to resolve replica path {}", replica.display()))?;

    if source_resolved.starts_with(&replica_resolved)
        || replica_resolved.starts_with(&source_resolved)
    {
        return Err(MirrorError::OverlappingRoots {
            source_root: source_resolved,
            replica_root: replica_resolved,
        }
        .into());
    }

    Ok(())
}

/// Validate that the change log lives outside both mirrored trees
///
/// A log inside the source is itself a source change after every write, so
/// the mirror would never go idle. A log inside the replica is a replica-only
/// file and the next pass deletes it.
///
/// # Errors
///
/// Returns [`MirrorError::LogInsideRoot`] naming the root that contains the
/// resolved log path.
pub fn validate_log_outside_roots(log_file: &Path, source: &Path, replica: &Path) -> Result<()> {
    let log_resolved = resolve_path(log_file)
        .with_context(|| format!("Failed to resolve log file path {}", log_file.display()))?;

    for root in [source, replica] {
        let root_resolved = resolve_path(root)
            .with_context(|| format!("Failed to resolve path {}", root.display()))?;
        if log_resolved.starts_with(&root_resolved) {
            return Err(MirrorError::LogInsideRoot {
                log_file: log_resolved,
                root: root_resolved,
            }
            .into());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_normalize_lexically() {
        assert_eq!(
            normalize_lexically(Path::new("/a/b/../c/./d")),
            PathBuf::from("/a/c/d")
        );
        assert_eq!(normalize_lexically(Path::new("a/../..")), PathBuf::from(".."));
    }

    #[test]
    fn test_resolve_missing_tail() {
        let dir = tempdir().unwrap();
        let resolved = resolve_path(&dir.path().join("not/yet/here")).unwrap();
        let base = dir.path().canonicalize().unwrap();
        assert_eq!(resolved, base.join("not/yet/here"));
    }

    #[test]
    fn test_validate_siblings_ok() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("source")).unwrap();
        assert!(validate_source_replica_different(
            &dir.path().join("source"),
            &dir.path().join("replica")
        )
        .is_ok());
    }

    #[test]
    fn test_validate_same_folder_rejected() {
        let dir = tempdir().unwrap();
        let err = validate_source_replica_different(
            &dir.path().join("x"),
            &dir.path().join("y/../x"),
        )
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MirrorError>(),
            Some(MirrorError::OverlappingRoots { .. })
        ));
    }

    #[test]
    fn test_validate_nested_rejected_both_ways() {
        let dir = tempdir().unwrap();
        let outer = dir.path().join("outer");
        let inner = outer.join("inner");
        assert!(validate_source_replica_different(&outer, &inner).is_err());
        assert!(validate_source_replica_different(&inner, &outer).is_err());
    }

    #[test]
    fn test_validate_prefix_name_is_not_nesting() {
        let dir = tempdir().unwrap();
        assert!(validate_source_replica_different(
            &dir.path().join("data"),
            &dir.path().join("data-replica")
        )
        .is_ok());
    }

    #[test]
    fn test_log_outside_roots_ok() {
        let dir = tempdir().unwrap();
        assert!(validate_log_outside_roots(
            &dir.path().join("logs/sync.log"),
            &dir.path().join("source"),
            &dir.path().join("replica")
        )
        .is_ok());
    }

    #[test]
    fn test_log_inside_either_root_rejected() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("source");
        let replica = dir.path().join("replica");

        for log in [source.join("sync.log"), replica.join("nested/sync.log")] {
            let err = validate_log_outside_roots(&log, &source, &replica).unwrap_err();
            assert!(matches!(
                err.downcast_ref::<MirrorError>(),
                Some(MirrorError::LogInsideRoot { .. })
            ));
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_validate_sees_through_symlinks() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("source");
        fs::create_dir(&source).unwrap();
        std::os::unix::fs::symlink(&source, dir.path().join("alias")).unwrap();
        assert!(
            validate_source_replica_different(&source, &dir.path().join("alias/replica")).is_err()
        );
    }
}
