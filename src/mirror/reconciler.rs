// ABOUTME: Reconciler - brings a replica tree in line with its source tree
// ABOUTME: Lists both trees, copies new files, deletes orphans, refreshes stale files, prunes empty dirs

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::fs_ops::{copy_preserving_mtime, is_empty_dir, modified_time};
use super::lister::{list_dirs_deepest_first, list_files};
use super::path_key::PathKey;
use super::report::ChangeReport;
use crate::error::MirrorError;

/// Configuration for reconciliation behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileConfig {
    /// Whether to delete replica files that no longer exist in the source
    /// (false = additive mirror)
    pub delete_orphans: bool,
    /// Whether to remove replica directories left empty after a pass
    pub prune_empty_dirs: bool,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            delete_orphans: true,
            prune_empty_dirs: true,
        }
    }
}

/// Reconciler computes and applies the delta between a source and a replica.
///
/// Every pass starts from fresh listings of both trees, so an interrupted pass
/// is picked up by the next one without any saved state. Each file copy and
/// each delete is a single filesystem operation; a pass as a whole is not
/// transactional.
#[derive(Debug, Clone)]
pub struct Reconciler {
    source_root: PathBuf,
    replica_root: PathBuf,
    config: ReconcileConfig,
}

/// Mutable state for one pass.
struct Pass {
    report: ChangeReport,
    /// Replica files already removed while clearing a type conflict.
    cleared: HashSet<PathKey>,
}

impl Reconciler {
    /// Create a new Reconciler for a source and replica root.
    pub fn new(
        source_root: impl Into<PathBuf>,
        replica_root: impl Into<PathBuf>,
        config: ReconcileConfig,
    ) -> Self {
        Self {
            source_root: source_root.into(),
            replica_root: replica_root.into(),
            config,
        }
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    pub fn replica_root(&self) -> &Path {
        &self.replica_root
    }

    /// Fail with a [`MirrorError`] unless the source root is an existing
    /// directory.
    pub fn check_source(&self) -> Result<()> {
        match fs::metadata(&self.source_root) {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(MirrorError::SourceNotDirectory(self.source_root.clone()).into()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(MirrorError::SourceMissing(self.source_root.clone()).into())
            }
            Err(e) => Err(e).with_context(|| {
                format!("Failed to access source folder {}", self.source_root.display())
            }),
        }
    }

    /// Run one reconciliation pass.
    ///
    /// Phases run in a fixed order:
    /// 1. List both trees
    /// 2. Copy files present only in the source, creating missing parents
    /// 3. Delete files present only in the replica
    /// 4. Re-copy files whose source copy is strictly newer
    /// 5. Remove replica directories that are now empty, deepest first
    ///
    /// Any I/O failure aborts the pass and is returned; changes made before the
    /// failure stay applied.
    pub fn reconcile(&self) -> Result<ChangeReport> {
        self.check_source()?;
        self.prepare_replica()?;

        let source_files = list_files(&self.source_root).context("Failed to list source tree")?;
        let replica_files =
            list_files(&self.replica_root).context("Failed to list replica tree")?;

        let mut pass = Pass {
            report: ChangeReport::default(),
            cleared: HashSet::new(),
        };

        let mut to_add: Vec<&PathKey> = source_files.difference(&replica_files).collect();
        to_add.sort();
        for key in to_add {
            self.add_file(key, &replica_files, &mut pass)?;
        }

        if self.config.delete_orphans {
            let mut to_remove: Vec<&PathKey> = replica_files.difference(&source_files).collect();
            to_remove.sort();
            for key in to_remove {
                if pass.cleared.contains(key) {
                    continue;
                }
                let path = key.to_path(&self.replica_root);
                fs::remove_file(&path)
                    .with_context(|| format!("Failed to remove {}", path.display()))?;
                tracing::debug!("Removed {}", key);
                pass.report.record_file_removed(key.clone());
            }
        }

        let mut common: Vec<&PathKey> = source_files.intersection(&replica_files).collect();
        common.sort();
        for key in common {
            self.refresh_if_stale(key, &mut pass)?;
        }

        if self.config.prune_empty_dirs {
            self.prune_empty_dirs(&mut pass)?;
        }

        let report = pass.report;
        if report.is_empty() {
            tracing::debug!(
                "Replica {} already matches source {}",
                self.replica_root.display(),
                self.source_root.display()
            );
        } else {
            let s = report.summary();
            tracing::info!(
                "Reconciled {} -> {}: {} dirs created, {} added, {} removed, {} updated, {} dirs pruned",
                self.source_root.display(),
                self.replica_root.display(),
                s.dirs_created,
                s.files_added,
                s.files_removed,
                s.files_updated,
                s.dirs_removed
            );
        }

        Ok(report)
    }

    /// Create the replica root if it is missing.
    fn prepare_replica(&self) -> Result<()> {
        match fs::metadata(&self.replica_root) {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(MirrorError::ReplicaNotDirectory(self.replica_root.clone()).into()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                fs::create_dir_all(&self.replica_root).with_context(|| {
                    format!(
                        "Failed to create replica folder {}",
                        self.replica_root.display()
                    )
                })?;
                tracing::info!("Created replica folder {}", self.replica_root.display());
                Ok(())
            }
            Err(e) => Err(e).with_context(|| {
                format!(
                    "Failed to access replica folder {}",
                    self.replica_root.display()
                )
            }),
        }
    }

    fn add_file(
        &self,
        key: &PathKey,
        replica_files: &HashSet<PathKey>,
        pass: &mut Pass,
    ) -> Result<()> {
        self.ensure_parent_dirs(key, pass)?;
        self.clear_destination(key, replica_files, pass)?;

        let src = key.to_path(&self.source_root);
        let dst = key.to_path(&self.replica_root);
        copy_preserving_mtime(&src, &dst)?;
        tracing::debug!("Added {}", key);
        pass.report.record_file_added(key.clone());
        Ok(())
    }

    /// Create every missing directory above `key`, top-down. A replica entry
    /// that is not a directory but sits where the source has one is removed
    /// first.
    fn ensure_parent_dirs(&self, key: &PathKey, pass: &mut Pass) -> Result<()> {
        for dir in key.ancestors() {
            let path = dir.to_path(&self.replica_root);
            match fs::symlink_metadata(&path) {
                Ok(meta) if meta.is_dir() => continue,
                Ok(_) => {
                    fs::remove_file(&path).with_context(|| {
                        format!("Failed to remove {} to make room for a folder", path.display())
                    })?;
                    tracing::debug!("Removed {} (replaced by a folder)", dir);
                    pass.report.record_file_removed(dir.clone());
                    pass.cleared.insert(dir.clone());
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(e)
                        .with_context(|| format!("Failed to inspect {}", path.display()));
                }
            }

            fs::create_dir(&path)
                .with_context(|| format!("Failed to create folder {}", path.display()))?;
            tracing::debug!("Created folder {}", dir);
            pass.report.record_dir_created(dir);
        }
        Ok(())
    }

    /// Remove whatever occupies the destination of a new file: a directory
    /// (source has a file where the replica has a folder) or a symlink.
    fn clear_destination(
        &self,
        key: &PathKey,
        replica_files: &HashSet<PathKey>,
        pass: &mut Pass,
    ) -> Result<()> {
        let path = key.to_path(&self.replica_root);
        let meta = match fs::symlink_metadata(&path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to inspect {}", path.display()))
            }
        };

        if meta.is_dir() {
            let mut inside: Vec<&PathKey> = replica_files
                .iter()
                .filter(|f| f.is_inside(key))
                .collect();
            inside.sort();

            fs::remove_dir_all(&path).with_context(|| {
                format!("Failed to remove folder {} to make room for a file", path.display())
            })?;
            tracing::debug!("Removed folder {} (replaced by a file)", key);

            for file in inside {
                pass.report.record_file_removed(file.clone());
                pass.cleared.insert(file.clone());
            }
            pass.report.record_dir_removed(key.clone());
        } else {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove {}", path.display()))?;
            tracing::debug!("Removed non-regular entry {}", key);
            pass.report.record_file_removed(key.clone());
        }
        Ok(())
    }

    fn refresh_if_stale(&self, key: &PathKey, pass: &mut Pass) -> Result<()> {
        let src = key.to_path(&self.source_root);
        let dst = key.to_path(&self.replica_root);

        let source_mtime = modified_time(&src)?;
        let replica_mtime = modified_time(&dst)?;
        if source_mtime <= replica_mtime {
            return Ok(());
        }

        copy_preserving_mtime(&src, &dst)?;
        tracing::debug!("Updated {}", key);
        pass.report.record_file_updated(key.clone());
        Ok(())
    }

    /// Remove empty directories below the replica root, children first. The
    /// replica root itself is never removed.
    fn prune_empty_dirs(&self, pass: &mut Pass) -> Result<()> {
        for dir in list_dirs_deepest_first(&self.replica_root)? {
            if !is_empty_dir(&dir)? {
                continue;
            }
            fs::remove_dir(&dir)
                .with_context(|| format!("Failed to remove empty folder {}", dir.display()))?;
            let key = PathKey::from_full_path(&self.replica_root, &dir)?;
            tracing::debug!("Pruned empty folder {}", key);
            pass.report.record_dir_removed(key);
        }
        Ok(())
    }
}
