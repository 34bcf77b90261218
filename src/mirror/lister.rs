// ABOUTME: TreeLister - enumerates regular files below a root as PathKeys
// ABOUTME: Read-only traversal built on walkdir; errors propagate to the caller

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::path_key::PathKey;

/// List every regular file below `root` as a set of root-relative keys.
///
/// Directories themselves are not listed. Symlinks are not followed and, like
/// sockets or device nodes, are not regular files, so they are skipped.
///
/// Fails if `root` is missing or unreadable, or if any directory below it
/// cannot be read. A partial listing would make the reconciler delete replica
/// files that still exist in the source, so nothing is skipped silently.
pub fn list_files(root: &Path) -> Result<HashSet<PathKey>> {
    let mut files = HashSet::new();

    for entry in WalkDir::new(root).min_depth(1) {
        let entry = entry.with_context(|| format!("Failed to list {}", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        files.insert(PathKey::from_full_path(root, entry.path())?);
    }

    tracing::trace!("Listed {} files under {}", files.len(), root.display());
    Ok(files)
}

/// List every directory strictly below `root`, deepest entries first.
///
/// A directory always appears after all of its descendants, so callers can
/// remove children before checking the parent.
pub fn list_dirs_deepest_first(root: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();

    for entry in WalkDir::new(root).min_depth(1).contents_first(true) {
        let entry = entry.with_context(|| format!("Failed to list {}", root.display()))?;
        if entry.file_type().is_dir() {
            dirs.push(entry.into_path());
        }
    }

    Ok(dirs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn keys(set: &HashSet<PathKey>) -> Vec<String> {
        let mut v: Vec<String> = set.iter().map(|k| k.to_string()).collect();
        v.sort();
        v
    }

    #[test]
    fn test_lists_nested_files_only() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("a/b")).unwrap();
        fs::create_dir_all(root.join("empty")).unwrap();
        fs::write(root.join("top.txt"), "1").unwrap();
        fs::write(root.join("a/mid.txt"), "2").unwrap();
        fs::write(root.join("a/b/deep.txt"), "3").unwrap();

        let files = list_files(root).unwrap();
        assert_eq!(keys(&files), vec!["a/b/deep.txt", "a/mid.txt", "top.txt"]);
    }

    #[test]
    fn test_empty_root_lists_nothing() {
        let dir = tempdir().unwrap();
        assert!(list_files(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let dir = tempdir().unwrap();
        let err = list_files(&dir.path().join("nope")).unwrap_err();
        assert!(err.to_string().contains("Failed to list"));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_are_skipped() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("real.txt"), "x").unwrap();
        std::os::unix::fs::symlink(root.join("real.txt"), root.join("link.txt")).unwrap();

        let files = list_files(root).unwrap();
        assert_eq!(keys(&files), vec!["real.txt"]);
    }

    #[test]
    fn test_dirs_listed_children_before_parents() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("a/b/c")).unwrap();
        fs::create_dir_all(root.join("z")).unwrap();

        let dirs = list_dirs_deepest_first(root).unwrap();
        let pos = |p: &str| dirs.iter().position(|d| d == &root.join(p)).unwrap();

        assert_eq!(dirs.len(), 4);
        assert!(pos("a/b/c") < pos("a/b"));
        assert!(pos("a/b") < pos("a"));
        assert!(!dirs.contains(&root.to_path_buf()));
    }
}
