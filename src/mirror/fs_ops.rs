// ABOUTME: Filesystem primitives used by the reconciler
// ABOUTME: Copy-with-mtime via temp file + rename, and empty directory checks

use anyhow::{Context, Result};
use filetime::FileTime;
use std::fs::{self, File};
use std::io;
use std::path::Path;

const TEMP_PREFIX: &str = ".folder-replicator-";
const TEMP_SUFFIX: &str = ".tmp";

/// Copy `src` to `dst`, preserving access and modification times.
///
/// Content is written to a temporary file next to `dst` and renamed into
/// place, so `dst` is either the old file or the complete new one. A crash
/// can leave only the temporary file behind, which the next pass deletes as
/// an orphan because it has no source counterpart.
pub fn copy_preserving_mtime(src: &Path, dst: &Path) -> Result<()> {
    let metadata =
        fs::metadata(src).with_context(|| format!("Failed to read metadata of {}", src.display()))?;
    let parent = dst
        .parent()
        .with_context(|| format!("Destination {} has no parent directory", dst.display()))?;

    let mut reader = File::open(src).with_context(|| format!("Failed to open {}", src.display()))?;
    let mut staged = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .suffix(TEMP_SUFFIX)
        .tempfile_in(parent)
        .with_context(|| format!("Failed to create temporary file in {}", parent.display()))?;

    io::copy(&mut reader, staged.as_file_mut())
        .with_context(|| format!("Failed to copy {} to {}", src.display(), dst.display()))?;

    filetime::set_file_handle_times(
        staged.as_file(),
        Some(FileTime::from_last_access_time(&metadata)),
        Some(FileTime::from_last_modification_time(&metadata)),
    )
    .with_context(|| format!("Failed to preserve timestamps for {}", dst.display()))?;

    fs::set_permissions(staged.path(), metadata.permissions())
        .with_context(|| format!("Failed to set permissions for {}", dst.display()))?;

    staged
        .persist(dst)
        .map_err(|e| e.error)
        .with_context(|| format!("Failed to move copied file into place at {}", dst.display()))?;

    Ok(())
}

/// Modification time of `path`, following symlinks.
pub fn modified_time(path: &Path) -> Result<FileTime> {
    let metadata =
        fs::metadata(path).with_context(|| format!("Failed to read metadata of {}", path.display()))?;
    Ok(FileTime::from_last_modification_time(&metadata))
}

/// True when `dir` has no entries at all.
pub fn is_empty_dir(dir: &Path) -> Result<bool> {
    let mut entries =
        fs::read_dir(dir).with_context(|| format!("Failed to read directory {}", dir.display()))?;
    Ok(entries.next().is_none())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_copy_preserves_content_and_mtime() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src.txt");
        let dst = dir.path().join("dst.txt");
        fs::write(&src, "payload").unwrap();
        let mtime = FileTime::from_unix_time(1_600_000_000, 0);
        filetime::set_file_mtime(&src, mtime).unwrap();

        copy_preserving_mtime(&src, &dst).unwrap();

        assert_eq!(fs::read_to_string(&dst).unwrap(), "payload");
        assert_eq!(modified_time(&dst).unwrap(), mtime);
    }

    #[test]
    fn test_copy_replaces_existing_file_and_leaves_no_temp() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src.txt");
        let dst = dir.path().join("dst.txt");
        fs::write(&src, "new").unwrap();
        fs::write(&dst, "old content that is longer").unwrap();

        copy_preserving_mtime(&src, &dst).unwrap();

        assert_eq!(fs::read_to_string(&dst).unwrap(), "new");
        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 2, "unexpected entries: {:?}", names);
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_over_read_only_replica_file() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let src = dir.path().join("src.txt");
        let dst = dir.path().join("dst.txt");
        fs::write(&src, "v1").unwrap();
        fs::set_permissions(&src, fs::Permissions::from_mode(0o444)).unwrap();

        copy_preserving_mtime(&src, &dst).unwrap();
        fs::set_permissions(&src, fs::Permissions::from_mode(0o644)).unwrap();
        fs::write(&src, "v2").unwrap();
        copy_preserving_mtime(&src, &dst).unwrap();

        assert_eq!(fs::read_to_string(&dst).unwrap(), "v2");
    }

    #[test]
    fn test_copy_missing_source_fails() {
        let dir = tempdir().unwrap();
        let err = copy_preserving_mtime(&dir.path().join("gone"), &dir.path().join("dst"))
            .unwrap_err();
        assert!(err.to_string().contains("Failed to read metadata"));
    }

    #[test]
    fn test_is_empty_dir() {
        let dir = tempdir().unwrap();
        assert!(is_empty_dir(dir.path()).unwrap());
        fs::write(dir.path().join("f"), "").unwrap();
        assert!(!is_empty_dir(dir.path()).unwrap());
    }
}
