// ABOUTME: PathKey - a file's identity for diffing, relative to its tree root
// ABOUTME: Normalizes separators so source and replica listings compare portably

use anyhow::{bail, Result};
use serde::{Serialize, Serializer};
use std::ffi::OsString;
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// A path relative to a tree root, stored as normalized components.
///
/// Two keys are equal when their component sequences are equal, which is the
/// same as comparing the `/`-joined form. The host separator, a trailing
/// separator or `.` components never affect identity. Comparison is
/// case-sensitive on every platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PathKey {
    components: Vec<OsString>,
}

impl PathKey {
    /// Build a key from a path that is already relative to its root.
    ///
    /// Rejects absolute paths, `..` and empty paths. A tree listing never
    /// produces them, so seeing one means the caller passed the wrong path.
    pub fn from_relative(path: &Path) -> Result<Self> {
        let mut components = Vec::new();
        for component in path.components() {
            match component {
                Component::Normal(name) => components.push(name.to_os_string()),
                Component::CurDir => {}
                Component::ParentDir => {
                    bail!("path {} escapes its root", path.display())
                }
                Component::RootDir | Component::Prefix(_) => {
                    bail!("path {} is not relative", path.display())
                }
            }
        }

        if components.is_empty() {
            bail!("path {:?} does not name an entry below its root", path);
        }

        Ok(Self { components })
    }

    /// Build a key for `path` as seen from `root`.
    pub fn from_full_path(root: &Path, path: &Path) -> Result<Self> {
        let relative = path.strip_prefix(root).map_err(|_| {
            anyhow::anyhow!("{} is not inside {}", path.display(), root.display())
        })?;
        Self::from_relative(relative)
    }

    /// Re-join this key onto `root` using host separators.
    pub fn to_path(&self, root: &Path) -> PathBuf {
        let mut path = root.to_path_buf();
        path.extend(&self.components);
        path
    }

    /// Key of the containing directory, or None for a top-level entry.
    pub fn parent(&self) -> Option<PathKey> {
        if self.components.len() < 2 {
            return None;
        }
        Some(Self {
            components: self.components[..self.components.len() - 1].to_vec(),
        })
    }

    /// Every containing directory from the top level down, excluding the key
    /// itself. `a/b/c.txt` yields `a` then `a/b`.
    pub fn ancestors(&self) -> impl Iterator<Item = PathKey> + '_ {
        (1..self.components.len()).map(move |len| Self {
            components: self.components[..len].to_vec(),
        })
    }

    /// True when `self` lies strictly below `dir`.
    pub fn is_inside(&self, dir: &PathKey) -> bool {
        self.components.len() > dir.components.len()
            && self.components[..dir.components.len()] == dir.components[..]
    }
}

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, component) in self.components.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{}", component.to_string_lossy())?;
        }
        Ok(())
    }
}

impl Serialize for PathKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn key(s: &str) -> PathKey {
        PathKey::from_relative(Path::new(s)).unwrap()
    }

    #[test]
    fn test_display_uses_forward_slash() {
        let k = PathKey::from_relative(&Path::new("docs").join("guide").join("intro.md")).unwrap();
        assert_eq!(k.to_string(), "docs/guide/intro.md");
    }

    #[test]
    fn test_curdir_and_trailing_separator_do_not_change_identity() {
        assert_eq!(key("./a/./b.txt"), key("a/b.txt"));
        assert_eq!(key("a/b/"), key("a/b"));

        let mut set = HashSet::new();
        set.insert(key("a/b.txt"));
        set.insert(key("./a/b.txt"));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_comparison_is_case_sensitive() {
        assert_ne!(key("Readme.md"), key("README.md"));
    }

    #[test]
    fn test_rejects_non_relative_paths() {
        assert!(PathKey::from_relative(Path::new("/etc/passwd")).is_err());
        assert!(PathKey::from_relative(Path::new("a/../../b")).is_err());
        assert!(PathKey::from_relative(Path::new("")).is_err());
        assert!(PathKey::from_relative(Path::new(".")).is_err());
    }

    #[test]
    fn test_from_full_path() {
        let root = Path::new("/srv/source");
        let k = PathKey::from_full_path(root, Path::new("/srv/source/x/y.bin")).unwrap();
        assert_eq!(k.to_string(), "x/y.bin");
        assert!(PathKey::from_full_path(root, Path::new("/srv/other/y.bin")).is_err());
    }

    #[test]
    fn test_to_path_rejoins_on_any_root() {
        let k = key("x/y.bin");
        assert_eq!(
            k.to_path(Path::new("/replica")),
            Path::new("/replica").join("x").join("y.bin")
        );
    }

    #[test]
    fn test_parent_and_ancestors() {
        let k = key("a/b/c.txt");
        assert_eq!(k.parent(), Some(key("a/b")));
        assert_eq!(key("top.txt").parent(), None);

        let ancestors: Vec<String> = k.ancestors().map(|a| a.to_string()).collect();
        assert_eq!(ancestors, vec!["a", "a/b"]);
        assert_eq!(key("top.txt").ancestors().count(), 0);
    }

    #[test]
    fn test_is_inside() {
        assert!(key("a/b/c.txt").is_inside(&key("a")));
        assert!(key("a/b/c.txt").is_inside(&key("a/b")));
        assert!(!key("a/b").is_inside(&key("a/b")));
        assert!(!key("ab/c").is_inside(&key("a")));
    }

    #[test]
    fn test_serializes_as_string() {
        let json = serde_json::to_string(&key("a/b.txt")).unwrap();
        assert_eq!(json, "\"a/b.txt\"");
    }
}
