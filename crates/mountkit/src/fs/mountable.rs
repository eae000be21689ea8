//! Mount table and path resolution.
//!
//! [`MountTable`] maps absolute mount points to filesystems, similar to Unix
//! mount semantics. It is a flat mapping, not a tree: a path resolves to the
//! longest mount point that is a prefix of it.

// RwLock.read()/write().unwrap() only panics on lock poisoning (prior panic
// while holding lock). This is intentional - corrupted state should not propagate.
#![allow(clippy::unwrap_used)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use super::traits::FileSystem;
use crate::error::{Errno, Error, Result};
use crate::path::{is_root, normalize};

/// Outcome of [`MountTable::resolve`].
#[derive(Clone)]
pub struct Resolved {
    /// Filesystem serving the path
    pub fs: Arc<dyn FileSystem>,
    /// Path relative to that filesystem's root (always absolute)
    pub path: PathBuf,
    /// Mount point the filesystem is attached at
    pub mount_point: PathBuf,
}

impl std::fmt::Debug for Resolved {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolved")
            .field("fs", &self.fs.metadata().name)
            .field("path", &self.path)
            .field("mount_point", &self.mount_point)
            .finish()
    }
}

/// Mount points and the filesystems attached at them.
///
/// A root mount (`/`) always exists.
///
/// # Path Resolution
///
/// With mounts at `/`, `/mnt` and `/mnt/data`:
///
/// - `/mnt/file.txt` → `/mnt`, relative path `/file.txt`
/// - `/mnt/data/file.txt` → `/mnt/data` (longer prefix wins)
/// - `/mnt/database` → `/mnt` (prefixes match whole components)
/// - `/other/file.txt` → `/`
///
/// # Example
///
/// ```rust
/// use mountkit::{InMemory, MountTable, Synchronous};
/// use std::path::Path;
/// use std::sync::Arc;
///
/// let table = MountTable::new(Arc::new(Synchronous::new(InMemory::new())));
/// table.mount("/mnt/data", Arc::new(Synchronous::new(InMemory::new())))?;
///
/// let resolved = table.resolve("/mnt/data/users.json")?;
/// assert_eq!(resolved.mount_point, Path::new("/mnt/data"));
/// assert_eq!(resolved.path, Path::new("/users.json"));
/// # Ok::<(), mountkit::Error>(())
/// ```
pub struct MountTable {
    mounts: RwLock<BTreeMap<PathBuf, Arc<dyn FileSystem>>>,
}

impl std::fmt::Debug for MountTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.mount_points()).finish()
    }
}

impl MountTable {
    /// Table with `root` mounted at `/`.
    pub fn new(root: Arc<dyn FileSystem>) -> Self {
        let mut mounts = BTreeMap::new();
        mounts.insert(PathBuf::from("/"), root);
        Self {
            mounts: RwLock::new(mounts),
        }
    }

    /// Attach `fs` at `point`.
    ///
    /// Fails with `EINVAL` if something is already mounted there.
    pub fn mount(&self, point: impl AsRef<Path>, fs: Arc<dyn FileSystem>) -> Result<()> {
        let point = normalize(point)?;
        let mut mounts = self.mounts.write().unwrap();
        if mounts.contains_key(&point) {
            return Err(Error::new(
                Errno::EINVAL,
                format!("mount point {} is already in use", point.display()),
            )
            .at(&point)
            .during("mount"));
        }

        #[cfg(feature = "logging")]
        tracing::info!(
            mount_point = %crate::logging_impl::format_path_for_log(&point),
            fs = %fs.metadata().name,
            "mounted filesystem"
        );

        mounts.insert(point, fs);
        Ok(())
    }

    /// Detach the filesystem at `point` and return it.
    ///
    /// Fails with `EINVAL` if nothing is mounted there or `point` is `/`.
    pub fn umount(&self, point: impl AsRef<Path>) -> Result<Arc<dyn FileSystem>> {
        let point = normalize(point)?;
        if is_root(&point) {
            return Err(Error::new(Errno::EINVAL, "cannot unmount the root filesystem")
                .at(&point)
                .during("umount"));
        }
        let mut mounts = self.mounts.write().unwrap();
        let fs = mounts.remove(&point).ok_or_else(|| {
            Error::new(
                Errno::EINVAL,
                format!("{} is not a mount point", point.display()),
            )
            .at(&point)
            .during("umount")
        })?;

        #[cfg(feature = "logging")]
        tracing::info!(
            mount_point = %crate::logging_impl::format_path_for_log(&point),
            "unmounted filesystem"
        );

        Ok(fs)
    }

    /// Find the filesystem serving `path`.
    ///
    /// Mount points are tried longest first; the first one that is a
    /// component-wise prefix of the normalized path wins.
    pub fn resolve(&self, path: impl AsRef<Path>) -> Result<Resolved> {
        let path = normalize(path)?;
        let mounts = self.mounts.read().unwrap();

        let mut points: Vec<(&PathBuf, &Arc<dyn FileSystem>)> = mounts.iter().collect();
        points.sort_by_key(|(point, _)| std::cmp::Reverse(point.as_os_str().len()));

        for (point, fs) in points {
            if let Ok(rest) = path.strip_prefix(point) {
                return Ok(Resolved {
                    fs: fs.clone(),
                    path: Path::new("/").join(rest),
                    mount_point: point.clone(),
                });
            }
        }

        Err(Error::new(Errno::EIO, "no filesystem mounted for path")
            .at(&path)
            .during("resolve"))
    }

    /// Names of mount points that are direct children of `dir`.
    ///
    /// Mounts nested deeper, or mounted at `dir` itself, are not included.
    pub fn child_mounts(&self, dir: impl AsRef<Path>) -> Vec<String> {
        let Ok(dir) = normalize(dir) else {
            return Vec::new();
        };
        let mounts = self.mounts.read().unwrap();
        mounts
            .keys()
            .filter(|point| point.parent() == Some(dir.as_path()))
            .filter_map(|point| point.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .collect()
    }

    /// Whether `path` is a mount point.
    pub fn is_mount_point(&self, path: impl AsRef<Path>) -> bool {
        normalize(path).is_ok_and(|p| self.mounts.read().unwrap().contains_key(&p))
    }

    /// Filesystem mounted exactly at `point`.
    pub fn get(&self, point: impl AsRef<Path>) -> Option<Arc<dyn FileSystem>> {
        let point = normalize(point).ok()?;
        self.mounts.read().unwrap().get(&point).cloned()
    }

    /// All mount points, sorted.
    pub fn mount_points(&self) -> Vec<PathBuf> {
        self.mounts.read().unwrap().keys().cloned().collect()
    }

    /// All mounts, sorted by mount point.
    pub fn entries(&self) -> Vec<(PathBuf, Arc<dyn FileSystem>)> {
        self.mounts
            .read()
            .unwrap()
            .iter()
            .map(|(point, fs)| (point.clone(), fs.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::{InMemory, Synchronous};

    fn memfs() -> Arc<dyn FileSystem> {
        Arc::new(Synchronous::new(InMemory::new()))
    }

    #[test]
    fn test_root_always_mounted() {
        let table = MountTable::new(memfs());
        let resolved = table.resolve("/a/b").unwrap();
        assert_eq!(resolved.mount_point, Path::new("/"));
        assert_eq!(resolved.path, Path::new("/a/b"));
        assert!(table.umount("/").unwrap_err().is(Errno::EINVAL));
    }

    #[test]
    fn test_longest_prefix() {
        let table = MountTable::new(memfs());
        table.mount("/a", memfs()).unwrap();
        table.mount("/ab", memfs()).unwrap();
        table.mount("/a/b", memfs()).unwrap();

        assert_eq!(table.resolve("/ab/c").unwrap().mount_point, Path::new("/ab"));
        assert_eq!(table.resolve("/a/c").unwrap().mount_point, Path::new("/a"));
        let nested = table.resolve("/a/b/c").unwrap();
        assert_eq!(nested.mount_point, Path::new("/a/b"));
        assert_eq!(nested.path, Path::new("/c"));
        assert_eq!(table.resolve("/abc").unwrap().mount_point, Path::new("/"));
    }

    #[test]
    fn test_mount_point_itself_is_root() {
        let table = MountTable::new(memfs());
        table.mount("/mnt", memfs()).unwrap();
        assert_eq!(table.resolve("/mnt").unwrap().path, Path::new("/"));
        assert_eq!(table.resolve("/mnt//").unwrap().path, Path::new("/"));
    }

    #[test]
    fn test_mount_errors() {
        let table = MountTable::new(memfs());
        table.mount("/mnt/", memfs()).unwrap();
        assert!(table.mount("//mnt", memfs()).unwrap_err().is(Errno::EINVAL));
        assert!(table.umount("/other").unwrap_err().is(Errno::EINVAL));
        assert!(table.resolve("").unwrap_err().is(Errno::EINVAL));
        table.umount("/mnt").unwrap();
        assert_eq!(table.resolve("/mnt/x").unwrap().mount_point, Path::new("/"));
    }

    #[test]
    fn test_child_mounts() {
        let table = MountTable::new(memfs());
        table.mount("/mnt", memfs()).unwrap();
        table.mount("/mnt/data", memfs()).unwrap();
        table.mount("/mnt/data/deep", memfs()).unwrap();
        table.mount("/tmp", memfs()).unwrap();

        assert_eq!(table.child_mounts("/"), vec!["mnt", "tmp"]);
        assert_eq!(table.child_mounts("/mnt"), vec!["data"]);
        assert!(table.child_mounts("/tmp").is_empty());
        assert!(table.is_mount_point("/mnt/data/"));
        assert!(!table.is_mount_point("/mnt/other"));
    }
}
