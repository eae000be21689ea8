//! Filesystem trait definitions

use async_trait::async_trait;
use std::path::Path;

use crate::cred::Credentials;
use crate::error::{Errno, Result};
use crate::flags::OpenFlags;
use crate::stats::Stats;

/// Capabilities and usage reported by a filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSystemMetadata {
    /// Backend name, e.g. `"InMemory"`
    pub name: String,
    /// Every mutator fails with `EROFS`
    pub readonly: bool,
    /// Async forms complete without real suspension
    pub synchronous: bool,
    /// Capacity in bytes
    pub total_space: u64,
    /// Free bytes
    pub free_space: u64,
    /// Open files must grow their buffers by reallocation
    pub no_resizable_buffers: bool,
    /// An asynchronous backend must not attach a synchronous cache
    pub no_async_cache: bool,
}

impl FileSystemMetadata {
    /// Metadata with the given name and no capacity limit.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            readonly: false,
            synchronous: false,
            total_space: u64::MAX,
            free_space: u64::MAX,
            no_resizable_buffers: false,
            no_async_cache: false,
        }
    }
}

/// Snapshot of a file as loaded from a backend: stats plus full contents.
///
/// Returned by `open_file`/`create_file`; the caller wraps it in a
/// [`PreloadFile`](crate::PreloadFile) owned by the filesystem it came from.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FileData {
    /// Stats at open time
    pub stats: Stats,
    /// Contents at open time
    pub contents: Vec<u8>,
}

impl FileData {
    /// Bundle stats and contents.
    pub fn new(stats: Stats, contents: Vec<u8>) -> Self {
        Self { stats, contents }
    }
}

/// The operation set every mounted filesystem provides.
///
/// Each operation has an async form and a `_sync` form; both must fail with
/// the same [`Errno`] for the same condition. Paths are absolute and
/// normalized relative to the filesystem's own root.
///
/// Backend authors normally implement one of the minimal contracts in
/// [`backend`](super::backend) and wrap it in
/// [`Synchronous`](super::Synchronous) or [`Asynchronous`](super::Asynchronous)
/// rather than implementing this trait directly.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Capabilities and usage.
    fn metadata(&self) -> FileSystemMetadata;

    /// Complete initialization. Idempotent.
    async fn ready(&self) -> Result<()> {
        Ok(())
    }

    /// Move `old_path` to `new_path`, replacing an existing file.
    async fn rename(&self, old_path: &Path, new_path: &Path, cred: &Credentials) -> Result<()>;

    /// Sync form of [`rename`](Self::rename).
    fn rename_sync(&self, old_path: &Path, new_path: &Path, cred: &Credentials) -> Result<()>;

    /// Stats of `path`.
    async fn stat(&self, path: &Path, cred: &Credentials) -> Result<Stats>;

    /// Sync form of [`stat`](Self::stat).
    fn stat_sync(&self, path: &Path, cred: &Credentials) -> Result<Stats>;

    /// Load an existing file.
    async fn open_file(&self, path: &Path, flags: OpenFlags, cred: &Credentials)
    -> Result<FileData>;

    /// Sync form of [`open_file`](Self::open_file).
    fn open_file_sync(&self, path: &Path, flags: OpenFlags, cred: &Credentials)
    -> Result<FileData>;

    /// Create an empty file with permission bits `mode`.
    async fn create_file(
        &self,
        path: &Path,
        flags: OpenFlags,
        mode: u32,
        cred: &Credentials,
    ) -> Result<FileData>;

    /// Sync form of [`create_file`](Self::create_file).
    fn create_file_sync(
        &self,
        path: &Path,
        flags: OpenFlags,
        mode: u32,
        cred: &Credentials,
    ) -> Result<FileData>;

    /// Remove a file.
    async fn unlink(&self, path: &Path, cred: &Credentials) -> Result<()>;

    /// Sync form of [`unlink`](Self::unlink).
    fn unlink_sync(&self, path: &Path, cred: &Credentials) -> Result<()>;

    /// Remove an empty directory.
    async fn rmdir(&self, path: &Path, cred: &Credentials) -> Result<()>;

    /// Sync form of [`rmdir`](Self::rmdir).
    fn rmdir_sync(&self, path: &Path, cred: &Credentials) -> Result<()>;

    /// Create a directory with permission bits `mode`.
    async fn mkdir(&self, path: &Path, mode: u32, cred: &Credentials) -> Result<()>;

    /// Sync form of [`mkdir`](Self::mkdir).
    fn mkdir_sync(&self, path: &Path, mode: u32, cred: &Credentials) -> Result<()>;

    /// Names of the entries in a directory, sorted.
    async fn readdir(&self, path: &Path, cred: &Credentials) -> Result<Vec<String>>;

    /// Sync form of [`readdir`](Self::readdir).
    fn readdir_sync(&self, path: &Path, cred: &Credentials) -> Result<Vec<String>>;

    /// Check whether `path` exists. `ENOENT` maps to `false`.
    async fn exists(&self, path: &Path, cred: &Credentials) -> Result<bool> {
        match self.stat(path, cred).await {
            Ok(_) => Ok(true),
            Err(e) if e.is(Errno::ENOENT) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Sync form of [`exists`](Self::exists).
    fn exists_sync(&self, path: &Path, cred: &Credentials) -> Result<bool> {
        match self.stat_sync(path, cred) {
            Ok(_) => Ok(true),
            Err(e) if e.is(Errno::ENOENT) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Create a hard link `new_path` to the file at `target`.
    async fn link(&self, target: &Path, new_path: &Path, cred: &Credentials) -> Result<()>;

    /// Sync form of [`link`](Self::link).
    fn link_sync(&self, target: &Path, new_path: &Path, cred: &Credentials) -> Result<()>;

    /// Persist the contents and stats of an open file. For a directory only
    /// the stats are written and `data` is ignored.
    async fn sync(&self, path: &Path, data: &[u8], stats: &Stats) -> Result<()>;

    /// Sync form of [`sync`](Self::sync).
    fn sync_sync(&self, path: &Path, data: &[u8], stats: &Stats) -> Result<()>;
}

impl std::fmt::Debug for dyn FileSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSystem")
            .field("metadata", &self.metadata())
            .finish()
    }
}
