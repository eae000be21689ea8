//! Async-from-sync mixin.

use async_trait::async_trait;
use std::path::Path;

use super::backend::SyncBackend;
use super::traits::{FileData, FileSystem, FileSystemMetadata};
use crate::cred::Credentials;
use crate::error::Result;
use crate::flags::OpenFlags;
use crate::stats::Stats;

/// Exposes a [`SyncBackend`] as a [`FileSystem`].
///
/// Async forms call straight through to the sync forms; nothing actually
/// suspends. [`FileSystemMetadata::synchronous`] is reported as true.
///
/// # Example
///
/// ```rust
/// use mountkit::{Credentials, FileSystem, InMemory, Synchronous};
/// use std::path::Path;
///
/// # #[tokio::main]
/// # async fn main() -> mountkit::Result<()> {
/// let fs = Synchronous::new(InMemory::new());
/// let root = Credentials::root();
/// fs.mkdir(Path::new("/a"), 0o755, &root).await?;
/// assert!(fs.exists_sync(Path::new("/a"), &root)?);
/// assert!(fs.metadata().synchronous);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct Synchronous<B> {
    backend: B,
}

impl<B: SyncBackend> Synchronous<B> {
    /// Wrap a backend.
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// The wrapped backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }
}

#[async_trait]
impl<B: SyncBackend> FileSystem for Synchronous<B> {
    fn metadata(&self) -> FileSystemMetadata {
        FileSystemMetadata {
            synchronous: true,
            ..self.backend.metadata()
        }
    }

    async fn rename(&self, old_path: &Path, new_path: &Path, cred: &Credentials) -> Result<()> {
        self.rename_sync(old_path, new_path, cred)
    }

    fn rename_sync(&self, old_path: &Path, new_path: &Path, cred: &Credentials) -> Result<()> {
        self.backend.rename(old_path, new_path, cred)
    }

    async fn stat(&self, path: &Path, cred: &Credentials) -> Result<Stats> {
        self.stat_sync(path, cred)
    }

    fn stat_sync(&self, path: &Path, cred: &Credentials) -> Result<Stats> {
        self.backend.stat(path, cred)
    }

    async fn open_file(
        &self,
        path: &Path,
        flags: OpenFlags,
        cred: &Credentials,
    ) -> Result<FileData> {
        self.open_file_sync(path, flags, cred)
    }

    fn open_file_sync(
        &self,
        path: &Path,
        flags: OpenFlags,
        cred: &Credentials,
    ) -> Result<FileData> {
        self.backend.open_file(path, flags, cred)
    }

    async fn create_file(
        &self,
        path: &Path,
        flags: OpenFlags,
        mode: u32,
        cred: &Credentials,
    ) -> Result<FileData> {
        self.create_file_sync(path, flags, mode, cred)
    }

    fn create_file_sync(
        &self,
        path: &Path,
        flags: OpenFlags,
        mode: u32,
        cred: &Credentials,
    ) -> Result<FileData> {
        self.backend.create_file(path, flags, mode, cred)
    }

    async fn unlink(&self, path: &Path, cred: &Credentials) -> Result<()> {
        self.unlink_sync(path, cred)
    }

    fn unlink_sync(&self, path: &Path, cred: &Credentials) -> Result<()> {
        self.backend.unlink(path, cred)
    }

    async fn rmdir(&self, path: &Path, cred: &Credentials) -> Result<()> {
        self.rmdir_sync(path, cred)
    }

    fn rmdir_sync(&self, path: &Path, cred: &Credentials) -> Result<()> {
        self.backend.rmdir(path, cred)
    }

    async fn mkdir(&self, path: &Path, mode: u32, cred: &Credentials) -> Result<()> {
        self.mkdir_sync(path, mode, cred)
    }

    fn mkdir_sync(&self, path: &Path, mode: u32, cred: &Credentials) -> Result<()> {
        self.backend.mkdir(path, mode, cred)
    }

    async fn readdir(&self, path: &Path, cred: &Credentials) -> Result<Vec<String>> {
        self.readdir_sync(path, cred)
    }

    fn readdir_sync(&self, path: &Path, cred: &Credentials) -> Result<Vec<String>> {
        self.backend.readdir(path, cred)
    }

    async fn link(&self, target: &Path, new_path: &Path, cred: &Credentials) -> Result<()> {
        self.link_sync(target, new_path, cred)
    }

    fn link_sync(&self, target: &Path, new_path: &Path, cred: &Credentials) -> Result<()> {
        self.backend.link(target, new_path, cred)
    }

    async fn sync(&self, path: &Path, data: &[u8], stats: &Stats) -> Result<()> {
        self.sync_sync(path, data, stats)
    }

    fn sync_sync(&self, path: &Path, data: &[u8], stats: &Stats) -> Result<()> {
        self.backend.sync(path, data, stats)
    }
}
