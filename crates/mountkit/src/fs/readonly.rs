//! Read-only mixin.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

use super::traits::{FileData, FileSystem, FileSystemMetadata};
use crate::cred::Credentials;
use crate::error::{Errno, Error, Result};
use crate::flags::OpenFlags;
use crate::stats::Stats;

/// Wraps any [`FileSystem`] so that every mutator fails with `EROFS`.
///
/// `stat`, `readdir`, `exists` and read-only opens pass through unchanged.
/// Opening with a writing, appending or truncating flag fails with `EROFS`,
/// and because files opened through the wrapper are owned by it, a later
/// flush of such a file fails the same way.
pub struct ReadOnly<F: ?Sized> {
    inner: Arc<F>,
}

impl<F: FileSystem + ?Sized> ReadOnly<F> {
    /// Wrap a filesystem.
    pub fn new(inner: Arc<F>) -> Self {
        Self { inner }
    }

    /// The wrapped filesystem.
    pub fn inner(&self) -> &Arc<F> {
        &self.inner
    }
}

fn erofs(path: &Path, syscall: &'static str) -> Error {
    Error::with(Errno::EROFS, path, syscall)
}

fn check_flags(path: &Path, flags: OpenFlags) -> Result<()> {
    if flags.is_writeable() || flags.is_appendable() || flags.is_truncating() {
        return Err(erofs(path, "open"));
    }
    Ok(())
}

#[async_trait]
impl<F: FileSystem + ?Sized> FileSystem for ReadOnly<F> {
    fn metadata(&self) -> FileSystemMetadata {
        FileSystemMetadata {
            readonly: true,
            ..self.inner.metadata()
        }
    }

    async fn ready(&self) -> Result<()> {
        self.inner.ready().await
    }

    async fn rename(&self, old_path: &Path, _new_path: &Path, _cred: &Credentials) -> Result<()> {
        Err(erofs(old_path, "rename"))
    }

    fn rename_sync(&self, old_path: &Path, _new_path: &Path, _cred: &Credentials) -> Result<()> {
        Err(erofs(old_path, "rename"))
    }

    async fn stat(&self, path: &Path, cred: &Credentials) -> Result<Stats> {
        self.inner.stat(path, cred).await
    }

    fn stat_sync(&self, path: &Path, cred: &Credentials) -> Result<Stats> {
        self.inner.stat_sync(path, cred)
    }

    async fn open_file(
        &self,
        path: &Path,
        flags: OpenFlags,
        cred: &Credentials,
    ) -> Result<FileData> {
        check_flags(path, flags)?;
        self.inner.open_file(path, flags, cred).await
    }

    fn open_file_sync(
        &self,
        path: &Path,
        flags: OpenFlags,
        cred: &Credentials,
    ) -> Result<FileData> {
        check_flags(path, flags)?;
        self.inner.open_file_sync(path, flags, cred)
    }

    async fn create_file(
        &self,
        path: &Path,
        _flags: OpenFlags,
        _mode: u32,
        _cred: &Credentials,
    ) -> Result<FileData> {
        Err(erofs(path, "open"))
    }

    fn create_file_sync(
        &self,
        path: &Path,
        _flags: OpenFlags,
        _mode: u32,
        _cred: &Credentials,
    ) -> Result<FileData> {
        Err(erofs(path, "open"))
    }

    async fn unlink(&self, path: &Path, _cred: &Credentials) -> Result<()> {
        Err(erofs(path, "unlink"))
    }

    fn unlink_sync(&self, path: &Path, _cred: &Credentials) -> Result<()> {
        Err(erofs(path, "unlink"))
    }

    async fn rmdir(&self, path: &Path, _cred: &Credentials) -> Result<()> {
        Err(erofs(path, "rmdir"))
    }

    fn rmdir_sync(&self, path: &Path, _cred: &Credentials) -> Result<()> {
        Err(erofs(path, "rmdir"))
    }

    async fn mkdir(&self, path: &Path, _mode: u32, _cred: &Credentials) -> Result<()> {
        Err(erofs(path, "mkdir"))
    }

    fn mkdir_sync(&self, path: &Path, _mode: u32, _cred: &Credentials) -> Result<()> {
        Err(erofs(path, "mkdir"))
    }

    async fn readdir(&self, path: &Path, cred: &Credentials) -> Result<Vec<String>> {
        self.inner.readdir(path, cred).await
    }

    fn readdir_sync(&self, path: &Path, cred: &Credentials) -> Result<Vec<String>> {
        self.inner.readdir_sync(path, cred)
    }

    async fn exists(&self, path: &Path, cred: &Credentials) -> Result<bool> {
        self.inner.exists(path, cred).await
    }

    fn exists_sync(&self, path: &Path, cred: &Credentials) -> Result<bool> {
        self.inner.exists_sync(path, cred)
    }

    async fn link(&self, _target: &Path, new_path: &Path, _cred: &Credentials) -> Result<()> {
        Err(erofs(new_path, "link"))
    }

    fn link_sync(&self, _target: &Path, new_path: &Path, _cred: &Credentials) -> Result<()> {
        Err(erofs(new_path, "link"))
    }

    async fn sync(&self, path: &Path, _data: &[u8], _stats: &Stats) -> Result<()> {
        Err(erofs(path, "sync"))
    }

    fn sync_sync(&self, path: &Path, _data: &[u8], _stats: &Stats) -> Result<()> {
        Err(erofs(path, "sync"))
    }
}
