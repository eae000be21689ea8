//! Sync-from-async mixin.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

use tokio::sync::OnceCell;

use super::backend::AsyncBackend;
use super::memory::InMemory;
use super::synchronous::Synchronous;
use super::traits::{FileData, FileSystem, FileSystemMetadata};
use crate::bridge::{self, ReplayJob, ReplayQueue};
use crate::cred::Credentials;
use crate::error::{Errno, Error, Result};
use crate::flags::OpenFlags;
use crate::stats::Stats;

/// Exposes an [`AsyncBackend`] as a [`FileSystem`].
///
/// Without a cache only the async forms work; every `_sync` form fails with
/// `ENOTSUP`. With a cache (the default, an [`InMemory`] store, unless the
/// backend sets `no_async_cache`):
///
/// - [`ready`](FileSystem::ready) copies the backend's tree into the cache
///   once and starts the replay worker;
/// - reads (`stat`, `readdir`, `exists`, `open_file`) are served from the
///   cache;
/// - mutations apply to the cache immediately and are queued for replay
///   against the backend. Async forms wait for their own replay, sync forms
///   return at once. Both share one queue, so the backend sees mutations in
///   the order they hit the cache.
///
/// `_sync` forms fail with `ENOTSUP` until `ready` has completed.
pub struct Asynchronous<B> {
    backend: Arc<B>,
    cache: Option<Arc<dyn FileSystem>>,
    queue: OnceCell<Option<ReplayQueue>>,
}

impl<B: AsyncBackend + 'static> Asynchronous<B> {
    /// Wrap a backend with the default in-memory cache.
    pub fn new(backend: B) -> Self {
        let cache: Option<Arc<dyn FileSystem>> = if backend.metadata().no_async_cache {
            None
        } else {
            Some(Arc::new(Synchronous::new(InMemory::new())))
        };
        Self {
            backend: Arc::new(backend),
            cache,
            queue: OnceCell::new(),
        }
    }

    /// Wrap a backend with a caller-supplied synchronous cache.
    ///
    /// The cache should start empty; `ready` fills it.
    pub fn with_cache(backend: B, cache: Arc<dyn FileSystem>) -> Self {
        Self {
            backend: Arc::new(backend),
            cache: Some(cache),
            queue: OnceCell::new(),
        }
    }

    /// Wrap a backend without a cache.
    pub fn without_cache(backend: B) -> Self {
        Self {
            backend: Arc::new(backend),
            cache: None,
            queue: OnceCell::new(),
        }
    }

    /// The wrapped backend.
    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// The attached cache, if any.
    pub fn cache(&self) -> Option<&Arc<dyn FileSystem>> {
        self.cache.as_ref()
    }

    /// Whether `ready` has completed.
    pub fn is_ready(&self) -> bool {
        self.queue.initialized()
    }

    /// Mutations queued but not yet replayed.
    pub fn pending(&self) -> usize {
        self.active().map_or(0, |(_, queue)| queue.pending())
    }

    /// Wait for every queued mutation to reach the backend.
    ///
    /// Returns the first replay failure since the previous drain. The cache
    /// keeps the failed mutation either way.
    pub async fn drain(&self) -> Result<()> {
        match self.active() {
            Some((_, queue)) => queue.drain().await,
            None => Ok(()),
        }
    }

    async fn init(&self) -> Result<Option<ReplayQueue>> {
        self.backend.ready().await?;
        let Some(cache) = &self.cache else {
            return Ok(None);
        };
        if let Err(err) = bridge::copy_in(self.backend.as_ref(), cache.as_ref()).await {
            // A partial copy would make the retry fail with EEXIST.
            if let Err(_clear_err) = bridge::clear_cache(cache.as_ref()) {
                #[cfg(feature = "logging")]
                tracing::warn!(error = %_clear_err, "failed to clear cache after copy-in error");
            }
            return Err(err);
        }
        let backend: Arc<dyn AsyncBackend> = self.backend.clone();
        Ok(Some(ReplayQueue::spawn(backend)))
    }

    fn active(&self) -> Option<(&Arc<dyn FileSystem>, &ReplayQueue)> {
        match (self.cache.as_ref(), self.queue.get()) {
            (Some(cache), Some(Some(queue))) => Some((cache, queue)),
            _ => None,
        }
    }

    /// Cache and queue for a sync operation, or `ENOTSUP`.
    fn sync_target(
        &self,
        path: &Path,
        syscall: &'static str,
    ) -> Result<(&Arc<dyn FileSystem>, &ReplayQueue)> {
        self.active().ok_or_else(|| {
            let why = if self.cache.is_none() {
                "synchronous operations need a cache"
            } else {
                "synchronous operations are unavailable until ready"
            };
            Error::new(Errno::ENOTSUP, why).at(path).during(syscall)
        })
    }
}

#[async_trait]
impl<B: AsyncBackend + 'static> FileSystem for Asynchronous<B> {
    fn metadata(&self) -> FileSystemMetadata {
        FileSystemMetadata {
            synchronous: false,
            no_async_cache: self.cache.is_none(),
            ..self.backend.metadata()
        }
    }

    async fn ready(&self) -> Result<()> {
        self.queue.get_or_try_init(|| self.init()).await?;
        Ok(())
    }

    async fn rename(&self, old_path: &Path, new_path: &Path, cred: &Credentials) -> Result<()> {
        self.ready().await?;
        match self.active() {
            Some((cache, queue)) => {
                cache.rename_sync(old_path, new_path, cred)?;
                queue
                    .submit(ReplayJob::Rename {
                        old_path: old_path.to_path_buf(),
                        new_path: new_path.to_path_buf(),
                        cred: cred.clone(),
                    })
                    .await
            }
            None => self.backend.rename(old_path, new_path, cred).await,
        }
    }

    fn rename_sync(&self, old_path: &Path, new_path: &Path, cred: &Credentials) -> Result<()> {
        let (cache, queue) = self.sync_target(old_path, "rename")?;
        cache.rename_sync(old_path, new_path, cred)?;
        queue.push(ReplayJob::Rename {
            old_path: old_path.to_path_buf(),
            new_path: new_path.to_path_buf(),
            cred: cred.clone(),
        });
        Ok(())
    }

    async fn stat(&self, path: &Path, cred: &Credentials) -> Result<Stats> {
        self.ready().await?;
        match self.active() {
            Some((cache, _)) => cache.stat_sync(path, cred),
            None => self.backend.stat(path, cred).await,
        }
    }

    fn stat_sync(&self, path: &Path, cred: &Credentials) -> Result<Stats> {
        let (cache, _) = self.sync_target(path, "stat")?;
        cache.stat_sync(path, cred)
    }

    async fn open_file(
        &self,
        path: &Path,
        flags: OpenFlags,
        cred: &Credentials,
    ) -> Result<FileData> {
        self.ready().await?;
        match self.active() {
            Some((cache, _)) => cache.open_file_sync(path, flags, cred),
            None => self.backend.open_file(path, flags, cred).await,
        }
    }

    fn open_file_sync(
        &self,
        path: &Path,
        flags: OpenFlags,
        cred: &Credentials,
    ) -> Result<FileData> {
        let (cache, _) = self.sync_target(path, "open")?;
        cache.open_file_sync(path, flags, cred)
    }

    async fn create_file(
        &self,
        path: &Path,
        flags: OpenFlags,
        mode: u32,
        cred: &Credentials,
    ) -> Result<FileData> {
        self.ready().await?;
        match self.active() {
            Some((cache, queue)) => {
                let data = cache.create_file_sync(path, flags, mode, cred)?;
                queue
                    .submit(ReplayJob::CreateFile {
                        path: path.to_path_buf(),
                        flags,
                        mode,
                        cred: cred.clone(),
                    })
                    .await?;
                Ok(data)
            }
            None => self.backend.create_file(path, flags, mode, cred).await,
        }
    }

    fn create_file_sync(
        &self,
        path: &Path,
        flags: OpenFlags,
        mode: u32,
        cred: &Credentials,
    ) -> Result<FileData> {
        let (cache, queue) = self.sync_target(path, "open")?;
        let data = cache.create_file_sync(path, flags, mode, cred)?;
        queue.push(ReplayJob::CreateFile {
            path: path.to_path_buf(),
            flags,
            mode,
            cred: cred.clone(),
        });
        Ok(data)
    }

    async fn unlink(&self, path: &Path, cred: &Credentials) -> Result<()> {
        self.ready().await?;
        match self.active() {
            Some((cache, queue)) => {
                cache.unlink_sync(path, cred)?;
                queue
                    .submit(ReplayJob::Unlink {
                        path: path.to_path_buf(),
                        cred: cred.clone(),
                    })
                    .await
            }
            None => self.backend.unlink(path, cred).await,
        }
    }

    fn unlink_sync(&self, path: &Path, cred: &Credentials) -> Result<()> {
        let (cache, queue) = self.sync_target(path, "unlink")?;
        cache.unlink_sync(path, cred)?;
        queue.push(ReplayJob::Unlink {
            path: path.to_path_buf(),
            cred: cred.clone(),
        });
        Ok(())
    }

    async fn rmdir(&self, path: &Path, cred: &Credentials) -> Result<()> {
        self.ready().await?;
        match self.active() {
            Some((cache, queue)) => {
                cache.rmdir_sync(path, cred)?;
                queue
                    .submit(ReplayJob::Rmdir {
                        path: path.to_path_buf(),
                        cred: cred.clone(),
                    })
                    .await
            }
            None => self.backend.rmdir(path, cred).await,
        }
    }

    fn rmdir_sync(&self, path: &Path, cred: &Credentials) -> Result<()> {
        let (cache, queue) = self.sync_target(path, "rmdir")?;
        cache.rmdir_sync(path, cred)?;
        queue.push(ReplayJob::Rmdir {
            path: path.to_path_buf(),
            cred: cred.clone(),
        });
        Ok(())
    }

    async fn mkdir(&self, path: &Path, mode: u32, cred: &Credentials) -> Result<()> {
        self.ready().await?;
        match self.active() {
            Some((cache, queue)) => {
                cache.mkdir_sync(path, mode, cred)?;
                queue
                    .submit(ReplayJob::Mkdir {
                        path: path.to_path_buf(),
                        mode,
                        cred: cred.clone(),
                    })
                    .await
            }
            None => self.backend.mkdir(path, mode, cred).await,
        }
    }

    fn mkdir_sync(&self, path: &Path, mode: u32, cred: &Credentials) -> Result<()> {
        let (cache, queue) = self.sync_target(path, "mkdir")?;
        cache.mkdir_sync(path, mode, cred)?;
        queue.push(ReplayJob::Mkdir {
            path: path.to_path_buf(),
            mode,
            cred: cred.clone(),
        });
        Ok(())
    }

    async fn readdir(&self, path: &Path, cred: &Credentials) -> Result<Vec<String>> {
        self.ready().await?;
        match self.active() {
            Some((cache, _)) => cache.readdir_sync(path, cred),
            None => self.backend.readdir(path, cred).await,
        }
    }

    fn readdir_sync(&self, path: &Path, cred: &Credentials) -> Result<Vec<String>> {
        let (cache, _) = self.sync_target(path, "readdir")?;
        cache.readdir_sync(path, cred)
    }

    async fn link(&self, target: &Path, new_path: &Path, cred: &Credentials) -> Result<()> {
        self.ready().await?;
        match self.active() {
            Some((cache, queue)) => {
                cache.link_sync(target, new_path, cred)?;
                queue
                    .submit(ReplayJob::Link {
                        target: target.to_path_buf(),
                        new_path: new_path.to_path_buf(),
                        cred: cred.clone(),
                    })
                    .await
            }
            None => self.backend.link(target, new_path, cred).await,
        }
    }

    fn link_sync(&self, target: &Path, new_path: &Path, cred: &Credentials) -> Result<()> {
        let (cache, queue) = self.sync_target(new_path, "link")?;
        cache.link_sync(target, new_path, cred)?;
        queue.push(ReplayJob::Link {
            target: target.to_path_buf(),
            new_path: new_path.to_path_buf(),
            cred: cred.clone(),
        });
        Ok(())
    }

    async fn sync(&self, path: &Path, data: &[u8], stats: &Stats) -> Result<()> {
        self.ready().await?;
        match self.active() {
            Some((cache, queue)) => {
                cache.sync_sync(path, data, stats)?;
                queue
                    .submit(ReplayJob::Sync {
                        path: path.to_path_buf(),
                        data: data.to_vec(),
                        stats: *stats,
                    })
                    .await
            }
            None => self.backend.sync(path, data, stats).await,
        }
    }

    fn sync_sync(&self, path: &Path, data: &[u8], stats: &Stats) -> Result<()> {
        let (cache, queue) = self.sync_target(path, "sync")?;
        cache.sync_sync(path, data, stats)?;
        queue.push(ReplayJob::Sync {
            path: path.to_path_buf(),
            data: data.to_vec(),
            stats: *stats,
        });
        Ok(())
    }
}
