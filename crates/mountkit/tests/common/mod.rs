//! Shared test fixtures

#![allow(dead_code)]

use mountkit::{
    AsyncBackend, Credentials, Errno, Error, FileData, FileSystem, FileSystemMetadata, InMemory,
    OpenFlags, Result, Stats, SyncBackend, Synchronous, async_trait,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

pub fn root() -> Credentials {
    Credentials::root()
}

pub fn memfs() -> Arc<dyn FileSystem> {
    Arc::new(Synchronous::new(InMemory::new()))
}

/// Async backend over an in-memory store that yields before every call and
/// records each mutation it receives.
#[derive(Default)]
pub struct RecordingBackend {
    store: InMemory,
    log: Mutex<Vec<String>>,
    fail_path: Mutex<Option<PathBuf>>,
    fail_next_open: AtomicBool,
    no_cache: bool,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend that refuses a synchronous cache.
    pub fn uncached() -> Self {
        Self {
            no_cache: true,
            ..Self::default()
        }
    }

    /// Seed the store directly, bypassing the log.
    pub fn seed_dir(&self, path: &str) {
        SyncBackend::mkdir(&self.store, Path::new(path), 0o755, &root()).unwrap();
    }

    pub fn seed_file(&self, path: &str, data: &[u8]) {
        let path = Path::new(path);
        let created = SyncBackend::create_file(
            &self.store,
            path,
            OpenFlags::parse("w").unwrap(),
            0o640,
            &Credentials::new(1000, 1000),
        )
        .unwrap();
        SyncBackend::sync(&self.store, path, data, &created.stats).unwrap();
    }

    /// Mutations on this path fail with `EIO`.
    pub fn fail_on(&self, path: &str) {
        *self.fail_path.lock().unwrap() = Some(PathBuf::from(path));
    }

    /// The next `open_file` fails with `EIO`; later ones succeed.
    pub fn fail_next_open(&self) {
        self.fail_next_open.store(true, Ordering::SeqCst);
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn contents(&self, path: &str) -> Option<Vec<u8>> {
        SyncBackend::open_file(&self.store, Path::new(path), OpenFlags::READ, &root())
            .ok()
            .map(|data| data.contents)
    }

    pub fn has(&self, path: &str) -> bool {
        SyncBackend::stat(&self.store, Path::new(path), &root()).is_ok()
    }

    async fn record(&self, op: &str, path: &Path) -> Result<()> {
        tokio::task::yield_now().await;
        if self.fail_path.lock().unwrap().as_deref() == Some(path) {
            return Err(Error::with(Errno::EIO, path, "replay"));
        }
        self.log
            .lock()
            .unwrap()
            .push(format!("{} {}", op, path.display()));
        Ok(())
    }
}

#[async_trait]
impl AsyncBackend for RecordingBackend {
    fn metadata(&self) -> FileSystemMetadata {
        FileSystemMetadata {
            no_async_cache: self.no_cache,
            ..FileSystemMetadata::named("Recording")
        }
    }

    async fn rename(&self, old_path: &Path, new_path: &Path, cred: &Credentials) -> Result<()> {
        self.record("rename", old_path).await?;
        SyncBackend::rename(&self.store, old_path, new_path, cred)
    }

    async fn stat(&self, path: &Path, cred: &Credentials) -> Result<Stats> {
        tokio::task::yield_now().await;
        SyncBackend::stat(&self.store, path, cred)
    }

    async fn open_file(&self, path: &Path, flags: OpenFlags, cred: &Credentials) -> Result<FileData> {
        tokio::task::yield_now().await;
        if self.fail_next_open.swap(false, Ordering::SeqCst) {
            return Err(Error::with(Errno::EIO, path, "open"));
        }
        SyncBackend::open_file(&self.store, path, flags, cred)
    }

    async fn create_file(
        &self,
        path: &Path,
        flags: OpenFlags,
        mode: u32,
        cred: &Credentials,
    ) -> Result<FileData> {
        self.record("create", path).await?;
        SyncBackend::create_file(&self.store, path, flags, mode, cred)
    }

    async fn unlink(&self, path: &Path, cred: &Credentials) -> Result<()> {
        self.record("unlink", path).await?;
        SyncBackend::unlink(&self.store, path, cred)
    }

    async fn rmdir(&self, path: &Path, cred: &Credentials) -> Result<()> {
        self.record("rmdir", path).await?;
        SyncBackend::rmdir(&self.store, path, cred)
    }

    async fn mkdir(&self, path: &Path, mode: u32, cred: &Credentials) -> Result<()> {
        self.record("mkdir", path).await?;
        SyncBackend::mkdir(&self.store, path, mode, cred)
    }

    async fn readdir(&self, path: &Path, cred: &Credentials) -> Result<Vec<String>> {
        tokio::task::yield_now().await;
        SyncBackend::readdir(&self.store, path, cred)
    }

    async fn link(&self, target: &Path, new_path: &Path, cred: &Credentials) -> Result<()> {
        self.record("link", new_path).await?;
        SyncBackend::link(&self.store, target, new_path, cred)
    }

    async fn sync(&self, path: &Path, data: &[u8], stats: &Stats) -> Result<()> {
        self.record("sync", path).await?;
        SyncBackend::sync(&self.store, path, data, stats)
    }
}
