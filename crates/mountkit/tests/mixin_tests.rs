//! Tests for wrapping user-supplied backends
//!
//! These also verify that everything needed to write a backend is exported
//! from the crate root.

mod common;

use common::root;
use mountkit::{
    Credentials, Errno, FileData, FileSystem, FileSystemMetadata, InMemory, OpenFlags, ReadOnly,
    Result, Stats, SyncBackend, Synchronous, Vfs,
};
use pretty_assertions::assert_eq;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Delegates to an in-memory store and counts calls.
#[derive(Default)]
struct CountingBackend {
    inner: InMemory,
    calls: AtomicUsize,
}

impl CountingBackend {
    fn tick(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SyncBackend for CountingBackend {
    fn metadata(&self) -> FileSystemMetadata {
        FileSystemMetadata {
            no_resizable_buffers: true,
            ..FileSystemMetadata::named("Counting")
        }
    }

    fn rename(&self, old_path: &Path, new_path: &Path, cred: &Credentials) -> Result<()> {
        self.tick();
        self.inner.rename(old_path, new_path, cred)
    }

    fn stat(&self, path: &Path, cred: &Credentials) -> Result<Stats> {
        self.tick();
        self.inner.stat(path, cred)
    }

    fn open_file(&self, path: &Path, flags: OpenFlags, cred: &Credentials) -> Result<FileData> {
        self.tick();
        self.inner.open_file(path, flags, cred)
    }

    fn create_file(
        &self,
        path: &Path,
        flags: OpenFlags,
        mode: u32,
        cred: &Credentials,
    ) -> Result<FileData> {
        self.tick();
        self.inner.create_file(path, flags, mode, cred)
    }

    fn unlink(&self, path: &Path, cred: &Credentials) -> Result<()> {
        self.tick();
        self.inner.unlink(path, cred)
    }

    fn rmdir(&self, path: &Path, cred: &Credentials) -> Result<()> {
        self.tick();
        self.inner.rmdir(path, cred)
    }

    fn mkdir(&self, path: &Path, mode: u32, cred: &Credentials) -> Result<()> {
        self.tick();
        self.inner.mkdir(path, mode, cred)
    }

    fn readdir(&self, path: &Path, cred: &Credentials) -> Result<Vec<String>> {
        self.tick();
        self.inner.readdir(path, cred)
    }

    fn link(&self, target: &Path, new_path: &Path, cred: &Credentials) -> Result<()> {
        self.tick();
        self.inner.link(target, new_path, cred)
    }

    fn sync(&self, path: &Path, data: &[u8], stats: &Stats) -> Result<()> {
        self.tick();
        self.inner.sync(path, data, stats)
    }
}

#[tokio::test]
async fn test_async_forms_delegate_to_sync_backend() {
    let fs = Synchronous::new(CountingBackend::default());
    let meta = fs.metadata();
    assert!(meta.synchronous);
    assert_eq!(meta.name, "Counting");

    fs.mkdir(Path::new("/d"), 0o755, &root()).await.unwrap();
    fs.mkdir_sync(Path::new("/e"), 0o755, &root()).unwrap();
    assert_eq!(fs.backend().calls(), 2);
    assert_eq!(
        fs.readdir(Path::new("/"), &root()).await.unwrap(),
        fs.readdir_sync(Path::new("/"), &root()).unwrap()
    );
    assert!(fs.exists(Path::new("/d"), &root()).await.unwrap());
    assert!(!fs.exists_sync(Path::new("/nope"), &root()).unwrap());
}

#[tokio::test]
async fn test_custom_backend_under_vfs() {
    let fs = Arc::new(Synchronous::new(CountingBackend::default()));
    let vfs = Vfs::builder().root(fs.clone()).build().await.unwrap();

    // Reallocating buffers behave the same from the outside.
    let fd = vfs
        .open("/grow", OpenFlags::parse("w+").unwrap(), 0o644, &root())
        .await
        .unwrap();
    for chunk in [&b"ab"[..], b"cdef", b"ghijklmn"] {
        vfs.write(fd, chunk, None).await.unwrap();
    }
    vfs.close(fd).await.unwrap();
    assert_eq!(vfs.read_file("/grow", &root()).await.unwrap(), b"abcdefghijklmn");
    assert!(fs.backend().calls() > 0);
}

#[tokio::test]
async fn test_readonly_matches_inner_for_reads() {
    let inner: Arc<dyn FileSystem> = Arc::new(Synchronous::new(InMemory::new()));
    inner.mkdir_sync(Path::new("/a"), 0o755, &root()).unwrap();
    let data = inner
        .create_file_sync(Path::new("/a/f"), OpenFlags::parse("w").unwrap(), 0o644, &root())
        .unwrap();
    inner.sync_sync(Path::new("/a/f"), b"xyz", &data.stats).unwrap();

    let ro = ReadOnly::new(inner.clone());
    assert!(ro.metadata().readonly);
    for path in ["/", "/a", "/a/f"] {
        let path = Path::new(path);
        assert_eq!(
            ro.stat(path, &root()).await.unwrap(),
            inner.stat(path, &root()).await.unwrap()
        );
        assert_eq!(
            ro.exists_sync(path, &root()).unwrap(),
            inner.exists_sync(path, &root()).unwrap()
        );
    }
    assert_eq!(
        ro.readdir(Path::new("/a"), &root()).await.unwrap(),
        inner.readdir(Path::new("/a"), &root()).await.unwrap()
    );
    let loaded = ro
        .open_file(Path::new("/a/f"), OpenFlags::READ, &root())
        .await
        .unwrap();
    assert_eq!(loaded.contents, b"xyz");
}

#[tokio::test]
async fn test_readonly_rejects_every_mutator() {
    let inner: Arc<dyn FileSystem> = Arc::new(Synchronous::new(InMemory::new()));
    inner.mkdir_sync(Path::new("/d"), 0o755, &root()).unwrap();
    let ro = ReadOnly::new(inner);
    let cred = root();
    let p = Path::new("/d");
    let q = Path::new("/q");
    let stats = ro.stat(p, &cred).await.unwrap();

    let results = vec![
        ro.rename(p, q, &cred).await.err(),
        ro.rename_sync(p, q, &cred).err(),
        ro.create_file(q, OpenFlags::parse("w").unwrap(), 0o644, &cred).await.err(),
        ro.create_file_sync(q, OpenFlags::parse("w").unwrap(), 0o644, &cred).err(),
        ro.unlink(p, &cred).await.err(),
        ro.unlink_sync(p, &cred).err(),
        ro.rmdir(p, &cred).await.err(),
        ro.rmdir_sync(p, &cred).err(),
        ro.mkdir(q, 0o755, &cred).await.err(),
        ro.mkdir_sync(q, 0o755, &cred).err(),
        ro.link(p, q, &cred).await.err(),
        ro.link_sync(p, q, &cred).err(),
        ro.sync(p, b"", &stats).await.err(),
        ro.sync_sync(p, b"", &stats).err(),
        ro.open_file(p, OpenFlags::parse("r+").unwrap(), &cred).await.err(),
        ro.open_file_sync(p, OpenFlags::parse("a").unwrap(), &cred).err(),
    ];
    for err in results {
        let err = err.expect("mutator should fail");
        assert!(err.is(Errno::EROFS), "{}", err);
    }
}
