//! The virtual filesystem façade.
//!
//! [`Vfs`] owns the state shared by every caller: the mount table, the
//! file-descriptor table, the per-path lock table and the default
//! credentials. Paths given to it are absolute in the combined namespace; it
//! resolves each one to a mounted [`FileSystem`] and a path inside it.

// RwLock.read()/write().unwrap() only panics on lock poisoning (prior panic
// while holding lock). This is intentional - corrupted state should not propagate.
#![allow(clippy::unwrap_used)]

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use crate::config::VfsConfig;
use crate::constants::S_IFMT;
use crate::cred::Credentials;
use crate::error::{Errno, Error, Result};
use crate::file::{File, PreloadFile};
use crate::flags::OpenFlags;
use crate::fs::{FileData, FileSystem, InMemory, MountTable, Resolved, Synchronous};
use crate::logging_impl::LogConfig;
use crate::mutex::PathMutex;
use crate::path::{dirname, normalize};
use crate::stats::{Stats, now_ms};

/// File descriptor.
pub type Fd = u32;

/// Lowest descriptor handed out; 0-2 are left for stdio.
pub const FIRST_FD: Fd = 3;

/// Permission bits for files created by `write_file`/`append_file`.
const DEFAULT_FILE_MODE: u32 = 0o644;

type Handle = Arc<tokio::sync::Mutex<Box<dyn File>>>;

/// Builder for [`Vfs`].
///
/// # Example
///
/// ```rust
/// use mountkit::{Credentials, InMemory, Synchronous, Vfs};
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> mountkit::Result<()> {
/// let vfs = Vfs::builder()
///     .mount("/tmp", Arc::new(Synchronous::new(InMemory::new())))
///     .credentials(Credentials::new(1000, 1000))
///     .check_access(false)
///     .build()
///     .await?;
///
/// let cred = vfs.credentials().clone();
/// vfs.write_file("/tmp/note.txt", b"hello", &cred).await?;
/// assert_eq!(vfs.read_file("/tmp/note.txt", &cred).await?, b"hello");
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct VfsBuilder {
    root: Option<Arc<dyn FileSystem>>,
    mounts: Vec<(PathBuf, Arc<dyn FileSystem>)>,
    config: VfsConfig,
    log_config: LogConfig,
}

impl VfsBuilder {
    /// Filesystem mounted at `/` (default: an empty [`InMemory`]).
    pub fn root(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.root = Some(fs);
        self
    }

    /// Additional mount.
    pub fn mount(mut self, point: impl Into<PathBuf>, fs: Arc<dyn FileSystem>) -> Self {
        self.mounts.push((point.into(), fs));
        self
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: VfsConfig) -> Self {
        self.config = config;
        self
    }

    /// Default credentials.
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.config.credentials = credentials;
        self
    }

    /// Enforce permission checks.
    pub fn check_access(mut self, enabled: bool) -> Self {
        self.config.check_access = enabled;
        self
    }

    /// Reads update `atime`.
    pub fn update_on_read(mut self, enabled: bool) -> Self {
        self.config.update_on_read = enabled;
        self
    }

    /// Flush open files after every mutation.
    pub fn sync_immediately(mut self, enabled: bool) -> Self {
        self.config.sync_immediately = enabled;
        self
    }

    /// Logging behaviour.
    pub fn log_config(mut self, log_config: LogConfig) -> Self {
        self.log_config = log_config;
        self
    }

    /// Mount everything and wait for every filesystem to become ready.
    pub async fn build(self) -> Result<Vfs> {
        let root = self.root.unwrap_or_else(default_root);
        root.ready().await?;
        let mounts = MountTable::new(root);
        for (point, fs) in self.mounts {
            fs.ready().await?;
            mounts.mount(point, fs)?;
        }
        Ok(Vfs {
            mounts,
            fds: RwLock::new(BTreeMap::new()),
            locks: PathMutex::new(),
            config: self.config,
            log_config: self.log_config,
        })
    }
}

fn default_root() -> Arc<dyn FileSystem> {
    Arc::new(Synchronous::new(InMemory::new()))
}

/// Virtual filesystem.
///
/// Every operation takes the credentials it runs as. Operations with a
/// `_sync` twin behave identically in both forms; the sync form fails with
/// `ENOTSUP` where the serving filesystem has no synchronous path.
pub struct Vfs {
    mounts: MountTable,
    fds: RwLock<BTreeMap<Fd, Handle>>,
    locks: PathMutex,
    config: VfsConfig,
    log_config: LogConfig,
}

impl Default for Vfs {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Vfs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vfs")
            .field("mounts", &self.mounts)
            .field("open_fds", &self.fds.read().unwrap().keys().collect::<Vec<_>>())
            .field("config", &self.config)
            .finish()
    }
}

/// Rewrite a backend-relative error path into the combined namespace.
fn absolute_error(mut e: Error, mount_point: &Path) -> Error {
    if let Some(p) = e.path.take() {
        let rel = p.strip_prefix("/").unwrap_or(&p);
        e.path = Some(mount_point.join(rel));
    }
    e
}

fn in_mount(r: &Resolved) -> impl Fn(Error) -> Error + '_ {
    move |e| absolute_error(e, &r.mount_point)
}

impl Vfs {
    /// Empty in-memory filesystem with default configuration.
    pub fn new() -> Self {
        Self {
            mounts: MountTable::new(default_root()),
            fds: RwLock::new(BTreeMap::new()),
            locks: PathMutex::new(),
            config: VfsConfig::default(),
            log_config: LogConfig::default(),
        }
    }

    /// Start building a customized instance.
    pub fn builder() -> VfsBuilder {
        VfsBuilder::default()
    }

    /// Active configuration.
    pub fn config(&self) -> &VfsConfig {
        &self.config
    }

    /// Default credentials.
    pub fn credentials(&self) -> &Credentials {
        &self.config.credentials
    }

    /// The mount table.
    pub fn mounts(&self) -> &MountTable {
        &self.mounts
    }

    /// The per-path lock table.
    pub fn locks(&self) -> &PathMutex {
        &self.locks
    }

    /// Credentials as passed to backends: raised to root when access checks
    /// are disabled.
    fn effective<'a>(&self, cred: &'a Credentials) -> Cow<'a, Credentials> {
        if self.config.check_access {
            Cow::Borrowed(cred)
        } else {
            Cow::Owned(cred.elevated())
        }
    }

    // ========================================================================
    // Mounts and locks
    // ========================================================================

    /// Wait for `fs` to become ready, then attach it at `point`.
    pub async fn mount(&self, point: impl AsRef<Path>, fs: Arc<dyn FileSystem>) -> Result<()> {
        fs.ready().await?;
        self.mounts.mount(point, fs)
    }

    /// Detach the filesystem at `point`.
    pub fn umount(&self, point: impl AsRef<Path>) -> Result<Arc<dyn FileSystem>> {
        self.mounts.umount(point)
    }

    /// Take the per-path lock on `path`.
    pub async fn lock(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = normalize(path)?;
        self.locks.lock(&path.to_string_lossy()).await;
        Ok(())
    }

    /// Release the per-path lock on `path`. `EPERM` if not held.
    pub fn unlock(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = normalize(path)?;
        self.locks.unlock(&path.to_string_lossy())
    }

    // ========================================================================
    // Path operations
    // ========================================================================

    /// Stats of `path`.
    pub async fn stat(&self, path: impl AsRef<Path>, cred: &Credentials) -> Result<Stats> {
        let r = self.mounts.resolve(path)?;
        r.fs
            .stat(&r.path, &self.effective(cred))
            .await
            .map_err(in_mount(&r))
    }

    /// Sync form of [`stat`](Self::stat).
    pub fn stat_sync(&self, path: impl AsRef<Path>, cred: &Credentials) -> Result<Stats> {
        let r = self.mounts.resolve(path)?;
        r.fs
            .stat_sync(&r.path, &self.effective(cred))
            .map_err(in_mount(&r))
    }

    /// Whether `path` exists. Mount points always exist.
    pub async fn exists(&self, path: impl AsRef<Path>, cred: &Credentials) -> Result<bool> {
        let r = self.mounts.resolve(path)?;
        if r.path == Path::new("/") {
            return Ok(true);
        }
        r.fs
            .exists(&r.path, &self.effective(cred))
            .await
            .map_err(in_mount(&r))
    }

    /// Sync form of [`exists`](Self::exists).
    pub fn exists_sync(&self, path: impl AsRef<Path>, cred: &Credentials) -> Result<bool> {
        let r = self.mounts.resolve(path)?;
        if r.path == Path::new("/") {
            return Ok(true);
        }
        r.fs
            .exists_sync(&r.path, &self.effective(cred))
            .map_err(in_mount(&r))
    }

    /// Create a directory. `EEXIST` on a mount point.
    pub async fn mkdir(&self, path: impl AsRef<Path>, mode: u32, cred: &Credentials) -> Result<()> {
        let r = self.mounts.resolve(path)?;
        if r.path == Path::new("/") {
            return Err(Error::with(Errno::EEXIST, &r.mount_point, "mkdir"));
        }
        r.fs
            .mkdir(&r.path, mode, &self.effective(cred))
            .await
            .map_err(in_mount(&r))
    }

    /// Sync form of [`mkdir`](Self::mkdir).
    pub fn mkdir_sync(&self, path: impl AsRef<Path>, mode: u32, cred: &Credentials) -> Result<()> {
        let r = self.mounts.resolve(path)?;
        if r.path == Path::new("/") {
            return Err(Error::with(Errno::EEXIST, &r.mount_point, "mkdir"));
        }
        r.fs
            .mkdir_sync(&r.path, mode, &self.effective(cred))
            .map_err(in_mount(&r))
    }

    /// Remove an empty directory. `EBUSY` on a mount point.
    pub async fn rmdir(&self, path: impl AsRef<Path>, cred: &Credentials) -> Result<()> {
        let r = self.mounts.resolve(path)?;
        if r.path == Path::new("/") {
            return Err(Error::with(Errno::EBUSY, &r.mount_point, "rmdir"));
        }
        r.fs
            .rmdir(&r.path, &self.effective(cred))
            .await
            .map_err(in_mount(&r))
    }

    /// Sync form of [`rmdir`](Self::rmdir).
    pub fn rmdir_sync(&self, path: impl AsRef<Path>, cred: &Credentials) -> Result<()> {
        let r = self.mounts.resolve(path)?;
        if r.path == Path::new("/") {
            return Err(Error::with(Errno::EBUSY, &r.mount_point, "rmdir"));
        }
        r.fs
            .rmdir_sync(&r.path, &self.effective(cred))
            .map_err(in_mount(&r))
    }

    /// Remove a file.
    pub async fn unlink(&self, path: impl AsRef<Path>, cred: &Credentials) -> Result<()> {
        let r = self.mounts.resolve(path)?;
        r.fs
            .unlink(&r.path, &self.effective(cred))
            .await
            .map_err(in_mount(&r))
    }

    /// Sync form of [`unlink`](Self::unlink).
    pub fn unlink_sync(&self, path: impl AsRef<Path>, cred: &Credentials) -> Result<()> {
        let r = self.mounts.resolve(path)?;
        r.fs
            .unlink_sync(&r.path, &self.effective(cred))
            .map_err(in_mount(&r))
    }

    /// Entry names of a directory, including mount points directly below it.
    pub async fn readdir(&self, path: impl AsRef<Path>, cred: &Credentials) -> Result<Vec<String>> {
        let path = normalize(path)?;
        let r = self.mounts.resolve(&path)?;
        let entries = r
            .fs
            .readdir(&r.path, &self.effective(cred))
            .await
            .map_err(in_mount(&r))?;
        Ok(self.with_child_mounts(&path, entries))
    }

    /// Sync form of [`readdir`](Self::readdir).
    pub fn readdir_sync(&self, path: impl AsRef<Path>, cred: &Credentials) -> Result<Vec<String>> {
        let path = normalize(path)?;
        let r = self.mounts.resolve(&path)?;
        let entries = r
            .fs
            .readdir_sync(&r.path, &self.effective(cred))
            .map_err(in_mount(&r))?;
        Ok(self.with_child_mounts(&path, entries))
    }

    fn with_child_mounts(&self, dir: &Path, mut entries: Vec<String>) -> Vec<String> {
        entries.extend(self.mounts.child_mounts(dir));
        entries.sort();
        entries.dedup();
        entries
    }

    /// Resolve both ends of a two-path operation; `EBUSY` if either is a
    /// mount point.
    fn resolve_pair(
        &self,
        from: impl AsRef<Path>,
        to: impl AsRef<Path>,
        syscall: &'static str,
    ) -> Result<(Resolved, Resolved)> {
        let from = self.mounts.resolve(from)?;
        let to = self.mounts.resolve(to)?;
        for r in [&from, &to] {
            if r.path == Path::new("/") {
                return Err(Error::with(Errno::EBUSY, &r.mount_point, syscall));
            }
        }
        Ok((from, to))
    }

    /// Move a file or directory.
    ///
    /// Within one filesystem this is the backend's rename. Across mounts a
    /// file is copied and then unlinked; a directory fails with `EXDEV`.
    pub async fn rename(
        &self,
        old_path: impl AsRef<Path>,
        new_path: impl AsRef<Path>,
        cred: &Credentials,
    ) -> Result<()> {
        let (from, to) = self.resolve_pair(old_path, new_path, "rename")?;
        let cred = self.effective(cred);
        if from.mount_point == to.mount_point {
            return from
                .fs
                .rename(&from.path, &to.path, &cred)
                .await
                .map_err(in_mount(&from));
        }

        let stats = from.fs.stat(&from.path, &cred).await.map_err(in_mount(&from))?;
        if stats.is_directory() {
            return Err(Error::with(Errno::EXDEV, absolute(&from), "rename"));
        }
        let data = from
            .fs
            .open_file(&from.path, OpenFlags::READ, &cred)
            .await
            .map_err(in_mount(&from))?;
        match to.fs.stat(&to.path, &cred).await {
            Ok(existing) if existing.is_directory() => {
                return Err(Error::with(Errno::EISDIR, absolute(&to), "rename"));
            }
            Ok(_) => to.fs.unlink(&to.path, &cred).await.map_err(in_mount(&to))?,
            Err(e) if e.is(Errno::ENOENT) => {}
            Err(e) => return Err(absolute_error(e, &to.mount_point)),
        }
        to.fs
            .create_file(&to.path, OpenFlags::parse("w")?, stats.mode_bits() & !S_IFMT, &cred)
            .await
            .map_err(in_mount(&to))?;
        to.fs
            .sync(&to.path, &data.contents, &data.stats)
            .await
            .map_err(in_mount(&to))?;
        from.fs.unlink(&from.path, &cred).await.map_err(in_mount(&from))
    }

    /// Sync form of [`rename`](Self::rename).
    pub fn rename_sync(
        &self,
        old_path: impl AsRef<Path>,
        new_path: impl AsRef<Path>,
        cred: &Credentials,
    ) -> Result<()> {
        let (from, to) = self.resolve_pair(old_path, new_path, "rename")?;
        let cred = self.effective(cred);
        if from.mount_point == to.mount_point {
            return from
                .fs
                .rename_sync(&from.path, &to.path, &cred)
                .map_err(in_mount(&from));
        }

        let stats = from.fs.stat_sync(&from.path, &cred).map_err(in_mount(&from))?;
        if stats.is_directory() {
            return Err(Error::with(Errno::EXDEV, absolute(&from), "rename"));
        }
        let data = from
            .fs
            .open_file_sync(&from.path, OpenFlags::READ, &cred)
            .map_err(in_mount(&from))?;
        match to.fs.stat_sync(&to.path, &cred) {
            Ok(existing) if existing.is_directory() => {
                return Err(Error::with(Errno::EISDIR, absolute(&to), "rename"));
            }
            Ok(_) => to.fs.unlink_sync(&to.path, &cred).map_err(in_mount(&to))?,
            Err(e) if e.is(Errno::ENOENT) => {}
            Err(e) => return Err(absolute_error(e, &to.mount_point)),
        }
        to.fs
            .create_file_sync(&to.path, OpenFlags::parse("w")?, stats.mode_bits() & !S_IFMT, &cred)
            .map_err(in_mount(&to))?;
        to.fs
            .sync_sync(&to.path, &data.contents, &data.stats)
            .map_err(in_mount(&to))?;
        from.fs.unlink_sync(&from.path, &cred).map_err(in_mount(&from))
    }

    /// Create a hard link. `EXDEV` across mounts.
    pub async fn link(
        &self,
        target: impl AsRef<Path>,
        new_path: impl AsRef<Path>,
        cred: &Credentials,
    ) -> Result<()> {
        let (from, to) = self.resolve_pair(target, new_path, "link")?;
        if from.mount_point != to.mount_point {
            return Err(Error::with(Errno::EXDEV, absolute(&to), "link"));
        }
        from.fs
            .link(&from.path, &to.path, &self.effective(cred))
            .await
            .map_err(in_mount(&from))
    }

    /// Sync form of [`link`](Self::link).
    pub fn link_sync(
        &self,
        target: impl AsRef<Path>,
        new_path: impl AsRef<Path>,
        cred: &Credentials,
    ) -> Result<()> {
        let (from, to) = self.resolve_pair(target, new_path, "link")?;
        if from.mount_point != to.mount_point {
            return Err(Error::with(Errno::EXDEV, absolute(&to), "link"));
        }
        from.fs
            .link_sync(&from.path, &to.path, &self.effective(cred))
            .map_err(in_mount(&from))
    }

    // ========================================================================
    // Metadata updates
    // ========================================================================

    /// Rewrite the stats of `path` with `update`, after checking that `cred`
    /// is root or the owner.
    async fn update_stats(
        &self,
        path: impl AsRef<Path>,
        cred: &Credentials,
        syscall: &'static str,
        update: impl FnOnce(&mut Stats),
    ) -> Result<()> {
        let r = self.mounts.resolve(path)?;
        let cred = self.effective(cred);
        let stats = r.fs.stat(&r.path, &cred).await.map_err(in_mount(&r))?;
        check_owner(&stats, &cred, absolute(&r), syscall)?;

        // Directories sync metadata only; their listing is never rewritten.
        let (mut stats, contents) = if stats.is_directory() {
            (stats, Vec::new())
        } else {
            let FileData { stats, contents } = r
                .fs
                .open_file(&r.path, OpenFlags::READ, &cred.elevated())
                .await
                .map_err(in_mount(&r))?;
            (stats, contents)
        };
        update(&mut stats);
        stats.ctime_ms = now_ms();
        r.fs.sync(&r.path, &contents, &stats).await.map_err(in_mount(&r))
    }

    /// Replace the permission bits of `path`. Root or owner only.
    pub async fn chmod(&self, path: impl AsRef<Path>, mode: u32, cred: &Credentials) -> Result<()> {
        self.update_stats(path, cred, "chmod", |stats| stats.chmod(mode))
            .await
    }

    /// Change the owner of `path`; out-of-range ids are ignored. Root or
    /// owner only.
    pub async fn chown(
        &self,
        path: impl AsRef<Path>,
        uid: i64,
        gid: i64,
        cred: &Credentials,
    ) -> Result<()> {
        self.update_stats(path, cred, "chown", |stats| stats.chown(uid, gid))
            .await
    }

    /// Set access and modification times (ms since epoch). Root or owner only.
    pub async fn utimes(
        &self,
        path: impl AsRef<Path>,
        atime_ms: f64,
        mtime_ms: f64,
        cred: &Credentials,
    ) -> Result<()> {
        self.update_stats(path, cred, "utimes", |stats| {
            stats.atime_ms = atime_ms;
            stats.mtime_ms = mtime_ms;
        })
        .await
    }

    // ========================================================================
    // Opening files
    // ========================================================================

    fn check_existing(
        &self,
        stats: &Stats,
        flags: OpenFlags,
        cred: &Credentials,
        r: &Resolved,
    ) -> Result<()> {
        if flags.is_exclusive() {
            return Err(Error::with(Errno::EEXIST, absolute(r), "open"));
        }
        if stats.is_directory() {
            return Err(Error::with(Errno::EISDIR, absolute(r), "open"));
        }
        if self.config.check_access && !stats.has_access(flags.access_mode(), cred) {
            return Err(Error::with(Errno::EACCES, absolute(r), "open"));
        }
        Ok(())
    }

    fn wrap(&self, r: &Resolved, flags: OpenFlags, data: FileData) -> Result<PreloadFile> {
        PreloadFile::new(
            r.fs.clone(),
            r.path.clone(),
            flags,
            data,
            self.config.file_options(),
        )
        .map_err(in_mount(r))
    }

    /// Open `path` as a buffered file without registering a descriptor.
    ///
    /// A missing file is created (with permission bits `mode`) when `flags`
    /// allow it; the parent must exist and be a directory. An existing file
    /// fails with `EEXIST` under an exclusive flag and is emptied under a
    /// truncating one.
    pub async fn open_file(
        &self,
        path: impl AsRef<Path>,
        flags: OpenFlags,
        mode: u32,
        cred: &Credentials,
    ) -> Result<PreloadFile> {
        let r = self.mounts.resolve(path)?;
        let cred = self.effective(cred);

        match r.fs.stat(&r.path, &cred).await {
            Ok(stats) => {
                self.check_existing(&stats, flags, &cred, &r)?;
                let data = r
                    .fs
                    .open_file(&r.path, flags, &cred)
                    .await
                    .map_err(in_mount(&r))?;
                let mut file = self.wrap(&r, flags, data)?;
                if flags.is_truncating() && flags.is_writeable() {
                    file.truncate(0).await.map_err(in_mount(&r))?;
                    file.sync().await.map_err(in_mount(&r))?;
                }
                Ok(file)
            }
            Err(e) if e.is(Errno::ENOENT) => {
                if !flags.is_creating() {
                    return Err(absolute_error(e, &r.mount_point));
                }
                let parent = r
                    .fs
                    .stat(dirname(&r.path), &cred)
                    .await
                    .map_err(in_mount(&r))?;
                if !parent.is_directory() {
                    return Err(Error::with(Errno::ENOTDIR, absolute(&r), "open"));
                }
                let data = r
                    .fs
                    .create_file(&r.path, flags, mode, &cred)
                    .await
                    .map_err(in_mount(&r))?;
                self.wrap(&r, flags, data)
            }
            Err(e) => Err(absolute_error(e, &r.mount_point)),
        }
    }

    /// Sync form of [`open_file`](Self::open_file).
    pub fn open_file_sync(
        &self,
        path: impl AsRef<Path>,
        flags: OpenFlags,
        mode: u32,
        cred: &Credentials,
    ) -> Result<PreloadFile> {
        let r = self.mounts.resolve(path)?;
        let cred = self.effective(cred);

        match r.fs.stat_sync(&r.path, &cred) {
            Ok(stats) => {
                self.check_existing(&stats, flags, &cred, &r)?;
                let data = r
                    .fs
                    .open_file_sync(&r.path, flags, &cred)
                    .map_err(in_mount(&r))?;
                let mut file = self.wrap(&r, flags, data)?;
                if flags.is_truncating() && flags.is_writeable() {
                    file.truncate_sync(0).map_err(in_mount(&r))?;
                    file.sync_sync().map_err(in_mount(&r))?;
                }
                Ok(file)
            }
            Err(e) if e.is(Errno::ENOENT) => {
                if !flags.is_creating() {
                    return Err(absolute_error(e, &r.mount_point));
                }
                let parent = r
                    .fs
                    .stat_sync(dirname(&r.path), &cred)
                    .map_err(in_mount(&r))?;
                if !parent.is_directory() {
                    return Err(Error::with(Errno::ENOTDIR, absolute(&r), "open"));
                }
                let data = r
                    .fs
                    .create_file_sync(&r.path, flags, mode, &cred)
                    .map_err(in_mount(&r))?;
                self.wrap(&r, flags, data)
            }
            Err(e) => Err(absolute_error(e, &r.mount_point)),
        }
    }

    // ========================================================================
    // Descriptors
    // ========================================================================

    fn register(&self, file: PreloadFile) -> Fd {
        let mut fds = self.fds.write().unwrap();
        let mut fd = FIRST_FD;
        while fds.contains_key(&fd) {
            fd += 1;
        }

        #[cfg(feature = "logging")]
        tracing::debug!(
            fd,
            path = %crate::logging_impl::format_path_for_log(file.path()),
            flags = %file.flags(),
            "opened descriptor"
        );

        fds.insert(fd, Arc::new(tokio::sync::Mutex::new(Box::new(file))));
        fd
    }

    fn handle(&self, fd: Fd, syscall: &'static str) -> Result<Handle> {
        self.fds
            .read()
            .unwrap()
            .get(&fd)
            .cloned()
            .ok_or_else(|| Error::new(Errno::EBADF, format!("bad file descriptor: {}", fd)).during(syscall))
    }

    fn handle_sync(
        &self,
        fd: Fd,
        syscall: &'static str,
    ) -> Result<tokio::sync::OwnedMutexGuard<Box<dyn File>>> {
        self.handle(fd, syscall)?.try_lock_owned().map_err(|_| {
            Error::new(Errno::EBUSY, format!("descriptor {} is in use", fd)).during(syscall)
        })
    }

    fn forget(&self, fd: Fd) {
        self.fds.write().unwrap().remove(&fd);

        #[cfg(feature = "logging")]
        tracing::debug!(fd, "closed descriptor");
    }

    /// Open `path` and return a descriptor.
    pub async fn open(
        &self,
        path: impl AsRef<Path>,
        flags: OpenFlags,
        mode: u32,
        cred: &Credentials,
    ) -> Result<Fd> {
        let file = self.open_file(path, flags, mode, cred).await?;
        Ok(self.register(file))
    }

    /// Sync form of [`open`](Self::open).
    pub fn open_sync(
        &self,
        path: impl AsRef<Path>,
        flags: OpenFlags,
        mode: u32,
        cred: &Credentials,
    ) -> Result<Fd> {
        let file = self.open_file_sync(path, flags, mode, cred)?;
        Ok(self.register(file))
    }

    /// Flush and release a descriptor.
    ///
    /// If the flush fails the descriptor stays open and `EBUSY` is returned.
    pub async fn close(&self, fd: Fd) -> Result<()> {
        let handle = self.handle(fd, "close")?;
        handle.lock().await.close().await?;
        self.forget(fd);
        Ok(())
    }

    /// Sync form of [`close`](Self::close).
    pub fn close_sync(&self, fd: Fd) -> Result<()> {
        self.handle_sync(fd, "close")?.close_sync()?;
        self.forget(fd);
        Ok(())
    }

    /// Read into `buf` at `position` (or the cursor).
    pub async fn read(&self, fd: Fd, buf: &mut [u8], position: Option<u64>) -> Result<usize> {
        let handle = self.handle(fd, "read")?;
        let mut file = handle.lock().await;
        file.read(buf, position).await
    }

    /// Sync form of [`read`](Self::read).
    pub fn read_sync(&self, fd: Fd, buf: &mut [u8], position: Option<u64>) -> Result<usize> {
        self.handle_sync(fd, "read")?.read_sync(buf, position)
    }

    /// Write `buf` at `position` (or the cursor).
    pub async fn write(&self, fd: Fd, buf: &[u8], position: Option<u64>) -> Result<usize> {
        let handle = self.handle(fd, "write")?;
        let mut file = handle.lock().await;
        file.write(buf, position).await
    }

    /// Sync form of [`write`](Self::write).
    pub fn write_sync(&self, fd: Fd, buf: &[u8], position: Option<u64>) -> Result<usize> {
        self.handle_sync(fd, "write")?.write_sync(buf, position)
    }

    /// Stats of an open descriptor.
    pub async fn fstat(&self, fd: Fd) -> Result<Stats> {
        let handle = self.handle(fd, "fstat")?;
        let file = handle.lock().await;
        file.stat().await
    }

    /// Truncate an open descriptor.
    pub async fn ftruncate(&self, fd: Fd, len: u64) -> Result<()> {
        let handle = self.handle(fd, "ftruncate")?;
        let mut file = handle.lock().await;
        file.truncate(len).await
    }

    /// Flush an open descriptor.
    pub async fn fsync(&self, fd: Fd) -> Result<()> {
        let handle = self.handle(fd, "fsync")?;
        let mut file = handle.lock().await;
        file.sync().await
    }

    /// Number of open descriptors.
    pub fn open_descriptors(&self) -> usize {
        self.fds.read().unwrap().len()
    }

    // ========================================================================
    // Whole-file helpers
    // ========================================================================

    /// Read a whole file.
    pub async fn read_file(&self, path: impl AsRef<Path>, cred: &Credentials) -> Result<Vec<u8>> {
        let mut file = self.open_file(path, OpenFlags::READ, 0, cred).await?;
        let mut buf = vec![0u8; file.contents().len()];
        let n = file.read(&mut buf, Some(0)).await?;
        buf.truncate(n);
        file.close().await?;
        Ok(buf)
    }

    /// Sync form of [`read_file`](Self::read_file).
    pub fn read_file_sync(&self, path: impl AsRef<Path>, cred: &Credentials) -> Result<Vec<u8>> {
        let mut file = self.open_file_sync(path, OpenFlags::READ, 0, cred)?;
        let mut buf = vec![0u8; file.contents().len()];
        let n = file.read_sync(&mut buf, Some(0))?;
        buf.truncate(n);
        file.close_sync()?;
        Ok(buf)
    }

    /// Replace the contents of a file, creating it if missing.
    pub async fn write_file(
        &self,
        path: impl AsRef<Path>,
        data: &[u8],
        cred: &Credentials,
    ) -> Result<()> {
        let mut file = self
            .open_file(path, OpenFlags::parse("w")?, DEFAULT_FILE_MODE, cred)
            .await?;

        #[cfg(feature = "logging")]
        tracing::debug!(
            path = %crate::logging_impl::format_path_for_log(file.path()),
            contents = %crate::logging_impl::format_contents_for_log(data, &self.log_config),
            "write_file"
        );

        file.write(data, Some(0)).await?;
        file.close().await
    }

    /// Sync form of [`write_file`](Self::write_file).
    pub fn write_file_sync(
        &self,
        path: impl AsRef<Path>,
        data: &[u8],
        cred: &Credentials,
    ) -> Result<()> {
        let mut file =
            self.open_file_sync(path, OpenFlags::parse("w")?, DEFAULT_FILE_MODE, cred)?;

        #[cfg(feature = "logging")]
        tracing::debug!(
            path = %crate::logging_impl::format_path_for_log(file.path()),
            contents = %crate::logging_impl::format_contents_for_log(data, &self.log_config),
            "write_file"
        );

        file.write_sync(data, Some(0))?;
        file.close_sync()
    }

    /// Append to a file, creating it if missing.
    pub async fn append_file(
        &self,
        path: impl AsRef<Path>,
        data: &[u8],
        cred: &Credentials,
    ) -> Result<()> {
        let mut file = self
            .open_file(path, OpenFlags::parse("a")?, DEFAULT_FILE_MODE, cred)
            .await?;
        file.write(data, None).await?;
        file.close().await
    }

    /// Set the size of a file, zero-filling on growth.
    pub async fn truncate(&self, path: impl AsRef<Path>, len: u64, cred: &Credentials) -> Result<()> {
        let mut file = self
            .open_file(path, OpenFlags::parse("r+")?, 0, cred)
            .await?;
        file.truncate(len).await?;
        file.close().await
    }

    /// Logging behaviour.
    pub fn log_config(&self) -> &LogConfig {
        &self.log_config
    }
}

fn strip_root(path: &Path) -> &Path {
    path.strip_prefix("/").unwrap_or(path)
}

/// Absolute path of a resolved entry in the combined namespace.
fn absolute(r: &Resolved) -> PathBuf {
    r.mount_point.join(strip_root(&r.path))
}

fn check_owner(stats: &Stats, cred: &Credentials, path: PathBuf, syscall: &'static str) -> Result<()> {
    if cred.is_privileged() || f64::from(cred.uid) == stats.uid {
        Ok(())
    } else {
        Err(Error::with(Errno::EPERM, path, syscall))
    }
}
