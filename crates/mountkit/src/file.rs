//! Open file handles.
//!
//! [`PreloadFile`] loads the whole file into a [`FileBuffer`] on open, serves
//! reads and writes from memory and writes back to its owning
//! [`FileSystem`] on [`sync`](File::sync) or [`close`](File::close).
//!
//! # Fail Points (enabled with `failpoints` feature)
//!
//! - `file::flush` - Inject failures when writing a dirty file back

use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[cfg(feature = "failpoints")]
use fail::fail_point;

use crate::buffer::{FileBuffer, GrowthStrategy};
use crate::error::{Errno, Error, Result};
use crate::flags::OpenFlags;
use crate::fs::{FileData, FileSystem};
use crate::stats::{Stats, now_ms};

/// An open file.
///
/// Every operation except [`close`](File::close) and [`stat`](File::stat)
/// fails with `EBADF` once the file is closed.
#[async_trait]
pub trait File: Send + Sync + fmt::Debug {
    /// Path within the owning filesystem.
    fn path(&self) -> &Path;

    /// Flags the file was opened with.
    fn flags(&self) -> OpenFlags;

    /// Current offset. Always the file size in append mode.
    fn position(&self) -> u64;

    /// Move the cursor.
    fn seek(&mut self, position: u64);

    /// Stats snapshot.
    async fn stat(&self) -> Result<Stats>;

    /// Sync form of [`stat`](Self::stat).
    fn stat_sync(&self) -> Result<Stats>;

    /// Flush if dirty and release the buffer.
    async fn close(&mut self) -> Result<()>;

    /// Sync form of [`close`](Self::close).
    fn close_sync(&mut self) -> Result<()>;

    /// Write back to the owning filesystem if dirty.
    async fn sync(&mut self) -> Result<()>;

    /// Sync form of [`sync`](Self::sync).
    fn sync_sync(&mut self) -> Result<()>;

    /// Set the size, zero-filling on growth.
    async fn truncate(&mut self, len: u64) -> Result<()>;

    /// Sync form of [`truncate`](Self::truncate).
    fn truncate_sync(&mut self, len: u64) -> Result<()>;

    /// Write `buf` at `position` (or the cursor). Returns bytes written.
    async fn write(&mut self, buf: &[u8], position: Option<u64>) -> Result<usize>;

    /// Sync form of [`write`](Self::write).
    fn write_sync(&mut self, buf: &[u8], position: Option<u64>) -> Result<usize>;

    /// Read into `buf` from `position` (or the cursor). Returns bytes read,
    /// zero at end of file.
    async fn read(&mut self, buf: &mut [u8], position: Option<u64>) -> Result<usize>;

    /// Sync form of [`read`](Self::read).
    fn read_sync(&mut self, buf: &mut [u8], position: Option<u64>) -> Result<usize>;

    /// Replace the permission bits.
    async fn chmod(&mut self, mode: u32) -> Result<()>;

    /// Sync form of [`chmod`](Self::chmod).
    fn chmod_sync(&mut self, mode: u32) -> Result<()>;

    /// Change owner; out-of-range ids are ignored.
    async fn chown(&mut self, uid: i64, gid: i64) -> Result<()>;

    /// Sync form of [`chown`](Self::chown).
    fn chown_sync(&mut self, uid: i64, gid: i64) -> Result<()>;

    /// Set access and modification times (ms since epoch).
    async fn utimes(&mut self, atime_ms: f64, mtime_ms: f64) -> Result<()>;

    /// Sync form of [`utimes`](Self::utimes).
    fn utimes_sync(&mut self, atime_ms: f64, mtime_ms: f64) -> Result<()>;
}

/// Write-back behaviour of a [`PreloadFile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileOptions {
    /// Reads update `atime` and mark the file dirty.
    pub update_on_read: bool,
    /// Flush after every mutation instead of on sync/close.
    pub sync_immediately: bool,
}

impl Default for FileOptions {
    fn default() -> Self {
        Self {
            update_on_read: true,
            sync_immediately: false,
        }
    }
}

/// File fully buffered in memory.
///
/// Owns its buffer exclusively; two handles on the same path never share
/// bytes, and nothing reaches the owning filesystem until a flush.
pub struct PreloadFile {
    fs: Arc<dyn FileSystem>,
    path: PathBuf,
    flags: OpenFlags,
    stats: Stats,
    buffer: FileBuffer,
    position: u64,
    dirty: bool,
    closed: bool,
    readonly: bool,
    options: FileOptions,
}

/// What a mutation asks of the caller afterwards.
#[must_use]
enum After {
    Nothing,
    Flush,
}

impl PreloadFile {
    /// Wrap a loaded file.
    ///
    /// Fails with `EIO` when a readable file's contents disagree with its
    /// recorded size; for a write-only file the mismatch just marks it dirty.
    pub fn new(
        fs: Arc<dyn FileSystem>,
        path: impl Into<PathBuf>,
        flags: OpenFlags,
        data: FileData,
        options: FileOptions,
    ) -> Result<Self> {
        let path = path.into();
        let meta = fs.metadata();
        let strategy = if meta.no_resizable_buffers {
            GrowthStrategy::Reallocate
        } else {
            GrowthStrategy::Amortized
        };
        let FileData { stats, contents } = data;

        let mut dirty = false;
        if !stats.is_directory() && stats.size_bytes() != contents.len() as u64 {
            if flags.is_readable() {
                return Err(Error::new(
                    Errno::EIO,
                    format!(
                        "size mismatch: buffer length {}, stats size {}",
                        contents.len(),
                        stats.size_bytes()
                    ),
                )
                .at(&path)
                .during("open"));
            }
            dirty = true;
        }

        Ok(Self {
            fs,
            path,
            flags,
            stats,
            buffer: FileBuffer::from_vec(contents, strategy),
            position: 0,
            dirty,
            closed: false,
            readonly: meta.readonly,
            options,
        })
    }

    /// Current contents.
    pub fn contents(&self) -> &[u8] {
        self.buffer.as_slice()
    }

    /// Unflushed changes?
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Closed?
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Owning filesystem.
    pub fn fs(&self) -> &Arc<dyn FileSystem> {
        &self.fs
    }

    fn ebadf(&self, syscall: &'static str) -> Error {
        Error::with(Errno::EBADF, &self.path, syscall)
    }

    fn check_open(&self, syscall: &'static str) -> Result<()> {
        if self.closed {
            return Err(self.ebadf(syscall));
        }
        Ok(())
    }

    fn check_mutable(&self, syscall: &'static str) -> Result<()> {
        self.check_open(syscall)?;
        if self.readonly {
            return Err(Error::with(Errno::EROFS, &self.path, syscall));
        }
        Ok(())
    }

    fn check_writable(&self, syscall: &'static str) -> Result<()> {
        self.check_mutable(syscall)?;
        if !self.flags.is_writeable() {
            return Err(Error::new(Errno::EBADF, "file not opened with a writeable mode")
                .at(&self.path)
                .during(syscall));
        }
        Ok(())
    }

    fn touched(&mut self) -> After {
        self.dirty = true;
        if self.options.sync_immediately || self.flags.is_synchronous() {
            After::Flush
        } else {
            After::Nothing
        }
    }

    fn do_write(&mut self, buf: &[u8], position: Option<u64>) -> Result<(usize, After)> {
        self.check_writable("write")?;
        let start = if self.flags.is_appendable() {
            self.stats.size_bytes()
        } else {
            position.unwrap_or(self.position)
        };
        let end = self
            .buffer
            .write_at(start, buf)
            .map_err(|e| e.at(&self.path).during("write"))?;
        if end > self.stats.size_bytes() {
            self.stats.set_size(end);
        }
        self.stats.mtime_ms = now_ms();
        self.position = end;
        Ok((buf.len(), self.touched()))
    }

    fn do_read(&mut self, buf: &mut [u8], position: Option<u64>) -> Result<usize> {
        self.check_open("read")?;
        if !self.flags.is_readable() {
            return Err(Error::new(Errno::EBADF, "file not opened with a readable mode")
                .at(&self.path)
                .during("read"));
        }
        let start = position.unwrap_or(self.position);
        let n = self.buffer.read_at(start, buf);
        self.position = start + n as u64;
        if self.options.update_on_read && !self.readonly {
            self.stats.atime_ms = now_ms();
            self.dirty = true;
        }
        Ok(n)
    }

    fn do_truncate(&mut self, len: u64) -> Result<After> {
        self.check_writable("truncate")?;
        self.buffer
            .resize(len)
            .map_err(|e| e.at(&self.path).during("truncate"))?;
        self.stats.set_size(len);
        self.stats.mtime_ms = now_ms();
        Ok(self.touched())
    }

    fn do_chmod(&mut self, mode: u32) -> Result<After> {
        self.check_mutable("chmod")?;
        self.stats.chmod(mode);
        self.stats.ctime_ms = now_ms();
        Ok(self.touched())
    }

    fn do_chown(&mut self, uid: i64, gid: i64) -> Result<After> {
        self.check_mutable("chown")?;
        self.stats.chown(uid, gid);
        self.stats.ctime_ms = now_ms();
        Ok(self.touched())
    }

    fn do_utimes(&mut self, atime_ms: f64, mtime_ms: f64) -> Result<After> {
        self.check_mutable("utimes")?;
        self.stats.atime_ms = atime_ms;
        self.stats.mtime_ms = mtime_ms;
        Ok(self.touched())
    }

    #[cfg(feature = "failpoints")]
    fn flush_failpoint(&self) -> Result<()> {
        fail_point!("file::flush", |action| {
            match action.as_deref() {
                Some("eio") => Err(Error::with(Errno::EIO, &self.path, "sync")),
                _ => Ok(()),
            }
        });
        Ok(())
    }

    #[cfg(not(feature = "failpoints"))]
    fn flush_failpoint(&self) -> Result<()> {
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        self.flush_failpoint()?;
        self.fs
            .sync(&self.path, self.buffer.as_slice(), &self.stats)
            .await?;
        self.dirty = false;
        Ok(())
    }

    fn flush_sync(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        self.flush_failpoint()?;
        self.fs
            .sync_sync(&self.path, self.buffer.as_slice(), &self.stats)?;
        self.dirty = false;
        Ok(())
    }

    async fn finish(&mut self, after: After) -> Result<()> {
        match after {
            After::Flush => self.flush().await,
            After::Nothing => Ok(()),
        }
    }

    fn finish_sync(&mut self, after: After) -> Result<()> {
        match after {
            After::Flush => self.flush_sync(),
            After::Nothing => Ok(()),
        }
    }

    fn busy(&self, cause: Error) -> Error {
        Error::new(
            Errno::EBUSY,
            format!("cannot close a file with unflushed changes: {}", cause),
        )
        .at(&self.path)
        .during("close")
    }

    fn release(&mut self) {
        self.closed = true;
        self.buffer = FileBuffer::new(self.buffer.strategy());
    }
}

impl fmt::Debug for PreloadFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreloadFile")
            .field("fs", &self.fs.metadata().name)
            .field("path", &self.path)
            .field("flags", &self.flags)
            .field("size", &self.stats.size_bytes())
            .field("position", &self.position)
            .field("dirty", &self.dirty)
            .field("closed", &self.closed)
            .finish()
    }
}

#[async_trait]
impl File for PreloadFile {
    fn path(&self) -> &Path {
        &self.path
    }

    fn flags(&self) -> OpenFlags {
        self.flags
    }

    fn position(&self) -> u64 {
        if self.flags.is_appendable() {
            self.stats.size_bytes()
        } else {
            self.position
        }
    }

    fn seek(&mut self, position: u64) {
        self.position = position;
    }

    async fn stat(&self) -> Result<Stats> {
        self.stat_sync()
    }

    fn stat_sync(&self) -> Result<Stats> {
        Ok(self.stats)
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        if let Err(e) = self.flush().await {
            return Err(self.busy(e));
        }
        self.release();
        Ok(())
    }

    fn close_sync(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        if let Err(e) = self.flush_sync() {
            return Err(self.busy(e));
        }
        self.release();
        Ok(())
    }

    async fn sync(&mut self) -> Result<()> {
        self.check_open("sync")?;
        self.flush().await
    }

    fn sync_sync(&mut self) -> Result<()> {
        self.check_open("sync")?;
        self.flush_sync()
    }

    async fn truncate(&mut self, len: u64) -> Result<()> {
        let after = self.do_truncate(len)?;
        self.finish(after).await
    }

    fn truncate_sync(&mut self, len: u64) -> Result<()> {
        let after = self.do_truncate(len)?;
        self.finish_sync(after)
    }

    async fn write(&mut self, buf: &[u8], position: Option<u64>) -> Result<usize> {
        let (n, after) = self.do_write(buf, position)?;
        self.finish(after).await?;
        Ok(n)
    }

    fn write_sync(&mut self, buf: &[u8], position: Option<u64>) -> Result<usize> {
        let (n, after) = self.do_write(buf, position)?;
        self.finish_sync(after)?;
        Ok(n)
    }

    async fn read(&mut self, buf: &mut [u8], position: Option<u64>) -> Result<usize> {
        self.do_read(buf, position)
    }

    fn read_sync(&mut self, buf: &mut [u8], position: Option<u64>) -> Result<usize> {
        self.do_read(buf, position)
    }

    async fn chmod(&mut self, mode: u32) -> Result<()> {
        let after = self.do_chmod(mode)?;
        self.finish(after).await
    }

    fn chmod_sync(&mut self, mode: u32) -> Result<()> {
        let after = self.do_chmod(mode)?;
        self.finish_sync(after)
    }

    async fn chown(&mut self, uid: i64, gid: i64) -> Result<()> {
        let after = self.do_chown(uid, gid)?;
        self.finish(after).await
    }

    fn chown_sync(&mut self, uid: i64, gid: i64) -> Result<()> {
        let after = self.do_chown(uid, gid)?;
        self.finish_sync(after)
    }

    async fn utimes(&mut self, atime_ms: f64, mtime_ms: f64) -> Result<()> {
        let after = self.do_utimes(atime_ms, mtime_ms)?;
        self.finish(after).await
    }

    fn utimes_sync(&mut self, atime_ms: f64, mtime_ms: f64) -> Result<()> {
        let after = self.do_utimes(atime_ms, mtime_ms)?;
        self.finish_sync(after)
    }
}
