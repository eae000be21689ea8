//! Async/sync bridge.
//!
//! Lets a backend that is only reachable asynchronously serve synchronous
//! operations. A synchronous cache filesystem receives every mutation first;
//! each mutation is then replayed against the real backend by a single worker
//! task, strictly in the order it was issued.
//!
//! The cache is never rolled back. A replayed job that fails leaves the
//! cache and the backend out of step; the failure is logged and reported by
//! the next [`ReplayQueue::drain`], or returned directly to a caller that
//! submitted the job with [`ReplayQueue::submit`].
//!
//! # Fail Points (enabled with `failpoints` feature)
//!
//! - `bridge::replay` - Inject failures when replaying a job against the backend

// Mutex.lock().unwrap() only panics on lock poisoning (prior panic
// while holding lock). This is intentional - corrupted state should not propagate.
#![allow(clippy::unwrap_used)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[cfg(feature = "failpoints")]
use fail::fail_point;
use tokio::sync::{mpsc, oneshot};

use crate::constants::PERMISSION_MASK;
use crate::cred::Credentials;
use crate::error::{Errno, Error, Result};
use crate::flags::OpenFlags;
use crate::fs::{AsyncBackend, FileSystem};
use crate::stats::Stats;

/// A mutation waiting to be applied to the real backend.
#[derive(Debug, Clone)]
pub enum ReplayJob {
    /// `rename(old_path, new_path)`
    Rename {
        old_path: PathBuf,
        new_path: PathBuf,
        cred: Credentials,
    },
    /// `create_file(path, flags, mode)`
    CreateFile {
        path: PathBuf,
        flags: OpenFlags,
        mode: u32,
        cred: Credentials,
    },
    /// `unlink(path)`
    Unlink { path: PathBuf, cred: Credentials },
    /// `rmdir(path)`
    Rmdir { path: PathBuf, cred: Credentials },
    /// `mkdir(path, mode)`
    Mkdir {
        path: PathBuf,
        mode: u32,
        cred: Credentials,
    },
    /// `link(target, new_path)`
    Link {
        target: PathBuf,
        new_path: PathBuf,
        cred: Credentials,
    },
    /// `sync(path, data, stats)`
    Sync {
        path: PathBuf,
        data: Vec<u8>,
        stats: Stats,
    },
}

impl ReplayJob {
    /// Syscall-like name of the job.
    pub fn name(&self) -> &'static str {
        match self {
            ReplayJob::Rename { .. } => "rename",
            ReplayJob::CreateFile { .. } => "create_file",
            ReplayJob::Unlink { .. } => "unlink",
            ReplayJob::Rmdir { .. } => "rmdir",
            ReplayJob::Mkdir { .. } => "mkdir",
            ReplayJob::Link { .. } => "link",
            ReplayJob::Sync { .. } => "sync",
        }
    }

    /// Primary path the job touches.
    pub fn path(&self) -> &Path {
        match self {
            ReplayJob::Rename { old_path, .. } => old_path,
            ReplayJob::Link { new_path, .. } => new_path,
            ReplayJob::CreateFile { path, .. }
            | ReplayJob::Unlink { path, .. }
            | ReplayJob::Rmdir { path, .. }
            | ReplayJob::Mkdir { path, .. }
            | ReplayJob::Sync { path, .. } => path,
        }
    }

    async fn apply(self, backend: &dyn AsyncBackend) -> Result<()> {
        match self {
            ReplayJob::Rename {
                old_path,
                new_path,
                cred,
            } => backend.rename(&old_path, &new_path, &cred).await,
            ReplayJob::CreateFile {
                path,
                flags,
                mode,
                cred,
            } => backend
                .create_file(&path, flags, mode, &cred)
                .await
                .map(drop),
            ReplayJob::Unlink { path, cred } => backend.unlink(&path, &cred).await,
            ReplayJob::Rmdir { path, cred } => backend.rmdir(&path, &cred).await,
            ReplayJob::Mkdir { path, mode, cred } => backend.mkdir(&path, mode, &cred).await,
            ReplayJob::Link {
                target,
                new_path,
                cred,
            } => backend.link(&target, &new_path, &cred).await,
            ReplayJob::Sync { path, data, stats } => backend.sync(&path, &data, &stats).await,
        }
    }
}

enum Envelope {
    Job {
        job: ReplayJob,
        done: Option<oneshot::Sender<Result<()>>>,
    },
    Barrier(oneshot::Sender<()>),
}

#[derive(Default)]
struct Shared {
    pending: AtomicUsize,
    failures: Mutex<VecDeque<Error>>,
}

/// FIFO queue of [`ReplayJob`]s drained by one worker task.
///
/// Dropping the queue stops the worker after the jobs already queued.
pub struct ReplayQueue {
    tx: mpsc::UnboundedSender<Envelope>,
    shared: Arc<Shared>,
}

impl std::fmt::Debug for ReplayQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplayQueue")
            .field("pending", &self.pending())
            .finish()
    }
}

impl ReplayQueue {
    /// Start the worker. Must be called within a tokio runtime.
    pub fn spawn(backend: Arc<dyn AsyncBackend>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared::default());
        tokio::spawn(run(backend, rx, shared.clone()));
        Self { tx, shared }
    }

    /// Queue a job without waiting for it.
    pub fn push(&self, job: ReplayJob) {
        self.send(job, None);
    }

    /// Queue a job and wait for its replay result.
    pub async fn submit(&self, job: ReplayJob) -> Result<()> {
        let (done, rx) = oneshot::channel();
        self.send(job, Some(done));
        rx.await
            .map_err(|_| Error::new(Errno::EIO, "replay worker stopped"))?
    }

    /// Wait until every job queued so far has been replayed.
    ///
    /// Returns the first failure of a job nobody was waiting for since the
    /// previous drain.
    pub async fn drain(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        if self.tx.send(Envelope::Barrier(tx)).is_err() {
            return Err(Error::new(Errno::EIO, "replay worker stopped"));
        }
        rx.await
            .map_err(|_| Error::new(Errno::EIO, "replay worker stopped"))?;

        let mut failures = self.shared.failures.lock().unwrap();
        let first = failures.pop_front();
        failures.clear();
        match first {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Jobs queued but not yet replayed.
    pub fn pending(&self) -> usize {
        self.shared.pending.load(Ordering::SeqCst)
    }

    fn send(&self, job: ReplayJob, done: Option<oneshot::Sender<Result<()>>>) {
        #[cfg(feature = "logging")]
        tracing::trace!(
            job = job.name(),
            path = %crate::logging_impl::format_path_for_log(job.path()),
            "queued replay job"
        );

        self.shared.pending.fetch_add(1, Ordering::SeqCst);
        if let Err(mpsc::error::SendError(envelope)) = self.tx.send(Envelope::Job { job, done }) {
            self.shared.pending.fetch_sub(1, Ordering::SeqCst);
            let err = Error::new(Errno::EIO, "replay worker stopped");
            if let Envelope::Job {
                done: Some(done), ..
            } = envelope
            {
                let _ = done.send(Err(err));
            } else {
                self.shared.failures.lock().unwrap().push_back(err);
            }
        }
    }
}

#[cfg(feature = "failpoints")]
fn replay_failpoint(job: &ReplayJob) -> Result<()> {
    fail_point!("bridge::replay", |action| {
        match action.as_deref() {
            Some("eio") => Err(Error::with(Errno::EIO, job.path(), job.name())),
            _ => Ok(()),
        }
    });
    Ok(())
}

#[cfg(not(feature = "failpoints"))]
fn replay_failpoint(_job: &ReplayJob) -> Result<()> {
    Ok(())
}

async fn run(
    backend: Arc<dyn AsyncBackend>,
    mut rx: mpsc::UnboundedReceiver<Envelope>,
    shared: Arc<Shared>,
) {
    while let Some(envelope) = rx.recv().await {
        match envelope {
            Envelope::Barrier(tx) => {
                let _ = tx.send(());
            }
            Envelope::Job { job, done } => {
                #[cfg(feature = "logging")]
                let (name, path) = (job.name(), job.path().to_path_buf());

                let result = match replay_failpoint(&job) {
                    Ok(()) => job.apply(backend.as_ref()).await,
                    Err(e) => Err(e),
                };
                shared.pending.fetch_sub(1, Ordering::SeqCst);

                match (result, done) {
                    (result, Some(done)) => {
                        let _ = done.send(result);
                    }
                    (Err(e), None) => {
                        #[cfg(feature = "logging")]
                        tracing::warn!(
                            job = name,
                            path = %crate::logging_impl::format_path_for_log(&path),
                            error = %e,
                            "replay against backend failed; cache and backend diverged"
                        );
                        shared.failures.lock().unwrap().push_back(e);
                    }
                    (Ok(()), None) => {
                        #[cfg(feature = "logging")]
                        tracing::trace!(
                            job = name,
                            path = %crate::logging_impl::format_path_for_log(&path),
                            "replayed job"
                        );
                    }
                }
            }
        }
    }
}

/// Copy the backend's whole tree into `cache`.
///
/// Walks breadth-first, creating every directory before any file contents
/// are copied. Mode and ownership are preserved.
pub async fn copy_in(backend: &dyn AsyncBackend, cache: &dyn FileSystem) -> Result<()> {
    let root = Credentials::root();

    #[cfg(feature = "logging")]
    tracing::info!(
        backend = %backend.metadata().name,
        cache = %cache.metadata().name,
        "copying backend into cache"
    );

    let mut dirs = VecDeque::from([PathBuf::from("/")]);
    let mut files = Vec::new();
    while let Some(dir) = dirs.pop_front() {
        for name in backend.readdir(&dir, &root).await? {
            let path = dir.join(&name);
            let stats = backend.stat(&path, &root).await?;
            if stats.is_directory() {
                cache.mkdir_sync(
                    &path,
                    stats.mode_bits() & PERMISSION_MASK,
                    &owner_of(&stats),
                )?;
                dirs.push_back(path);
            } else {
                files.push((path, stats));
            }
        }
    }

    let count = files.len();
    for (path, stats) in files {
        let data = backend.open_file(&path, OpenFlags::READ, &root).await?;
        cache.create_file_sync(
            &path,
            OpenFlags::parse("w")?,
            stats.mode_bits() & PERMISSION_MASK,
            &owner_of(&stats),
        )?;
        cache.sync_sync(&path, &data.contents, &data.stats)?;
    }

    #[cfg(feature = "logging")]
    tracing::info!(files = count, "copied backend into cache");
    #[cfg(not(feature = "logging"))]
    let _ = count;

    Ok(())
}

/// Remove everything under `/` in `cache`, leaving an empty root.
///
/// Used after a failed [`copy_in`] so the next attempt starts clean.
pub fn clear_cache(cache: &dyn FileSystem) -> Result<()> {
    let root = Credentials::root();
    let mut pending = VecDeque::from([PathBuf::from("/")]);
    let mut dirs = Vec::new();
    while let Some(dir) = pending.pop_front() {
        for name in cache.readdir_sync(&dir, &root)? {
            let path = dir.join(&name);
            if cache.stat_sync(&path, &root)?.is_directory() {
                pending.push_back(path.clone());
                dirs.push(path);
            } else {
                cache.unlink_sync(&path, &root)?;
            }
        }
    }
    // Breadth-first order, so children come after their parents.
    for dir in dirs.iter().rev() {
        cache.rmdir_sync(dir, &root)?;
    }
    Ok(())
}

/// Credentials that create entries owned like `stats` and pass every check.
fn owner_of(stats: &Stats) -> Credentials {
    Credentials::new(stats.uid as u32, stats.gid as u32).elevated()
}
