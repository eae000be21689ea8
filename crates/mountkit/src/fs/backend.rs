//! Minimal backend contracts.
//!
//! A storage backend implements only one side of the
//! [`FileSystem`](super::FileSystem) operation set and is wrapped in the
//! matching mixin, which derives the other side:
//!
//! | You implement | Wrap with | Async forms | Sync forms |
//! |---------------|-----------|-------------|------------|
//! | [`SyncBackend`] | [`Synchronous`](super::Synchronous) | call the sync forms | native |
//! | [`AsyncBackend`] | [`Asynchronous`](super::Asynchronous) | native | served from a cache, or `ENOTSUP` |
//!
//! Either result can additionally be wrapped in
//! [`ReadOnly`](super::ReadOnly).
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                     Vfs                          │
//! │          (mounts, descriptors, locks)            │
//! └───────────────────────┬─────────────────────────┘
//!                         │ uses
//! ┌───────────────────────▼─────────────────────────┐
//! │              FileSystem trait                    │
//! │          (sync + async forms of every op)        │
//! └───────────────────────┬─────────────────────────┘
//!                         │
//!        ┌────────────────┼────────────────┐
//!        │                │                │
//! ┌──────▼──────┐  ┌──────▼──────┐  ┌──────▼──────┐
//! │ Synchronous │  │Asynchronous │  │  ReadOnly   │
//! │   (mixin)   │  │   (mixin)   │  │  (mixin)    │
//! └──────┬──────┘  └──────┬──────┘  └─────────────┘
//!        │ wraps          │ wraps + cache
//! ┌──────▼──────┐  ┌──────▼──────┐
//! │ SyncBackend │  │AsyncBackend │
//! │ (your impl) │  │ (your impl) │
//! └─────────────┘  └─────────────┘
//! ```

use async_trait::async_trait;
use std::path::Path;

use super::traits::{FileData, FileSystemMetadata};
use crate::cred::Credentials;
use crate::error::Result;
use crate::flags::OpenFlags;
use crate::stats::Stats;

/// Storage reachable synchronously.
///
/// Semantics of each method are those of the same-named
/// [`FileSystem`](super::FileSystem) `_sync` method.
pub trait SyncBackend: Send + Sync {
    /// Capabilities and usage.
    fn metadata(&self) -> FileSystemMetadata;

    /// Move a file or directory.
    fn rename(&self, old_path: &Path, new_path: &Path, cred: &Credentials) -> Result<()>;

    /// Stats of a path.
    fn stat(&self, path: &Path, cred: &Credentials) -> Result<Stats>;

    /// Load an existing file.
    fn open_file(&self, path: &Path, flags: OpenFlags, cred: &Credentials) -> Result<FileData>;

    /// Create an empty file.
    fn create_file(
        &self,
        path: &Path,
        flags: OpenFlags,
        mode: u32,
        cred: &Credentials,
    ) -> Result<FileData>;

    /// Remove a file.
    fn unlink(&self, path: &Path, cred: &Credentials) -> Result<()>;

    /// Remove an empty directory.
    fn rmdir(&self, path: &Path, cred: &Credentials) -> Result<()>;

    /// Create a directory.
    fn mkdir(&self, path: &Path, mode: u32, cred: &Credentials) -> Result<()>;

    /// List a directory.
    fn readdir(&self, path: &Path, cred: &Credentials) -> Result<Vec<String>>;

    /// Create a hard link.
    fn link(&self, target: &Path, new_path: &Path, cred: &Credentials) -> Result<()>;

    /// Persist file contents and stats. For a directory only the stats are
    /// written and `data` is ignored.
    fn sync(&self, path: &Path, data: &[u8], stats: &Stats) -> Result<()>;
}

/// Storage reachable only asynchronously.
///
/// Semantics of each method are those of the same-named
/// [`FileSystem`](super::FileSystem) async method.
#[async_trait]
pub trait AsyncBackend: Send + Sync {
    /// Capabilities and usage.
    fn metadata(&self) -> FileSystemMetadata;

    /// Connect, load indexes, etc. Called once before any other operation.
    async fn ready(&self) -> Result<()> {
        Ok(())
    }

    /// Move a file or directory.
    async fn rename(&self, old_path: &Path, new_path: &Path, cred: &Credentials) -> Result<()>;

    /// Stats of a path.
    async fn stat(&self, path: &Path, cred: &Credentials) -> Result<Stats>;

    /// Load an existing file.
    async fn open_file(&self, path: &Path, flags: OpenFlags, cred: &Credentials)
    -> Result<FileData>;

    /// Create an empty file.
    async fn create_file(
        &self,
        path: &Path,
        flags: OpenFlags,
        mode: u32,
        cred: &Credentials,
    ) -> Result<FileData>;

    /// Remove a file.
    async fn unlink(&self, path: &Path, cred: &Credentials) -> Result<()>;

    /// Remove an empty directory.
    async fn rmdir(&self, path: &Path, cred: &Credentials) -> Result<()>;

    /// Create a directory.
    async fn mkdir(&self, path: &Path, mode: u32, cred: &Credentials) -> Result<()>;

    /// List a directory.
    async fn readdir(&self, path: &Path, cred: &Credentials) -> Result<Vec<String>>;

    /// Create a hard link.
    async fn link(&self, target: &Path, new_path: &Path, cred: &Credentials) -> Result<()>;

    /// Persist file contents and stats. For a directory only the stats are
    /// written and `data` is ignored.
    async fn sync(&self, path: &Path, data: &[u8], stats: &Stats) -> Result<()>;
}
