//! Mountkit - Virtual filesystem core with pluggable backends
//!
//! A POSIX-flavoured namespace assembled from mounted filesystems. Backends
//! implement a small contract ([`SyncBackend`] or [`AsyncBackend`]); mixins
//! derive the full [`FileSystem`] operation set from it. The [`Vfs`] façade
//! resolves paths across mounts, checks permissions and hands out file
//! descriptors backed by [`PreloadFile`] buffers.
//!
//! # Example
//!
//! ```rust
//! use mountkit::{Credentials, OpenFlags, Vfs};
//!
//! #[tokio::main]
//! async fn main() -> mountkit::Result<()> {
//!     let vfs = Vfs::new();
//!     let cred = Credentials::root();
//!
//!     vfs.mkdir("/tmp", 0o777, &cred).await?;
//!     vfs.write_file("/tmp/hello.txt", b"hello", &cred).await?;
//!
//!     let fd = vfs.open("/tmp/hello.txt", OpenFlags::parse("r")?, 0, &cred).await?;
//!     let mut buf = [0u8; 5];
//!     vfs.read(fd, &mut buf, None).await?;
//!     vfs.close(fd).await?;
//!     assert_eq!(&buf, b"hello");
//!     Ok(())
//! }
//! ```
//!
//! # Backends
//!
//! | Type | Contract | Notes |
//! |------|----------|-------|
//! | [`InMemory`] | [`SyncBackend`] | Inode/key-value store, usable as a cache |
//! | [`Synchronous`] | wraps a [`SyncBackend`] | Async forms delegate to sync |
//! | [`Asynchronous`] | wraps an [`AsyncBackend`] | Sync cache plus ordered replay |
//! | [`ReadOnly`] | wraps any [`FileSystem`] | Mutations fail with `EROFS` |
//!
//! # Features
//!
//! - `logging`: emit `tracing` events (see [`LogConfig`])
//! - `failpoints`: fail-rs injection points for fault tests

mod bridge;
mod buffer;
mod config;
pub mod constants;
mod cred;
mod error;
mod file;
mod flags;
mod fs;
mod inode;
mod logging_impl;
mod mutex;
pub mod path;
mod stats;
mod vfs;

pub use bridge::{ReplayJob, ReplayQueue, copy_in};
pub use buffer::{FileBuffer, GrowthStrategy};
pub use config::VfsConfig;
pub use cred::Credentials;
pub use error::{Errno, Error, Result};
pub use file::{File, FileOptions, PreloadFile};
pub use flags::OpenFlags;
pub use fs::{
    AsyncBackend, Asynchronous, FileData, FileSystem, FileSystemMetadata, InMemory, MountTable,
    ReadOnly, Resolved, SyncBackend, Synchronous,
};
pub use inode::{INODE_SIZE, Inode};
pub use logging_impl::{LogConfig, format_contents_for_log, format_path_for_log, sanitize_for_log};
pub use mutex::PathMutex;
pub use stats::{BLOCK_SIZE, BigIntStats, FileType, Stats, StatsCommon, StatsNumber};
pub use vfs::{FIRST_FD, Fd, Vfs, VfsBuilder};

/// Re-exported so backend authors can implement the async contracts
/// without depending on `async-trait` themselves.
pub use async_trait::async_trait;
