//! Filesystem contract, capability mixins and built-in backends
//!
//! - [`FileSystem`]: the operation set every mounted filesystem provides
//! - [`SyncBackend`] / [`AsyncBackend`]: minimal contracts for storage authors
//! - [`Synchronous`], [`Asynchronous`], [`ReadOnly`]: mixins deriving the rest
//! - [`InMemory`]: key/value store backend
//! - [`MountTable`]: mount points and path resolution

mod asynchronous;
mod backend;
mod memory;
mod mountable;
mod readonly;
mod synchronous;
mod traits;

pub use asynchronous::Asynchronous;
pub use backend::{AsyncBackend, SyncBackend};
pub use memory::InMemory;
pub use mountable::{MountTable, Resolved};
pub use readonly::ReadOnly;
pub use synchronous::Synchronous;
pub use traits::{FileData, FileSystem, FileSystemMetadata};
