//! `stat`-like read model.
//!
//! [`StatsCommon`] is generic over its numeric domain so that the ordinary
//! ([`Stats`], `f64`) and wide ([`BigIntStats`], `u64`) forms share one
//! implementation of the predicates, the access check and the
//! `chmod`/`chown` helpers.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::constants::{
    PERMISSION_MASK, S_IFBLK, S_IFCHR, S_IFDIR, S_IFIFO, S_IFLNK, S_IFMT, S_IFREG, S_IFSOCK,
};
use crate::cred::Credentials;

/// Block size reported by every stats object.
pub const BLOCK_SIZE: u64 = 4096;

/// Milliseconds since the Unix epoch.
pub(crate) fn now_ms() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64() * 1000.0)
        .unwrap_or(0.0)
}

/// Numeric domain of a stats object.
pub trait StatsNumber: Copy + PartialEq + PartialOrd + Default + std::fmt::Debug {
    /// Convert from an integer.
    fn from_u64(value: u64) -> Self;
    /// Convert from a float (truncating for integer domains).
    fn from_f64(value: f64) -> Self;
    /// Convert to an integer (truncating for float domains).
    fn to_u64(self) -> u64;
    /// Convert to a float.
    fn to_f64(self) -> f64;
}

impl StatsNumber for f64 {
    fn from_u64(value: u64) -> Self {
        value as f64
    }
    fn from_f64(value: f64) -> Self {
        value
    }
    fn to_u64(self) -> u64 {
        self as u64
    }
    fn to_f64(self) -> f64 {
        self
    }
}

impl StatsNumber for u64 {
    fn from_u64(value: u64) -> Self {
        value
    }
    fn from_f64(value: f64) -> Self {
        value as u64
    }
    fn to_u64(self) -> u64 {
        self
    }
    fn to_f64(self) -> f64 {
        self as f64
    }
}

/// Kind of filesystem entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileType {
    /// Regular file
    File,
    /// Directory
    Directory,
    /// Symbolic link
    Symlink,
}

impl FileType {
    /// `S_IF*` bits for this type.
    pub fn mode_bits(self) -> u32 {
        match self {
            FileType::File => S_IFREG,
            FileType::Directory => S_IFDIR,
            FileType::Symlink => S_IFLNK,
        }
    }
}

/// Stats with fields in numeric domain `T`.
///
/// Built fresh from whatever a backend returns; only [`chmod`](Self::chmod),
/// [`chown`](Self::chown) and direct field writes by the owner of the
/// snapshot mutate it.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsCommon<T> {
    /// Device id
    pub dev: T,
    /// Inode number
    pub ino: T,
    /// Type and permission bits
    pub mode: T,
    /// Hard link count
    pub nlink: T,
    /// Owner user id
    pub uid: T,
    /// Owner group id
    pub gid: T,
    /// Device id for special files
    pub rdev: T,
    /// Size in bytes
    pub size: T,
    /// Block size for I/O
    pub blksize: T,
    /// Number of 512-byte blocks allocated
    pub blocks: T,
    /// Last access, ms since epoch
    pub atime_ms: T,
    /// Last modification, ms since epoch
    pub mtime_ms: T,
    /// Last status change, ms since epoch
    pub ctime_ms: T,
    /// Creation, ms since epoch
    pub birthtime_ms: T,
}

/// Ordinary stats.
pub type Stats = StatsCommon<f64>;

/// Stats with 64-bit integer fields.
pub type BigIntStats = StatsCommon<u64>;

impl<T: StatsNumber> StatsCommon<T> {
    /// Stats for an entry with the given mode and size, all times now.
    ///
    /// A mode without type bits is treated as a regular file.
    pub fn new(mode: u32, size: u64) -> Self {
        let mode = if mode & S_IFMT == 0 {
            mode | S_IFREG
        } else {
            mode
        };
        let now = T::from_f64(now_ms());
        Self {
            dev: T::default(),
            ino: T::default(),
            mode: T::from_u64(mode as u64),
            nlink: T::from_u64(1),
            uid: T::default(),
            gid: T::default(),
            rdev: T::default(),
            size: T::from_u64(size),
            blksize: T::from_u64(BLOCK_SIZE),
            blocks: T::from_u64(size.div_ceil(512)),
            atime_ms: now,
            mtime_ms: now,
            ctime_ms: now,
            birthtime_ms: now,
        }
    }

    /// Mode bits as an integer.
    pub fn mode_bits(&self) -> u32 {
        self.mode.to_u64() as u32
    }

    /// Size as an integer.
    pub fn size_bytes(&self) -> u64 {
        self.size.to_u64()
    }

    fn is_type(&self, bits: u32) -> bool {
        self.mode_bits() & S_IFMT == bits
    }

    /// Regular file?
    pub fn is_file(&self) -> bool {
        self.is_type(S_IFREG)
    }

    /// Directory?
    pub fn is_directory(&self) -> bool {
        self.is_type(S_IFDIR)
    }

    /// Symbolic link?
    pub fn is_symbolic_link(&self) -> bool {
        self.is_type(S_IFLNK)
    }

    /// Socket?
    pub fn is_socket(&self) -> bool {
        self.is_type(S_IFSOCK)
    }

    /// Block device?
    pub fn is_block_device(&self) -> bool {
        self.is_type(S_IFBLK)
    }

    /// Character device?
    pub fn is_character_device(&self) -> bool {
        self.is_type(S_IFCHR)
    }

    /// FIFO?
    pub fn is_fifo(&self) -> bool {
        self.is_type(S_IFIFO)
    }

    /// Entry kind, if it is one the core models.
    pub fn file_type(&self) -> Option<FileType> {
        match self.mode_bits() & S_IFMT {
            S_IFREG => Some(FileType::File),
            S_IFDIR => Some(FileType::Directory),
            S_IFLNK => Some(FileType::Symlink),
            _ => None,
        }
    }

    /// Last access time.
    pub fn atime(&self) -> SystemTime {
        to_system_time(self.atime_ms.to_f64())
    }

    /// Last modification time.
    pub fn mtime(&self) -> SystemTime {
        to_system_time(self.mtime_ms.to_f64())
    }

    /// Last status change time.
    pub fn ctime(&self) -> SystemTime {
        to_system_time(self.ctime_ms.to_f64())
    }

    /// Creation time.
    pub fn birthtime(&self) -> SystemTime {
        to_system_time(self.birthtime_ms.to_f64())
    }

    /// Check whether `cred` may access this entry with `mode` (`R_OK | W_OK | X_OK`).
    ///
    /// Privileged credentials and symbolic links always pass. Otherwise the
    /// owner, group and other permission classes that apply to `cred` are
    /// combined and every requested bit must be present.
    pub fn has_access(&self, mode: u32, cred: &Credentials) -> bool {
        if cred.is_privileged() || self.is_symbolic_link() {
            return true;
        }

        let bits = self.mode_bits();
        let mut perm = bits & 0o7;
        if cred.uid as u64 == self.uid.to_u64() {
            perm |= (bits >> 6) & 0o7;
        }
        if u32::try_from(self.gid.to_u64()).is_ok_and(|gid| cred.in_group(gid)) {
            perm |= (bits >> 3) & 0o7;
        }

        perm & mode == mode
    }

    /// Replace the permission bits, keeping the type bits.
    pub fn chmod(&mut self, mode: u32) {
        let bits = (self.mode_bits() & S_IFMT) | (mode & PERMISSION_MASK);
        self.mode = T::from_u64(bits as u64);
    }

    /// Change owner.
    ///
    /// Each value is applied only if it lies in `[0, 2^32)`; an out-of-range
    /// value leaves that field unchanged. Pass `-1` to keep a field.
    pub fn chown(&mut self, uid: i64, gid: i64) {
        if (0..=u32::MAX as i64).contains(&uid) {
            self.uid = T::from_u64(uid as u64);
        }
        if (0..=u32::MAX as i64).contains(&gid) {
            self.gid = T::from_u64(gid as u64);
        }
    }

    /// Convert into another numeric domain.
    pub fn convert<U: StatsNumber>(&self) -> StatsCommon<U> {
        let f = |v: T| U::from_f64(v.to_f64());
        let i = |v: T| U::from_u64(v.to_u64());
        StatsCommon {
            dev: i(self.dev),
            ino: i(self.ino),
            mode: i(self.mode),
            nlink: i(self.nlink),
            uid: i(self.uid),
            gid: i(self.gid),
            rdev: i(self.rdev),
            size: i(self.size),
            blksize: i(self.blksize),
            blocks: i(self.blocks),
            atime_ms: f(self.atime_ms),
            mtime_ms: f(self.mtime_ms),
            ctime_ms: f(self.ctime_ms),
            birthtime_ms: f(self.birthtime_ms),
        }
    }

    /// Set the size and recompute the block count.
    pub fn set_size(&mut self, size: u64) {
        self.size = T::from_u64(size);
        self.blocks = T::from_u64(size.div_ceil(512));
    }
}

fn to_system_time(ms: f64) -> SystemTime {
    if ms.is_finite() && ms > 0.0 {
        UNIX_EPOCH + Duration::from_secs_f64(ms / 1000.0)
    } else {
        UNIX_EPOCH
    }
}
