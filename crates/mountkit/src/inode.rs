//! Fixed-layout inode record.
//!
//! The record is 58 bytes, little-endian:
//!
//! | offset | field        | type |
//! |--------|--------------|------|
//! | 0      | ino          | u64  |
//! | 8      | size         | u32  |
//! | 12     | mode         | u16  |
//! | 14     | nlink        | u32  |
//! | 18     | uid          | u32  |
//! | 22     | gid          | u32  |
//! | 26     | atime_ms     | f64  |
//! | 34     | birthtime_ms | f64  |
//! | 42     | mtime_ms     | f64  |
//! | 50     | ctime_ms     | f64  |
//!
//! Backends that persist inodes store these bytes verbatim.

use crate::error::{Errno, Error, Result};
use crate::stats::{Stats, now_ms};

/// Serialized size of an [`Inode`].
pub const INODE_SIZE: usize = 58;

const INO: usize = 0;
const SIZE: usize = 8;
const MODE: usize = 12;
const NLINK: usize = 14;
const UID: usize = 18;
const GID: usize = 22;
const ATIME: usize = 26;
const BIRTHTIME: usize = 34;
const MTIME: usize = 42;
const CTIME: usize = 50;

/// Default size recorded for a fresh inode.
const DEFAULT_SIZE: u32 = 4096;

/// Inode record backed by its own byte image.
///
/// Accessors read and write the byte image directly, so
/// [`as_bytes`](Inode::as_bytes) is always the current serialized form.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Inode {
    buf: [u8; INODE_SIZE],
}

macro_rules! field {
    ($get:ident, $set:ident, $ty:ty, $off:expr) => {
        #[doc = concat!("`", stringify!($get), "` field")]
        pub fn $get(&self) -> $ty {
            const N: usize = std::mem::size_of::<$ty>();
            let mut raw = [0u8; N];
            raw.copy_from_slice(&self.buf[$off..$off + N]);
            <$ty>::from_le_bytes(raw)
        }

        #[doc = concat!("Set the `", stringify!($get), "` field")]
        pub fn $set(&mut self, value: $ty) {
            const N: usize = std::mem::size_of::<$ty>();
            self.buf[$off..$off + N].copy_from_slice(&value.to_le_bytes());
        }
    };
}

impl Inode {
    /// Fresh inode: random `ino`, `nlink = 1`, `size = 4096`, all times now.
    ///
    /// `mode` is zero; callers set the type and permission bits.
    pub fn new() -> Self {
        let mut inode = Self {
            buf: [0; INODE_SIZE],
        };
        let now = now_ms();
        inode.set_ino(rand::random::<u64>());
        inode.set_nlink(1);
        inode.set_size(DEFAULT_SIZE);
        inode.set_atime_ms(now);
        inode.set_birthtime_ms(now);
        inode.set_mtime_ms(now);
        inode.set_ctime_ms(now);
        inode
    }

    /// Decode from a stored record. Trailing bytes are ignored.
    ///
    /// Fails with `ERANGE` if `data` is shorter than [`INODE_SIZE`].
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let Some(head) = data.get(..INODE_SIZE) else {
            return Err(Error::new(
                Errno::ERANGE,
                format!(
                    "inode record needs {} bytes, got {}",
                    INODE_SIZE,
                    data.len()
                ),
            ));
        };
        let mut buf = [0u8; INODE_SIZE];
        buf.copy_from_slice(head);
        Ok(Self { buf })
    }

    /// Serialized record.
    pub fn as_bytes(&self) -> &[u8; INODE_SIZE] {
        &self.buf
    }

    /// Owned copy of the serialized record.
    pub fn to_vec(&self) -> Vec<u8> {
        self.buf.to_vec()
    }

    field!(ino, set_ino, u64, INO);
    field!(size, set_size, u32, SIZE);
    field!(mode, set_mode, u16, MODE);
    field!(nlink, set_nlink, u32, NLINK);
    field!(uid, set_uid, u32, UID);
    field!(gid, set_gid, u32, GID);
    field!(atime_ms, set_atime_ms, f64, ATIME);
    field!(birthtime_ms, set_birthtime_ms, f64, BIRTHTIME);
    field!(mtime_ms, set_mtime_ms, f64, MTIME);
    field!(ctime_ms, set_ctime_ms, f64, CTIME);

    /// Stats view of this record.
    pub fn to_stats(&self) -> Stats {
        Stats {
            ino: self.ino() as f64,
            mode: self.mode() as f64,
            nlink: self.nlink() as f64,
            uid: self.uid() as f64,
            gid: self.gid() as f64,
            atime_ms: self.atime_ms(),
            birthtime_ms: self.birthtime_ms(),
            mtime_ms: self.mtime_ms(),
            ctime_ms: self.ctime_ms(),
            ..Stats::new(self.mode() as u32, self.size() as u64)
        }
    }

    /// Copy the fields of `stats` that differ from this record.
    ///
    /// Returns true if anything changed, i.e. whether the record needs to be
    /// written back. `ino` and `birthtime` are identity and never copied.
    pub fn update(&mut self, stats: &Stats) -> bool {
        let mut changed = false;

        macro_rules! sync_int {
            ($get:ident, $set:ident, $src:expr, $ty:ty) => {
                let value = $src as $ty;
                if self.$get() != value {
                    self.$set(value);
                    changed = true;
                }
            };
        }
        macro_rules! sync_time {
            ($get:ident, $set:ident, $src:expr) => {
                if self.$get().to_bits() != $src.to_bits() {
                    self.$set($src);
                    changed = true;
                }
            };
        }

        sync_int!(size, set_size, stats.size, u32);
        sync_int!(mode, set_mode, stats.mode, u16);
        sync_int!(nlink, set_nlink, stats.nlink, u32);
        sync_int!(uid, set_uid, stats.uid, u32);
        sync_int!(gid, set_gid, stats.gid, u32);
        sync_time!(atime_ms, set_atime_ms, stats.atime_ms);
        sync_time!(mtime_ms, set_mtime_ms, stats.mtime_ms);
        sync_time!(ctime_ms, set_ctime_ms, stats.ctime_ms);

        changed
    }
}

impl Default for Inode {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Inode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Inode")
            .field("ino", &self.ino())
            .field("size", &self.size())
            .field("mode", &format_args!("{:o}", self.mode()))
            .field("nlink", &self.nlink())
            .field("uid", &self.uid())
            .field("gid", &self.gid())
            .field("atime_ms", &self.atime_ms())
            .field("birthtime_ms", &self.birthtime_ms())
            .field("mtime_ms", &self.mtime_ms())
            .field("ctime_ms", &self.ctime_ms())
            .finish()
    }
}

impl TryFrom<&[u8]> for Inode {
    type Error = Error;

    fn try_from(data: &[u8]) -> Result<Self> {
        Self::from_bytes(data)
    }
}
