//! POSIX constants shared across the crate.
//!
//! Values follow Linux.

/// Bit mask for the file type bit field
pub const S_IFMT: u32 = 0o170000;
/// Socket
pub const S_IFSOCK: u32 = 0o140000;
/// Symbolic link
pub const S_IFLNK: u32 = 0o120000;
/// Regular file
pub const S_IFREG: u32 = 0o100000;
/// Block device
pub const S_IFBLK: u32 = 0o060000;
/// Directory
pub const S_IFDIR: u32 = 0o040000;
/// Character device
pub const S_IFCHR: u32 = 0o020000;
/// FIFO
pub const S_IFIFO: u32 = 0o010000;

/// Set-user-ID bit
pub const S_ISUID: u32 = 0o4000;
/// Set-group-ID bit
pub const S_ISGID: u32 = 0o2000;
/// Sticky bit
pub const S_ISVTX: u32 = 0o1000;

/// Permission bits (including setuid/setgid/sticky)
pub const PERMISSION_MASK: u32 = 0o7777;

/// Owner read
pub const S_IRUSR: u32 = 0o400;
/// Owner write
pub const S_IWUSR: u32 = 0o200;
/// Owner execute
pub const S_IXUSR: u32 = 0o100;
/// Group read
pub const S_IRGRP: u32 = 0o40;
/// Group write
pub const S_IWGRP: u32 = 0o20;
/// Group execute
pub const S_IXGRP: u32 = 0o10;
/// Others read
pub const S_IROTH: u32 = 0o4;
/// Others write
pub const S_IWOTH: u32 = 0o2;
/// Others execute
pub const S_IXOTH: u32 = 0o1;

/// File exists
pub const F_OK: u32 = 0;
/// Readable
pub const R_OK: u32 = 4;
/// Writable
pub const W_OK: u32 = 2;
/// Executable
pub const X_OK: u32 = 1;

/// Open for reading only
pub const O_RDONLY: u32 = 0;
/// Open for writing only
pub const O_WRONLY: u32 = 0o1;
/// Open for reading and writing
pub const O_RDWR: u32 = 0o2;
/// Access mode mask
pub const O_ACCMODE: u32 = 0o3;
/// Create if missing
pub const O_CREAT: u32 = 0o100;
/// Fail if the file exists
pub const O_EXCL: u32 = 0o200;
/// Truncate to zero length
pub const O_TRUNC: u32 = 0o1000;
/// Append on each write
pub const O_APPEND: u32 = 0o2000;
/// Synchronous writes
pub const O_SYNC: u32 = 0o4010000;

/// Largest size a buffered file may reach (2^32 - 1 bytes).
pub const MAX_FILE_SIZE: u64 = u32::MAX as u64;
