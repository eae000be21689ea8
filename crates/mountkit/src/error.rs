//! Error types for Mountkit
//!
//! Every operation fails with exactly one [`Error`]: a POSIX-style [`Errno`]
//! plus the offending path and the syscall-like operation name. The code,
//! path and syscall are kept as structured fields so callers can match on them
//! instead of parsing messages.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias using Mountkit's Error.
pub type Result<T> = std::result::Result<T, Error>;

/// POSIX error codes surfaced by the filesystem core.
///
/// Numeric values follow Linux.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[allow(clippy::upper_case_acronyms)]
#[repr(u16)]
pub enum Errno {
    /// Operation not permitted
    EPERM = 1,
    /// No such file or directory
    ENOENT = 2,
    /// Input/output error
    EIO = 5,
    /// Bad file descriptor
    EBADF = 9,
    /// Permission denied
    EACCES = 13,
    /// Resource busy or locked
    EBUSY = 16,
    /// File exists
    EEXIST = 17,
    /// Cross-device link
    EXDEV = 18,
    /// Not a directory
    ENOTDIR = 20,
    /// Is a directory
    EISDIR = 21,
    /// Invalid argument
    EINVAL = 22,
    /// File too large
    EFBIG = 27,
    /// No space left on device
    ENOSPC = 28,
    /// Read-only file system
    EROFS = 30,
    /// Result out of range
    ERANGE = 34,
    /// Directory not empty
    ENOTEMPTY = 39,
    /// Operation not supported
    ENOTSUP = 95,
}

impl Errno {
    /// Numeric code.
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Stable short name, e.g. `"ENOENT"`.
    pub fn name(self) -> &'static str {
        match self {
            Errno::EPERM => "EPERM",
            Errno::ENOENT => "ENOENT",
            Errno::EIO => "EIO",
            Errno::EBADF => "EBADF",
            Errno::EACCES => "EACCES",
            Errno::EBUSY => "EBUSY",
            Errno::EEXIST => "EEXIST",
            Errno::EXDEV => "EXDEV",
            Errno::ENOTDIR => "ENOTDIR",
            Errno::EISDIR => "EISDIR",
            Errno::EINVAL => "EINVAL",
            Errno::EFBIG => "EFBIG",
            Errno::ENOSPC => "ENOSPC",
            Errno::EROFS => "EROFS",
            Errno::ERANGE => "ERANGE",
            Errno::ENOTEMPTY => "ENOTEMPTY",
            Errno::ENOTSUP => "ENOTSUP",
        }
    }

    /// Human-readable description.
    pub fn description(self) -> &'static str {
        match self {
            Errno::EPERM => "Operation not permitted",
            Errno::ENOENT => "No such file or directory",
            Errno::EIO => "Input/output error",
            Errno::EBADF => "Bad file descriptor",
            Errno::EACCES => "Permission denied",
            Errno::EBUSY => "Resource busy or locked",
            Errno::EEXIST => "File exists",
            Errno::EXDEV => "Invalid cross-device link",
            Errno::ENOTDIR => "File is not a directory",
            Errno::EISDIR => "File is a directory",
            Errno::EINVAL => "Invalid argument",
            Errno::EFBIG => "File is too big",
            Errno::ENOSPC => "No space left on disk",
            Errno::EROFS => "Cannot modify a read-only file system",
            Errno::ERANGE => "Result out of range",
            Errno::ENOTEMPTY => "Directory is not empty",
            Errno::ENOTSUP => "Operation is not supported",
        }
    }

    /// Look up an errno by numeric code.
    pub fn from_code(code: u16) -> Option<Self> {
        Self::ALL.iter().copied().find(|e| e.code() == code)
    }

    /// All known codes, in numeric order.
    pub const ALL: [Errno; 17] = [
        Errno::EPERM,
        Errno::ENOENT,
        Errno::EIO,
        Errno::EBADF,
        Errno::EACCES,
        Errno::EBUSY,
        Errno::EEXIST,
        Errno::EXDEV,
        Errno::ENOTDIR,
        Errno::EISDIR,
        Errno::EINVAL,
        Errno::EFBIG,
        Errno::ENOSPC,
        Errno::EROFS,
        Errno::ERANGE,
        Errno::ENOTEMPTY,
        Errno::ENOTSUP,
    ];

    fn io_kind(self) -> io::ErrorKind {
        match self {
            Errno::EPERM | Errno::EACCES => io::ErrorKind::PermissionDenied,
            Errno::ENOENT => io::ErrorKind::NotFound,
            Errno::EEXIST => io::ErrorKind::AlreadyExists,
            Errno::ENOTDIR => io::ErrorKind::NotADirectory,
            Errno::EISDIR => io::ErrorKind::IsADirectory,
            Errno::ENOTEMPTY => io::ErrorKind::DirectoryNotEmpty,
            Errno::EINVAL | Errno::ERANGE => io::ErrorKind::InvalidInput,
            Errno::EROFS => io::ErrorKind::ReadOnlyFilesystem,
            Errno::EBUSY => io::ErrorKind::ResourceBusy,
            Errno::EXDEV => io::ErrorKind::CrossesDevices,
            Errno::EFBIG => io::ErrorKind::FileTooLarge,
            Errno::ENOSPC => io::ErrorKind::StorageFull,
            Errno::ENOTSUP => io::ErrorKind::Unsupported,
            Errno::EIO | Errno::EBADF => io::ErrorKind::Other,
        }
    }
}

impl fmt::Display for Errno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Filesystem error.
///
/// Renders like `ENOENT: No such file or directory, stat '/a/b'`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{errno}: {message}{}", location(.syscall, .path.as_deref()))]
pub struct Error {
    /// Error code
    pub errno: Errno,
    /// Human-readable message (defaults to the errno description)
    pub message: String,
    /// Offending path, when there is one
    pub path: Option<PathBuf>,
    /// Syscall-like operation name, e.g. `"stat"`
    pub syscall: Option<&'static str>,
}

fn location(syscall: &Option<&'static str>, path: Option<&Path>) -> String {
    match (syscall, path) {
        (Some(syscall), Some(path)) => format!(", {} '{}'", syscall, path.display()),
        (Some(syscall), None) => format!(", {}", syscall),
        (None, Some(path)) => format!(", '{}'", path.display()),
        (None, None) => String::new(),
    }
}

impl Error {
    /// Create an error with a custom message and no location.
    pub fn new(errno: Errno, message: impl Into<String>) -> Self {
        Self {
            errno,
            message: message.into(),
            path: None,
            syscall: None,
        }
    }

    /// Create an error carrying the standard description, the path and the syscall.
    pub fn with(errno: Errno, path: impl AsRef<Path>, syscall: &'static str) -> Self {
        Self {
            errno,
            message: errno.description().to_string(),
            path: Some(path.as_ref().to_path_buf()),
            syscall: Some(syscall),
        }
    }

    /// Attach a path.
    pub fn at(mut self, path: impl AsRef<Path>) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Attach a syscall name.
    pub fn during(mut self, syscall: &'static str) -> Self {
        self.syscall = Some(syscall);
        self
    }

    /// Stable short code, e.g. `"EEXIST"`.
    pub fn code(&self) -> &'static str {
        self.errno.name()
    }

    /// Check the error code.
    pub fn is(&self, errno: Errno) -> bool {
        self.errno == errno
    }
}

impl From<Errno> for Error {
    fn from(errno: Errno) -> Self {
        Self::new(errno, errno.description())
    }
}

/// Convert to `std::io::Error` for interop with std APIs.
impl From<Error> for io::Error {
    fn from(e: Error) -> Self {
        io::Error::new(e.errno.io_kind(), e)
    }
}
