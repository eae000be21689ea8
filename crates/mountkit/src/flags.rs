//! Open-flag descriptor.
//!
//! Flags arrive either as a string (`"r"`, `"w+"`, `"ax"`, ...) or as numeric
//! `O_*` bits and are normalized to one [`OpenFlags`] set.

use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;

use crate::constants::{
    O_ACCMODE, O_APPEND, O_CREAT, O_EXCL, O_RDONLY, O_RDWR, O_SYNC, O_TRUNC, O_WRONLY, R_OK, W_OK,
};
use crate::error::{Errno, Error, Result};

bitflags! {
    /// How a file is opened.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct OpenFlags: u8 {
        /// Readable
        const READ = 1 << 0;
        /// Writable
        const WRITE = 1 << 1;
        /// Every write lands at end of file
        const APPEND = 1 << 2;
        /// Truncate to zero length on open
        const TRUNCATE = 1 << 3;
        /// Create if missing
        const CREATE = 1 << 4;
        /// Fail if the file already exists
        const EXCLUSIVE = 1 << 5;
        /// Flush after every write
        const SYNC = 1 << 6;
    }
}

const R: OpenFlags = OpenFlags::READ;
const W: OpenFlags = OpenFlags::WRITE;
const A: OpenFlags = OpenFlags::APPEND;
const T: OpenFlags = OpenFlags::TRUNCATE;
const C: OpenFlags = OpenFlags::CREATE;
const X: OpenFlags = OpenFlags::EXCLUSIVE;
const S: OpenFlags = OpenFlags::SYNC;

/// Accepted flag strings, canonical spelling first.
const FLAG_STRINGS: &[(&[&str], OpenFlags)] = &[
    (&["r"], R),
    (&["r+"], R.union(W)),
    (&["rs", "sr"], R.union(S)),
    (&["rs+", "sr+"], R.union(W).union(S)),
    (&["w"], W.union(C).union(T)),
    (&["wx", "xw"], W.union(C).union(T).union(X)),
    (&["w+"], R.union(W).union(C).union(T)),
    (&["wx+", "xw+"], R.union(W).union(C).union(T).union(X)),
    (&["a"], W.union(C).union(A)),
    (&["ax", "xa"], W.union(C).union(A).union(X)),
    (&["as", "sa"], W.union(C).union(A).union(S)),
    (&["a+"], R.union(W).union(C).union(A)),
    (&["ax+", "xa+"], R.union(W).union(C).union(A).union(X)),
    (&["as+", "sa+"], R.union(W).union(C).union(A).union(S)),
];

impl OpenFlags {
    /// Parse a flag string such as `"r+"` or `"ax"`.
    pub fn parse(flag: &str) -> Result<Self> {
        FLAG_STRINGS
            .iter()
            .find(|(names, _)| names.contains(&flag))
            .map(|(_, flags)| *flags)
            .ok_or_else(|| Error::new(Errno::EINVAL, format!("invalid flag: {}", flag)))
    }

    /// Decode numeric `O_*` bits.
    pub fn from_posix(bits: u32) -> Result<Self> {
        let mut flags = match bits & O_ACCMODE {
            O_RDONLY => R,
            O_WRONLY => W,
            O_RDWR => R | W,
            _ => {
                return Err(Error::new(
                    Errno::EINVAL,
                    format!("invalid access mode in flags: {:#o}", bits),
                ));
            }
        };
        if bits & O_CREAT != 0 {
            flags |= C;
        }
        if bits & O_EXCL != 0 {
            flags |= X;
        }
        if bits & O_TRUNC != 0 {
            flags |= T;
        }
        if bits & O_APPEND != 0 {
            flags |= A;
        }
        if bits & O_SYNC == O_SYNC {
            flags |= S;
        }
        Ok(flags)
    }

    /// Encode as numeric `O_*` bits.
    pub fn to_posix(self) -> u32 {
        let mut bits = match (self.is_readable(), self.is_writeable()) {
            (true, true) => O_RDWR,
            (false, true) => O_WRONLY,
            _ => O_RDONLY,
        };
        for (flag, bit) in [(C, O_CREAT), (X, O_EXCL), (T, O_TRUNC), (A, O_APPEND), (S, O_SYNC)] {
            if self.contains(flag) {
                bits |= bit;
            }
        }
        bits
    }

    /// Canonical flag string, if one describes this set exactly.
    pub fn as_str(self) -> Option<&'static str> {
        FLAG_STRINGS
            .iter()
            .find(|(_, flags)| *flags == self)
            .map(|(names, _)| names[0])
    }

    /// Readable?
    pub fn is_readable(self) -> bool {
        self.contains(R)
    }

    /// Writable?
    pub fn is_writeable(self) -> bool {
        self.contains(W)
    }

    /// Append mode?
    pub fn is_appendable(self) -> bool {
        self.contains(A)
    }

    /// Truncate on open?
    pub fn is_truncating(self) -> bool {
        self.contains(T)
    }

    /// Create when missing?
    pub fn is_creating(self) -> bool {
        self.contains(C)
    }

    /// Exclusive create?
    pub fn is_exclusive(self) -> bool {
        self.contains(X)
    }

    /// Synchronous writes?
    pub fn is_synchronous(self) -> bool {
        self.contains(S)
    }

    /// Access bits (`R_OK | W_OK`) needed to open with these flags.
    pub fn access_mode(self) -> u32 {
        let mut mode = 0;
        if self.is_readable() {
            mode |= R_OK;
        }
        if self.is_writeable() || self.is_truncating() {
            mode |= W_OK;
        }
        mode
    }
}

impl FromStr for OpenFlags {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<u32> for OpenFlags {
    type Error = Error;

    fn try_from(bits: u32) -> Result<Self> {
        Self::from_posix(bits)
    }
}

impl fmt::Display for OpenFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_str() {
            Some(s) => f.write_str(s),
            None => write!(f, "{:#o}", self.to_posix()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_strings() {
        let r = OpenFlags::parse("r").unwrap();
        assert!(r.is_readable() && !r.is_writeable() && !r.is_creating());

        let w = OpenFlags::parse("w").unwrap();
        assert!(w.is_writeable() && w.is_truncating() && w.is_creating());
        assert!(!w.is_readable());

        let ax = OpenFlags::parse("xa+").unwrap();
        assert!(ax.is_appendable() && ax.is_exclusive() && ax.is_readable());
        assert_eq!(ax.as_str(), Some("ax+"));

        assert!(OpenFlags::parse("rs+").unwrap().is_synchronous());
    }

    #[test]
    fn test_parse_rejects_unknown() {
        for bad in ["", "rw", "x", "wr", "a++"] {
            assert!(OpenFlags::parse(bad).unwrap_err().is(Errno::EINVAL), "{bad}");
        }
    }

    #[test]
    fn test_posix_bits() {
        let flags = OpenFlags::from_posix(O_RDWR | O_CREAT | O_APPEND).unwrap();
        assert_eq!(flags, OpenFlags::parse("a+").unwrap());
        assert_eq!(flags.to_posix(), O_RDWR | O_CREAT | O_APPEND);

        let trunc = OpenFlags::from_posix(O_WRONLY | O_CREAT | O_TRUNC).unwrap();
        assert_eq!(trunc.to_string(), "w");

        assert!(OpenFlags::from_posix(O_ACCMODE).unwrap_err().is(Errno::EINVAL));
    }

    #[test]
    fn test_access_mode() {
        assert_eq!(OpenFlags::parse("r").unwrap().access_mode(), R_OK);
        assert_eq!(OpenFlags::parse("a").unwrap().access_mode(), W_OK);
        assert_eq!(OpenFlags::parse("w+").unwrap().access_mode(), R_OK | W_OK);
    }

    #[test]
    fn test_display_without_string_form() {
        let flags = OpenFlags::READ | OpenFlags::TRUNCATE;
        assert_eq!(flags.as_str(), None);
        assert_eq!(flags.to_string(), format!("{:#o}", O_TRUNC));
    }
}
