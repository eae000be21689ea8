//! Growable backing buffer for open files.
//!
//! A [`FileBuffer`] holds exactly the bytes of the file (its length is the
//! logical file size) and grows according to a [`GrowthStrategy`] up to
//! [`MAX_FILE_SIZE`]. Swapping in a foreign buffer without copying is not
//! offered; callers that already own the bytes hand them over with
//! [`FileBuffer::from_vec`].

use crate::constants::MAX_FILE_SIZE;
use crate::error::{Errno, Error, Result};

/// How a [`FileBuffer`] obtains more room.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GrowthStrategy {
    /// Grow in place with capacity doubling.
    #[default]
    Amortized,
    /// Allocate a buffer of exactly the new size and copy into it.
    ///
    /// Used for backends that report `no_resizable_buffers`.
    Reallocate,
}

/// In-memory contents of an open file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileBuffer {
    data: Vec<u8>,
    strategy: GrowthStrategy,
}

impl FileBuffer {
    /// Empty buffer.
    pub fn new(strategy: GrowthStrategy) -> Self {
        Self {
            data: Vec::new(),
            strategy,
        }
    }

    /// Take ownership of existing contents.
    pub fn from_vec(data: Vec<u8>, strategy: GrowthStrategy) -> Self {
        Self { data, strategy }
    }

    /// Logical length.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// No bytes?
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Current allocation.
    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    /// Growth strategy in use.
    pub fn strategy(&self) -> GrowthStrategy {
        self.strategy
    }

    /// Contents.
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Release the contents.
    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    /// Set the logical length, zero-filling on growth.
    ///
    /// Fails with `EFBIG` past [`MAX_FILE_SIZE`].
    pub fn resize(&mut self, len: u64) -> Result<()> {
        if len > MAX_FILE_SIZE {
            return Err(Error::new(
                Errno::EFBIG,
                format!("file size {} exceeds maximum of {}", len, MAX_FILE_SIZE),
            ));
        }
        let len = len as usize;
        if len > self.data.len() {
            self.reserve_to(len);
        }
        self.data.resize(len, 0);
        Ok(())
    }

    /// Copy `src` in at `offset`, growing as needed. Returns the new end.
    pub fn write_at(&mut self, offset: u64, src: &[u8]) -> Result<u64> {
        let end = offset.saturating_add(src.len() as u64);
        if end > self.data.len() as u64 {
            self.resize(end)?;
        }
        let start = offset as usize;
        self.data[start..start + src.len()].copy_from_slice(src);
        Ok(end)
    }

    /// Copy out up to `dst.len()` bytes from `offset`, clipped at the end.
    pub fn read_at(&self, offset: u64, dst: &mut [u8]) -> usize {
        let len = self.data.len() as u64;
        if offset >= len {
            return 0;
        }
        let start = offset as usize;
        let n = dst.len().min(self.data.len() - start);
        dst[..n].copy_from_slice(&self.data[start..start + n]);
        n
    }

    fn reserve_to(&mut self, len: usize) {
        if len <= self.data.capacity() {
            return;
        }
        match self.strategy {
            GrowthStrategy::Amortized => {
                let target = len
                    .max(self.data.capacity().saturating_mul(2))
                    .min(MAX_FILE_SIZE as usize);
                self.data.reserve_exact(target - self.data.len());
            }
            GrowthStrategy::Reallocate => {
                let mut grown = Vec::with_capacity(len);
                grown.extend_from_slice(&self.data);
                self.data = grown;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_grows() {
        let mut buf = FileBuffer::new(GrowthStrategy::Amortized);
        assert_eq!(buf.write_at(0, b"hello").unwrap(), 5);
        assert_eq!(buf.write_at(5, b" world").unwrap(), 11);
        assert_eq!(buf.as_slice(), b"hello world");
    }

    #[test]
    fn test_write_past_end_zero_fills() {
        let mut buf = FileBuffer::new(GrowthStrategy::Reallocate);
        buf.write_at(3, b"x").unwrap();
        assert_eq!(buf.as_slice(), &[0, 0, 0, b'x']);
        assert_eq!(buf.capacity(), 4);
    }

    #[test]
    fn test_amortized_doubles() {
        let mut buf = FileBuffer::new(GrowthStrategy::Amortized);
        buf.write_at(0, &[1; 100]).unwrap();
        assert!(buf.capacity() >= 100);
        buf.write_at(100, &[1]).unwrap();
        assert!(buf.capacity() >= 200);
    }

    #[test]
    fn test_read_clips() {
        let buf = FileBuffer::from_vec(b"abc".to_vec(), GrowthStrategy::Amortized);
        let mut out = [0u8; 8];
        assert_eq!(buf.read_at(1, &mut out), 2);
        assert_eq!(&out[..2], b"bc");
        assert_eq!(buf.read_at(3, &mut out), 0);
        assert_eq!(buf.read_at(100, &mut out), 0);
    }

    #[test]
    fn test_shrink() {
        let mut buf = FileBuffer::from_vec(b"abcdef".to_vec(), GrowthStrategy::Amortized);
        buf.resize(2).unwrap();
        assert_eq!(buf.as_slice(), b"ab");
    }

    #[test]
    fn test_size_ceiling() {
        let mut buf = FileBuffer::new(GrowthStrategy::Amortized);
        let err = buf.resize(MAX_FILE_SIZE + 1).unwrap_err();
        assert!(err.is(Errno::EFBIG));
        let err = buf.write_at(MAX_FILE_SIZE, b"x").unwrap_err();
        assert!(err.is(Errno::EFBIG));
        assert!(buf.is_empty());
    }
}
