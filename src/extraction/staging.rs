//! Zero-on-release staging memory for extraction.

use crate::channel::WORD_SIZE;
use crate::error::{Result, TestingError};

/// Temporary buffer holding drained samples on their way to the consumer.
///
/// The contents are overwritten with zeros when the buffer is wiped or
/// dropped, so raw samples never linger in freed memory.
pub struct StagingBuffer {
    bytes: Vec<u8>,
}

impl StagingBuffer {
    /// Allocates a zeroed buffer of `len` bytes, rounded down to whole words.
    ///
    /// Allocation failure is reported instead of aborting the process.
    pub fn allocate(len: usize) -> Result<Self> {
        let len = len - len % WORD_SIZE;
        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(len)
            .map_err(|_| TestingError::ResourceExhausted { requested: len })?;
        bytes.resize(len, 0);
        Ok(Self { bytes })
    }

    /// Allocates room for one full ring of `capacity` samples.
    pub fn for_ring(capacity: usize) -> Result<Self> {
        let len = capacity
            .checked_mul(WORD_SIZE)
            .ok_or(TestingError::ResourceExhausted { requested: usize::MAX })?;
        Self::allocate(len)
    }

    /// Buffer length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns true if the buffer holds no bytes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Staged bytes.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    /// Staged bytes, writable.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    /// Overwrites every byte with zero.
    pub fn wipe(&mut self) {
        self.bytes.fill(0);
        // Keep the stores from being elided as dead writes.
        std::hint::black_box(&mut self.bytes);
    }
}

impl Drop for StagingBuffer {
    fn drop(&mut self) {
        self.wipe();
    }
}

impl std::fmt::Debug for StagingBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StagingBuffer")
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocation_is_word_aligned() {
        let staging = StagingBuffer::allocate(10).unwrap();
        assert_eq!(staging.len(), 8);

        let staging = StagingBuffer::for_ring(4).unwrap();
        assert_eq!(staging.len(), 16);
    }

    #[test]
    fn test_wipe_zeroes_contents() {
        let mut staging = StagingBuffer::allocate(16).unwrap();
        staging.as_mut_slice().fill(0xA5);
        staging.wipe();
        assert!(staging.as_slice().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_oversized_ring_is_exhausted() {
        assert!(matches!(
            StagingBuffer::for_ring(usize::MAX),
            Err(TestingError::ResourceExhausted { .. })
        ));
    }

    #[test]
    fn test_debug_hides_contents() {
        let mut staging = StagingBuffer::allocate(4).unwrap();
        staging.as_mut_slice().copy_from_slice(&[1, 2, 3, 4]);
        let debug = format!("{:?}", staging);
        assert_eq!(debug, "StagingBuffer { bytes: 4 }");
    }
}
