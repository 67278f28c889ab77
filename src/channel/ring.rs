//! Fixed-capacity ring of 32-bit samples.
//!
//! Indices are free-running counters. The slot for an index is
//! `index & mask`, so capacity must be a power of two. Writes never fail:
//! once the ring is full, new samples overwrite the oldest unread ones.

use crate::error::{Result, TestingError};

/// Default ring capacity in samples.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Size of one sample word in bytes.
pub const WORD_SIZE: usize = std::mem::size_of::<u32>();

/// Circular sample store with monotonically increasing indices.
///
/// Not synchronized by itself; [`TestChannel`](super::TestChannel) keeps it
/// behind the channel lock.
pub struct RingBuffer {
    /// Sample slots, allocated once.
    slots: Box<[u32]>,
    /// `capacity - 1`.
    mask: u64,
    /// Total samples ever written since the last reset.
    write_index: u64,
    /// Total samples consumed (or skipped) since the last reset.
    read_index: u64,
}

impl RingBuffer {
    /// Creates a ring holding `capacity` samples.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 || !capacity.is_power_of_two() {
            return Err(TestingError::InvalidCapacity(capacity));
        }
        Ok(Self {
            slots: vec![0u32; capacity].into_boxed_slice(),
            mask: (capacity - 1) as u64,
            write_index: 0,
            read_index: 0,
        })
    }

    /// Stores a sample, overwriting the oldest slot on wrap.
    #[inline]
    pub fn write(&mut self, value: u32) {
        self.slots[(self.write_index & self.mask) as usize] = value;
        self.write_index = self.write_index.wrapping_add(1);
    }

    /// Returns true if unread samples remain.
    #[inline]
    pub fn has_unread(&self) -> bool {
        self.write_index != self.read_index
    }

    /// Skips samples that were overwritten before the reader got to them.
    ///
    /// Returns the number of samples lost.
    pub fn skip_overwritten(&mut self) -> u64 {
        let capacity = self.capacity() as u64;
        let pending = self.occupancy();
        if pending <= capacity {
            return 0;
        }
        let lost = pending - capacity;
        self.read_index = self.read_index.wrapping_add(lost);
        lost
    }

    /// Removes and returns the oldest unread sample.
    ///
    /// Callers must first drop lost samples with [`skip_overwritten`].
    ///
    /// [`skip_overwritten`]: Self::skip_overwritten
    #[inline]
    pub fn read(&mut self) -> Option<u32> {
        if !self.has_unread() {
            return None;
        }
        let value = self.slots[(self.read_index & self.mask) as usize];
        self.read_index = self.read_index.wrapping_add(1);
        Some(value)
    }

    /// Zeroes both indices. Slot contents are left in place and become
    /// unreachable.
    pub fn reset(&mut self) {
        self.write_index = 0;
        self.read_index = 0;
    }

    /// Samples written but not yet read, including any already overwritten.
    #[inline]
    pub fn occupancy(&self) -> u64 {
        self.write_index.wrapping_sub(self.read_index)
    }

    /// Ring capacity in samples.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Free-running write counter.
    #[inline]
    pub fn write_index(&self) -> u64 {
        self.write_index
    }

    /// Free-running read counter.
    #[inline]
    pub fn read_index(&self) -> u64 {
        self.read_index
    }
}

impl std::fmt::Debug for RingBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingBuffer")
            .field("capacity", &self.slots.len())
            .field("write_index", &self.write_index)
            .field("read_index", &self.read_index)
            .finish()
    }
}
