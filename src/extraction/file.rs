//! Per-channel read surface.
//!
//! Each channel is exposed as an owner-readable virtual file. Reading it
//! drains the channel; the stream position only ever moves forward.

use super::extract::extract;
use crate::channel::{Cancellation, TestChannel};
use crate::error::Result;
use std::io::Write;
use std::sync::Arc;

/// Permission bits of a channel file (owner read only).
pub const FILE_MODE: u32 = 0o400;

/// A readable handle onto one channel.
///
/// Each channel supports a single reader, so handles cannot be cloned:
///
/// ```compile_fail
/// use entropy_testing::{ChannelKind, ChannelSet, TestingConfig};
///
/// let channels = ChannelSet::new(&TestingConfig::default()).unwrap();
/// let file = channels.open(ChannelKind::RawEntropy);
/// let second = file.clone();
/// ```
#[derive(Debug)]
pub struct ChannelFile {
    channel: Arc<TestChannel>,
    position: u64,
}

impl ChannelFile {
    /// Opens a handle at stream position 0.
    pub fn open(channel: Arc<TestChannel>) -> Self {
        Self {
            channel,
            position: 0,
        }
    }

    /// File name, identical to the channel name.
    pub fn name(&self) -> &str {
        self.channel.name()
    }

    /// Permission bits.
    pub fn mode(&self) -> u32 {
        FILE_MODE
    }

    /// Bytes delivered through this handle so far.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Fills as much of `buf` as the channel provides.
    ///
    /// Blocks while the channel is empty. See [`extract`] for the
    /// partial-read and cancellation contract.
    pub fn read<C: Cancellation + ?Sized>(&mut self, buf: &mut [u8], cancel: &C) -> Result<usize> {
        let count = buf.len();
        let mut sink: &mut [u8] = buf;
        extract(&self.channel, count, &mut sink, &mut self.position, cancel)
    }

    /// Reads up to `count` bytes and writes them to `out`.
    pub fn read_into<W, C>(&mut self, count: usize, out: &mut W, cancel: &C) -> Result<usize>
    where
        W: Write + ?Sized,
        C: Cancellation + ?Sized,
    {
        extract(&self.channel, count, out, &mut self.position, cancel)
    }
}
