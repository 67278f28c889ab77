//! Chunked extraction of channel samples into a byte stream.

use super::staging::StagingBuffer;
use crate::channel::{Cancellation, TestChannel};
use crate::error::{Result, TestingError};
use std::io::Write;

/// Requests above this many bytes yield and poll for cancellation
/// between chunks.
pub const LARGE_REQUEST_THRESHOLD: usize = 256;

/// Delivers up to `total_len` bytes of samples from `channel` into `out`.
///
/// The request is served in chunks of at most one ring capacity through a
/// staging buffer that is zeroed before it is released. `position` is
/// advanced by exactly the number of bytes delivered, even when the call
/// ends in an error.
///
/// Returns the number of bytes delivered. A chunk that yields no data ends
/// the stream early. Requests above [`LARGE_REQUEST_THRESHOLD`] yield and
/// check for cancellation between chunks, so buffered samples are still
/// delivered by the first chunk. Cancellation before any byte was delivered
/// is reported as [`TestingError::Interrupted`]; after that, the partial
/// count is returned.
pub fn extract<W, C>(
    channel: &TestChannel,
    total_len: usize,
    out: &mut W,
    position: &mut u64,
    cancel: &C,
) -> Result<usize>
where
    W: Write + ?Sized,
    C: Cancellation + ?Sized,
{
    if total_len == 0 {
        return Ok(0);
    }

    let mut staging = StagingBuffer::for_ring(channel.capacity())?;
    extract_with(channel, &mut staging, total_len, out, position, cancel)
}

/// Runs the extraction loop through a caller-provided staging buffer.
///
/// The buffer is wiped before returning.
pub(crate) fn extract_with<W, C>(
    channel: &TestChannel,
    staging: &mut StagingBuffer,
    total_len: usize,
    out: &mut W,
    position: &mut u64,
    cancel: &C,
) -> Result<usize>
where
    W: Write + ?Sized,
    C: Cancellation + ?Sized,
{
    let large_request = total_len > LARGE_REQUEST_THRESHOLD;
    let mut remaining = total_len;
    let mut delivered = 0usize;

    let result = loop {
        if remaining == 0 {
            break Ok(delivered);
        }

        // Between chunks only; the first chunk's drain polls on its own.
        if large_request && delivered > 0 {
            if cancel.is_cancelled() {
                break Ok(delivered);
            }
            std::thread::yield_now();
        }

        let chunk = remaining.min(staging.len());
        let copied = match channel.drain(&mut staging.as_mut_slice()[..chunk], cancel) {
            Ok(0) => break Ok(delivered),
            Ok(n) => n,
            Err(e) if delivered == 0 => break Err(e),
            Err(_) => break Ok(delivered),
        };

        if let Err(e) = out.write_all(&staging.as_slice()[..copied]) {
            break Err(TestingError::FaultOnCopy(e));
        }

        remaining -= copied;
        delivered += copied;
        *position += copied as u64;

        tracing::trace!(
            channel = channel.name(),
            chunk = copied,
            delivered,
            remaining,
            "Extracted chunk"
        );
    };

    staging.wipe();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{BootMode, CancelFlag, NeverCancelled, WORD_SIZE};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn filled_channel(capacity: usize, values: impl IntoIterator<Item = u32>) -> TestChannel {
        let channel = TestChannel::new("raw", capacity, BootMode::Off).unwrap();
        channel.enable();
        for v in values {
            assert!(channel.store(v));
        }
        channel
    }

    fn expected_bytes(values: impl IntoIterator<Item = u32>) -> Vec<u8> {
        values.into_iter().flat_map(u32::to_ne_bytes).collect()
    }

    #[test]
    fn test_zero_length_request() {
        let channel = TestChannel::new("raw", 4, BootMode::Off).unwrap();
        let mut out = Vec::new();
        let mut pos = 0;

        let n = extract(&channel, 0, &mut out, &mut pos, &NeverCancelled).unwrap();
        assert_eq!(n, 0);
        assert_eq!(pos, 0);
        // A zero-length read does not touch the channel
        assert!(!channel.is_enabled());
    }

    #[test]
    fn test_multi_chunk_matches_word_drains() {
        let capacity = 4;
        let channel = Arc::new(TestChannel::new("raw", capacity, BootMode::Off).unwrap());
        let total_words = 3 * capacity as u32;

        let producer = {
            let channel = Arc::clone(&channel);
            thread::spawn(move || {
                let mut next = 0;
                while next < total_words {
                    // Only store when there is room so nothing is overwritten
                    let room = channel.stats().occupancy < capacity as u64;
                    if room && channel.store(next) {
                        next += 1;
                    }
                    thread::sleep(Duration::from_millis(1));
                }
            })
        };

        let mut out = Vec::new();
        let mut pos = 0;
        let total = total_words as usize * WORD_SIZE;
        let mut staging = StagingBuffer::for_ring(capacity).unwrap();
        let n = extract_with(&channel, &mut staging, total, &mut out, &mut pos, &NeverCancelled)
            .unwrap();
        producer.join().unwrap();

        assert_eq!(n, total);
        assert_eq!(pos, total as u64);
        assert_eq!(out, expected_bytes(0..total_words));
        assert!(staging.as_slice().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_staging_wiped_after_extract() {
        let channel = filled_channel(8, [0xDEAD_BEEF, 0xFEED_FACE]);
        let mut staging = StagingBuffer::for_ring(8).unwrap();
        let mut out = Vec::new();
        let mut pos = 0;

        let n = extract_with(&channel, &mut staging, 8, &mut out, &mut pos, &NeverCancelled)
            .unwrap();

        assert_eq!(n, 8);
        assert_eq!(out, expected_bytes([0xDEAD_BEEF, 0xFEED_FACE]));
        assert!(staging.as_slice().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_boot_window_handover() {
        let channel = TestChannel::new("raw", 8, BootMode::Armed).unwrap();
        channel.store(1);
        channel.store(2);

        let mut out = Vec::new();
        let mut pos = 0;
        let n = extract(&channel, 8, &mut out, &mut pos, &NeverCancelled).unwrap();

        assert_eq!(n, 8);
        assert_eq!(out, expected_bytes([1, 2]));
        assert_eq!(channel.boot_mode(), BootMode::Off);
        assert!(!channel.is_enabled());
    }

    #[test]
    fn test_empty_boot_window_ends_stream() {
        let channel = TestChannel::new("raw", 8, BootMode::Armed).unwrap();

        let mut out = Vec::new();
        let mut pos = 0;
        let n = extract(&channel, 1024, &mut out, &mut pos, &NeverCancelled).unwrap();

        assert_eq!(n, 0);
        assert!(out.is_empty());
        assert_eq!(channel.boot_mode(), BootMode::Off);
    }

    #[test]
    fn test_cancelled_large_request_delivers_buffered() {
        let channel = filled_channel(8, [1, 2, 3]);
        let cancel = CancelFlag::new();
        cancel.raise();

        let mut out = Vec::new();
        let mut pos = 0;
        let n = extract(&channel, 4096, &mut out, &mut pos, &cancel).unwrap();

        assert_eq!(n, 12);
        assert_eq!(pos, 12);
        assert_eq!(out, expected_bytes([1, 2, 3]));
    }

    #[test]
    fn test_cancelled_empty_channel_interrupts() {
        let channel = TestChannel::new("raw", 8, BootMode::Off).unwrap();
        let cancel = CancelFlag::new();
        cancel.raise();

        let mut out = Vec::new();
        let mut pos = 0;
        let result = extract(&channel, 4096, &mut out, &mut pos, &cancel);

        assert!(matches!(result, Err(TestingError::Interrupted)));
        assert!(out.is_empty());
        assert_eq!(pos, 0);
    }

    #[test]
    fn test_cancel_after_partial_delivery() {
        let channel = Arc::new(filled_channel(4, [7, 8]));
        let cancel = CancelFlag::new();

        let canceller = {
            let cancel = cancel.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(60));
                cancel.raise();
            })
        };

        let mut out = Vec::new();
        let mut pos = 0;
        let n = extract(&channel, 4096, &mut out, &mut pos, &cancel).unwrap();
        canceller.join().unwrap();

        assert_eq!(n, 8);
        assert_eq!(pos, 8);
        assert_eq!(out, expected_bytes([7, 8]));
    }

    #[test]
    fn test_copy_fault_aborts() {
        let channel = filled_channel(8, [1, 2, 3, 4]);
        let mut small = [0u8; 6];
        let mut sink: &mut [u8] = &mut small;
        let mut pos = 0;

        let result = extract(&channel, 16, &mut sink, &mut pos, &NeverCancelled);
        assert!(matches!(result, Err(TestingError::FaultOnCopy(_))));
        assert_eq!(pos, 0);
    }

    /// Accepts up to `limit` bytes, then fails every write.
    struct LimitedSink {
        data: Vec<u8>,
        limit: usize,
    }

    impl Write for LimitedSink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            let room = self.limit - self.data.len();
            if room == 0 {
                return Err(std::io::Error::new(std::io::ErrorKind::Other, "sink full"));
            }
            let n = buf.len().min(room);
            self.data.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_copy_fault_keeps_earlier_chunks() {
        let capacity = 4;
        let chunk_len = capacity * WORD_SIZE;
        let channel = filled_channel(capacity, [1, 2, 3, 4]);
        let mut staging = StagingBuffer::for_ring(capacity).unwrap();
        let mut sink = LimitedSink {
            data: Vec::new(),
            limit: chunk_len,
        };
        let mut pos = 0;

        let producer = {
            let channel = &channel;
            move || {
                // Refill once the first chunk has been drained
                while channel.has_unread() {
                    thread::sleep(Duration::from_millis(1));
                }
                // Stores are declined until the next chunk re-enables collection
                for v in 5..9 {
                    while !channel.store(v) {
                        thread::sleep(Duration::from_millis(1));
                    }
                }
            }
        };

        let result = thread::scope(|s| {
            s.spawn(producer);
            extract_with(
                &channel,
                &mut staging,
                2 * chunk_len,
                &mut sink,
                &mut pos,
                &NeverCancelled,
            )
        });

        assert!(matches!(result, Err(TestingError::FaultOnCopy(_))));
        assert_eq!(pos, chunk_len as u64);
        assert_eq!(sink.data, expected_bytes([1, 2, 3, 4]));
        assert!(staging.as_slice().iter().all(|&b| b == 0));
    }
}
