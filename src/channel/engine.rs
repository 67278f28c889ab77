//! The test channel engine: producer entry point and consumer drain loop.
//!
//! # Locking Model
//!
//! Each channel owns one lock guarding its ring and its indices. The
//! producer may run on any thread at any rate and must never wait for the
//! consumer, so every critical section is a handful of loads and stores
//! with no allocation, logging or blocking inside. The consumer takes the
//! lock once per word, which keeps the window in which the producer can
//! be held up to a single copy.
//!
//! The enable flag and boot mode are readable without the lock (the
//! producer's rejection fast path) but are only written while holding it.

use super::cancel::Cancellation;
use super::ring::{RingBuffer, DEFAULT_CAPACITY, WORD_SIZE};
use super::state::{BootCell, BootMode, ChannelMode};
use crate::error::{Result, TestingError};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// How often a blocked consumer wakes to poll for cancellation.
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Per-channel running counters.
#[derive(Debug, Default)]
struct Counters {
    accepted: AtomicU64,
    rejected: AtomicU64,
    overwritten: AtomicU64,
    drained_words: AtomicU64,
}

/// Point-in-time view of a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelStats {
    /// Channel name.
    pub name: String,
    /// Combined enable/boot mode.
    pub mode: ChannelMode,
    /// Boot collection state.
    pub boot_mode: BootMode,
    /// Runtime enable flag.
    pub enabled: bool,
    /// Ring capacity in samples.
    pub capacity: usize,
    /// Unread samples, including any already overwritten.
    pub occupancy: u64,
    /// Free-running write counter.
    pub write_index: u64,
    /// Free-running read counter.
    pub read_index: u64,
    /// Samples accepted by the producer.
    pub accepted: u64,
    /// Samples declined by the producer.
    pub rejected: u64,
    /// Samples lost to wraparound before the consumer read them.
    pub overwritten: u64,
    /// Samples delivered to consumers.
    pub drained_words: u64,
}

/// Outcome of waiting for data inside the drain loop.
enum Wait {
    Ready,
    EndOfStream,
    Cancelled,
}

/// One producer/consumer pipeline for a single kind of raw sample.
///
/// The producer calls [`store`](Self::store) from a context that must not
/// block. A single consumer calls [`drain`](Self::drain), which blocks
/// until samples arrive or the caller is cancelled.
#[derive(Debug)]
pub struct TestChannel {
    name: String,
    ring: Mutex<RingBuffer>,
    data_ready: Condvar,
    /// Consumers currently parked on `data_ready`.
    sleepers: AtomicUsize,
    enabled: AtomicBool,
    boot: BootCell,
    counters: Counters,
}

impl TestChannel {
    /// Creates a channel with the given ring capacity and initial boot mode.
    pub fn new(name: impl Into<String>, capacity: usize, boot: BootMode) -> Result<Self> {
        if boot == BootMode::Completed {
            return Err(TestingError::BootModeLocked);
        }
        Ok(Self {
            name: name.into(),
            ring: Mutex::new(RingBuffer::new(capacity)?),
            data_ready: Condvar::new(),
            sleepers: AtomicUsize::new(0),
            enabled: AtomicBool::new(false),
            boot: BootCell::new(boot),
            counters: Counters::default(),
        })
    }

    /// Creates a disabled channel with the default capacity.
    pub fn with_default_capacity(name: impl Into<String>) -> Result<Self> {
        Self::new(name, DEFAULT_CAPACITY, BootMode::Off)
    }

    /// Stores one sample.
    ///
    /// Safe to call from any producer context: never blocks on the
    /// consumer and never allocates. Returns `false` with no effect on the
    /// ring unless the channel is runtime-enabled or boot-armed.
    ///
    /// While boot-armed, the window closes once the write index has moved
    /// strictly past the capacity; that write and all later ones are
    /// rejected.
    pub fn store(&self, value: u32) -> bool {
        let boot = self.boot.load();
        if boot == BootMode::Completed
            || (boot == BootMode::Off && !self.enabled.load(Ordering::Acquire))
        {
            self.counters.rejected.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        let mut ring = self.ring.lock();

        // Another producer may have closed the boot window meanwhile.
        let mut boot_started = false;
        match self.boot.load() {
            BootMode::Completed => {
                drop(ring);
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                return false;
            }
            BootMode::Armed => {
                if ring.write_index() > ring.capacity() as u64 {
                    self.boot.store(BootMode::Completed);
                    drop(ring);
                    self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(channel = %self.name, "One time data collection test disabled");
                    return false;
                }
                if ring.write_index() == 0 {
                    boot_started = true;
                }
            }
            BootMode::Off => {
                if !self.enabled.load(Ordering::Acquire) {
                    drop(ring);
                    self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                    return false;
                }
            }
        }

        ring.write(value);
        drop(ring);

        self.counters.accepted.fetch_add(1, Ordering::Relaxed);
        if boot_started {
            tracing::info!(channel = %self.name, "One time data collection test enabled");
        }
        if self.sleepers.load(Ordering::SeqCst) > 0 {
            self.data_ready.notify_all();
        }
        true
    }

    /// Copies whole sample words into `out`, blocking while the ring is empty.
    ///
    /// Trailing bytes of `out` that do not form a full word are left
    /// untouched. Returns the number of bytes written:
    ///
    /// - the full word-aligned length once enough samples arrived,
    /// - fewer (possibly 0) if the boot window was just drained or the
    ///   boot collection has completed and nothing is left,
    /// - fewer if cancellation was observed after some words were copied.
    ///
    /// Returns [`TestingError::Interrupted`] if cancellation was observed
    /// before any word was copied.
    pub fn drain<C: Cancellation + ?Sized>(&self, out: &mut [u8], cancel: &C) -> Result<usize> {
        if self.boot.load() == BootMode::Off {
            self.enable();
        }

        let mut copied = 0;
        let mut cancelled = false;

        for word in out.chunks_exact_mut(WORD_SIZE) {
            let mut ring = self.ring.lock();
            match self.wait_for_data(&mut ring, cancel) {
                Wait::Ready => {}
                Wait::EndOfStream => break,
                Wait::Cancelled => {
                    cancelled = true;
                    break;
                }
            }

            let lost = ring.skip_overwritten();
            let value = ring.read();
            drop(ring);

            if lost > 0 {
                self.counters.overwritten.fetch_add(lost, Ordering::Relaxed);
                tracing::debug!(channel = %self.name, lost, "Skipped samples overwritten before read");
            }
            if let Some(value) = value {
                word.copy_from_slice(&value.to_ne_bytes());
                copied += WORD_SIZE;
                self.counters.drained_words.fetch_add(1, Ordering::Relaxed);
            }
        }

        self.finish_drain();

        tracing::debug!(
            channel = %self.name,
            bytes = copied,
            boot_mode = %self.boot.load(),
            cancelled,
            "Drain finished"
        );

        if cancelled && copied == 0 {
            return Err(TestingError::Interrupted);
        }
        Ok(copied)
    }

    /// Blocks until the ring holds unread data, the boot window closes, or
    /// the consumer is cancelled.
    fn wait_for_data<C: Cancellation + ?Sized>(
        &self,
        ring: &mut MutexGuard<'_, RingBuffer>,
        cancel: &C,
    ) -> Wait {
        loop {
            if ring.has_unread() {
                return Wait::Ready;
            }
            match self.boot.load() {
                BootMode::Armed => {
                    // Initial fill consumed; hand over to runtime collection.
                    self.boot.store(BootMode::Off);
                    return Wait::EndOfStream;
                }
                BootMode::Completed => return Wait::EndOfStream,
                BootMode::Off => {}
            }
            if cancel.is_cancelled() {
                return Wait::Cancelled;
            }
            self.sleepers.fetch_add(1, Ordering::SeqCst);
            self.data_ready.wait_for(ring, CANCEL_POLL_INTERVAL);
            self.sleepers.fetch_sub(1, Ordering::SeqCst);
        }
    }

    /// Disables collection if the consumer left nothing unread.
    fn finish_drain(&self) {
        let mut ring = self.ring.lock();
        if ring.has_unread() {
            return;
        }
        if self.boot.load() == BootMode::Armed {
            self.boot.store(BootMode::Off);
        }
        self.enabled.store(false, Ordering::Release);
        ring.reset();
        drop(ring);
        tracing::info!(channel = %self.name, "Disabling data collection");
    }

    /// Starts runtime collection.
    ///
    /// Resets the ring indices the first time it is called after the
    /// channel was disabled. Calling it on an enabled channel keeps any
    /// buffered samples.
    pub fn enable(&self) {
        let mut ring = self.ring.lock();
        if self.enabled.load(Ordering::Acquire) {
            return;
        }
        ring.reset();
        self.enabled.store(true, Ordering::Release);
        drop(ring);
        tracing::info!(channel = %self.name, "Enabling data collection");
    }

    /// Stops runtime collection and discards unread samples.
    pub fn disable(&self) {
        let mut ring = self.ring.lock();
        self.enabled.store(false, Ordering::Release);
        ring.reset();
        drop(ring);
        tracing::info!(channel = %self.name, "Disabling data collection");
    }

    /// Sets the boot flag from outside the engine.
    ///
    /// Only `Off` and `Armed` may be set, and only until the engine has
    /// moved the flag to `Completed`.
    pub fn set_boot_mode(&self, mode: BootMode) -> Result<()> {
        if mode == BootMode::Completed {
            return Err(TestingError::BootModeLocked);
        }
        let _ring = self.ring.lock();
        if self.boot.load() == BootMode::Completed {
            return Err(TestingError::BootModeLocked);
        }
        self.boot.store(mode);
        Ok(())
    }

    /// Current boot mode.
    pub fn boot_mode(&self) -> BootMode {
        self.boot.load()
    }

    /// Current runtime enable flag.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Current combined mode.
    pub fn mode(&self) -> ChannelMode {
        ChannelMode::from_flags(self.is_enabled(), self.boot_mode())
    }

    /// Channel name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ring capacity in samples.
    pub fn capacity(&self) -> usize {
        self.ring.lock().capacity()
    }

    /// Returns true if unread samples are buffered.
    pub fn has_unread(&self) -> bool {
        self.ring.lock().has_unread()
    }

    /// Takes a consistent snapshot of indices, flags and counters.
    pub fn stats(&self) -> ChannelStats {
        let ring = self.ring.lock();
        let (capacity, occupancy, write_index, read_index) = (
            ring.capacity(),
            ring.occupancy(),
            ring.write_index(),
            ring.read_index(),
        );
        let enabled = self.is_enabled();
        let boot_mode = self.boot.load();
        drop(ring);

        ChannelStats {
            name: self.name.clone(),
            mode: ChannelMode::from_flags(enabled, boot_mode),
            boot_mode,
            enabled,
            capacity,
            occupancy,
            write_index,
            read_index,
            accepted: self.counters.accepted.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
            overwritten: self.counters.overwritten.load(Ordering::Relaxed),
            drained_words: self.counters.drained_words.load(Ordering::Relaxed),
        }
    }
}
