//! The three side-by-side channel instances and their producer entry points.
//!
//! A [`ChannelSet`] is built once at startup and handed to whichever
//! components feed or read the channels.

use crate::channel::{BootMode, ChannelStats, TestChannel};
use crate::config::TestingConfig;
use crate::error::Result;
use crate::extraction::ChannelFile;
use std::sync::Arc;
use std::time::Instant;

/// Name of the directory the channel files are grouped under.
pub const ROOT_DIR: &str = "entropy_testing";

/// Identifies one of the channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    /// Raw noise source samples.
    RawEntropy,
    /// Raw structured-array samples.
    RawArray,
    /// Interrupt handling time in cycles.
    IrqPerf,
}

impl ChannelKind {
    /// All channels in a fixed order.
    pub const ALL: [Self; 3] = [Self::RawEntropy, Self::RawArray, Self::IrqPerf];

    /// Channel and file name.
    pub fn name(self) -> &'static str {
        match self {
            Self::RawEntropy => "raw_entropy",
            Self::RawArray => "raw_array",
            Self::IrqPerf => "irq_perf",
        }
    }
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Free-running cycle counter used to time interrupt handling.
pub trait CycleCounter: Send + Sync {
    /// Current counter value. Wraps freely.
    fn cycles(&self) -> u32;
}

/// Cycle counter backed by the monotonic clock, in nanoseconds.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicCounter {
    origin: Instant,
}

impl MonotonicCounter {
    /// Starts counting from now.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl CycleCounter for MonotonicCounter {
    fn cycles(&self) -> u32 {
        // Truncation is the wrap.
        self.origin.elapsed().as_nanos() as u32
    }
}

/// The raw entropy, raw array and interrupt timing channels.
pub struct ChannelSet {
    raw_entropy: Arc<TestChannel>,
    raw_array: Arc<TestChannel>,
    irq_perf: Arc<TestChannel>,
    counter: Box<dyn CycleCounter>,
}

impl ChannelSet {
    /// Builds all channels from a validated configuration.
    pub fn new(config: &TestingConfig) -> Result<Self> {
        Self::with_counter(config, Box::new(MonotonicCounter::new()))
    }

    /// Builds all channels with a custom cycle counter.
    pub fn with_counter(config: &TestingConfig, counter: Box<dyn CycleCounter>) -> Result<Self> {
        config.validate()?;
        let capacity = config.channels.capacity;
        let build = |kind: ChannelKind, boot: BootMode| -> Result<Arc<TestChannel>> {
            Ok(Arc::new(TestChannel::new(kind.name(), capacity, boot)?))
        };

        let set = Self {
            raw_entropy: build(ChannelKind::RawEntropy, config.boot.raw_entropy_mode()?)?,
            raw_array: build(ChannelKind::RawArray, config.boot.raw_array_mode()?)?,
            irq_perf: build(ChannelKind::IrqPerf, config.boot.irq_perf_mode()?)?,
            counter,
        };

        tracing::info!(
            capacity,
            raw_entropy = %set.raw_entropy.boot_mode(),
            raw_array = %set.raw_array.boot_mode(),
            irq_perf = %set.irq_perf.boot_mode(),
            "Test channels initialized"
        );
        Ok(set)
    }

    /// Records a raw noise sample.
    pub fn store_raw(&self, value: u32) -> bool {
        self.raw_entropy.store(value)
    }

    /// Records a raw structured-array sample.
    pub fn store_raw_array(&self, value: u32) -> bool {
        self.raw_array.store(value)
    }

    /// Records the cycles elapsed since `start_cycle`.
    pub fn store_irq_timing(&self, start_cycle: u32) -> bool {
        let elapsed = self.counter.cycles().wrapping_sub(start_cycle);
        self.irq_perf.store(elapsed)
    }

    /// Reads the cycle counter, for timestamping the start of a handler.
    pub fn cycles(&self) -> u32 {
        self.counter.cycles()
    }

    /// Returns the channel for `kind`.
    pub fn channel(&self, kind: ChannelKind) -> &Arc<TestChannel> {
        match kind {
            ChannelKind::RawEntropy => &self.raw_entropy,
            ChannelKind::RawArray => &self.raw_array,
            ChannelKind::IrqPerf => &self.irq_perf,
        }
    }

    /// Opens the read surface of a channel.
    pub fn open(&self, kind: ChannelKind) -> ChannelFile {
        ChannelFile::open(Arc::clone(self.channel(kind)))
    }

    /// Current boot parameter value of a channel (0, 1 or 2).
    pub fn boot_param(&self, kind: ChannelKind) -> u8 {
        self.channel(kind).boot_mode().as_u8()
    }

    /// Writes a boot parameter (0 or 1) at runtime.
    pub fn set_boot_param(&self, kind: ChannelKind, value: u8) -> Result<()> {
        let mode = BootMode::try_from(value)?;
        self.channel(kind).set_boot_mode(mode)
    }

    /// Snapshots every channel.
    pub fn stats(&self) -> Vec<ChannelStats> {
        ChannelKind::ALL
            .iter()
            .map(|&kind| self.channel(kind).stats())
            .collect()
    }
}

impl std::fmt::Debug for ChannelSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelSet")
            .field("raw_entropy", &self.raw_entropy)
            .field("raw_array", &self.raw_array)
            .field("irq_perf", &self.irq_perf)
            .finish_non_exhaustive()
    }
}
