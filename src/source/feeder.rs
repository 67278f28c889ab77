//! Background producer thread.

use super::NoiseSource;
use crate::interface::ChannelSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Counts gathered by a feeder over its lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedStats {
    /// Samples read from the source.
    pub samples: u64,
    /// Samples accepted by the raw entropy channel.
    pub raw_accepted: u64,
    /// Samples accepted by the raw array channel.
    pub array_accepted: u64,
    /// Timings accepted by the interrupt performance channel.
    pub timing_accepted: u64,
}

/// Pushes samples from a [`NoiseSource`] into all channels at a fixed pace.
///
/// Each event stores one raw sample, one array sample and the time spent
/// handling the event. The feeder stops when the source is exhausted or
/// when [`stop`](Self::stop) is called.
#[derive(Debug)]
pub struct NoiseFeeder {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<FeedStats>>,
}

impl NoiseFeeder {
    /// Starts the feeder thread.
    pub fn spawn<S>(mut source: S, channels: Arc<ChannelSet>, interval: Duration) -> std::io::Result<Self>
    where
        S: NoiseSource + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);

        let handle = thread::Builder::new()
            .name("noise-feeder".into())
            .spawn(move || {
                let mut stats = FeedStats::default();
                tracing::info!(source = source.name(), ?interval, "Noise feeder started");

                while !stop_flag.load(Ordering::Acquire) {
                    let start = channels.cycles();
                    let (raw, array) = match (source.sample(), source.sample()) {
                        (Ok(raw), Ok(array)) => (raw, array),
                        (Err(e), _) | (_, Err(e)) => {
                            tracing::info!(error = %e, "Noise source stopped");
                            break;
                        }
                    };
                    stats.samples += 2;
                    stats.raw_accepted += u64::from(channels.store_raw(raw));
                    stats.array_accepted += u64::from(channels.store_raw_array(array));
                    stats.timing_accepted += u64::from(channels.store_irq_timing(start));

                    if !interval.is_zero() {
                        thread::sleep(interval);
                    }
                }

                tracing::info!(samples = stats.samples, "Noise feeder finished");
                stats
            })?;

        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    /// Signals the thread to stop and waits for it.
    pub fn stop(mut self) -> FeedStats {
        self.shutdown()
    }

    fn shutdown(&mut self) -> FeedStats {
        self.stop.store(true, Ordering::Release);
        match self.handle.take().map(JoinHandle::join) {
            Some(Ok(stats)) => stats,
            Some(Err(_)) => {
                tracing::warn!("Noise feeder thread panicked");
                FeedStats::default()
            }
            None => FeedStats::default(),
        }
    }
}

impl Drop for NoiseFeeder {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::NeverCancelled;
    use crate::config::TestingConfig;
    use crate::interface::ChannelKind;
    use crate::source::MockNoiseSource;

    #[test]
    fn test_feeder_fills_boot_armed_channel() {
        let mut config = TestingConfig::default();
        config.channels.capacity = 8;
        config.boot.raw_entropy = 1;
        let channels = Arc::new(ChannelSet::new(&config).unwrap());

        // 12 events, 24 samples; boot window admits capacity + 1 raw samples
        let source = MockNoiseSource::with_seed(3).with_limit(24);
        let feeder = NoiseFeeder::spawn(source, Arc::clone(&channels), Duration::ZERO).unwrap();

        while !feeder.handle.as_ref().is_some_and(|h| h.is_finished()) {
            thread::yield_now();
        }
        let stats = feeder.stop();

        assert_eq!(stats.samples, 24);
        assert_eq!(stats.raw_accepted, 9);
        assert_eq!(stats.array_accepted, 0);

        let mut expected = MockNoiseSource::with_seed(3);
        let raw: Vec<u32> = (0..12)
            .map(|_| {
                let raw = expected.sample().unwrap();
                let _array = expected.sample().unwrap();
                raw
            })
            .collect();

        let mut file = channels.open(ChannelKind::RawEntropy);
        let mut buf = [0u8; 64];
        let n = file.read(&mut buf, &NeverCancelled).unwrap();
        assert_eq!(n, 32);
        let drained: Vec<u32> = buf[..n]
            .chunks_exact(4)
            .map(|w| u32::from_ne_bytes([w[0], w[1], w[2], w[3]]))
            .collect();
        // The first raw sample was overwritten by the ninth
        assert_eq!(drained, raw[1..9].to_vec());
    }
}
