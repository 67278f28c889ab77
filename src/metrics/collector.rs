//! Metrics collection and registry.

use crate::channel::ChannelStats;
use parking_lot::Mutex;
use prometheus::{Encoder, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};
use thiserror::Error;

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

const CHANNEL_LABEL: &[&str] = &["channel"];

/// Prometheus metrics registry for channel monitoring.
pub struct MetricsRegistry {
    registry: Registry,

    // Producer metrics
    accepted: IntCounterVec,
    rejected: IntCounterVec,

    // Consumer metrics
    drained: IntCounterVec,
    overwritten: IntCounterVec,

    // State metrics
    occupancy: IntGaugeVec,
    enabled: IntGaugeVec,
    boot_mode: IntGaugeVec,

    /// Serializes counter catch-up so concurrent scrapes add each delta once.
    update_lock: Mutex<()>,
}

impl MetricsRegistry {
    /// Creates a new metrics registry with all channel metrics registered.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let accepted = IntCounterVec::new(
            Opts::new(
                "entropy_testing_samples_accepted_total",
                "Samples stored in the ring by the producer",
            ),
            CHANNEL_LABEL,
        )?;
        let rejected = IntCounterVec::new(
            Opts::new(
                "entropy_testing_samples_rejected_total",
                "Samples declined because collection was not active",
            ),
            CHANNEL_LABEL,
        )?;
        let drained = IntCounterVec::new(
            Opts::new(
                "entropy_testing_samples_drained_total",
                "Samples delivered to readers",
            ),
            CHANNEL_LABEL,
        )?;
        let overwritten = IntCounterVec::new(
            Opts::new(
                "entropy_testing_samples_overwritten_total",
                "Samples lost to ring wraparound before being read",
            ),
            CHANNEL_LABEL,
        )?;
        let occupancy = IntGaugeVec::new(
            Opts::new("entropy_testing_ring_occupancy", "Unread samples in the ring"),
            CHANNEL_LABEL,
        )?;
        let enabled = IntGaugeVec::new(
            Opts::new(
                "entropy_testing_collection_enabled",
                "Runtime collection flag (1=enabled, 0=disabled)",
            ),
            CHANNEL_LABEL,
        )?;
        let boot_mode = IntGaugeVec::new(
            Opts::new(
                "entropy_testing_boot_mode",
                "Boot collection flag (0=off, 1=armed, 2=completed)",
            ),
            CHANNEL_LABEL,
        )?;

        registry.register(Box::new(accepted.clone()))?;
        registry.register(Box::new(rejected.clone()))?;
        registry.register(Box::new(drained.clone()))?;
        registry.register(Box::new(overwritten.clone()))?;
        registry.register(Box::new(occupancy.clone()))?;
        registry.register(Box::new(enabled.clone()))?;
        registry.register(Box::new(boot_mode.clone()))?;

        Ok(Self {
            registry,
            accepted,
            rejected,
            drained,
            overwritten,
            occupancy,
            enabled,
            boot_mode,
            update_lock: Mutex::new(()),
        })
    }

    /// Updates all metrics from channel snapshots.
    pub fn update(&self, channels: &[ChannelStats]) {
        let _guard = self.update_lock.lock();
        for stats in channels {
            let label = [stats.name.as_str()];

            // Counters only move forward, so increment by the difference
            advance(&self.accepted, &label, stats.accepted);
            advance(&self.rejected, &label, stats.rejected);
            advance(&self.drained, &label, stats.drained_words);
            advance(&self.overwritten, &label, stats.overwritten);

            self.occupancy
                .with_label_values(&label)
                .set(stats.occupancy.min(i64::MAX as u64) as i64);
            self.enabled
                .with_label_values(&label)
                .set(i64::from(stats.enabled));
            self.boot_mode
                .with_label_values(&label)
                .set(i64::from(stats.boot_mode.as_u8()));
        }
    }

    /// Returns the underlying Prometheus registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

fn advance(counter: &IntCounterVec, label: &[&str], total: u64) {
    let counter = counter.with_label_values(label);
    let current = counter.get();
    if total > current {
        counter.inc_by(total - current);
    }
}
