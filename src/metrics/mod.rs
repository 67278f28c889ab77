//! Prometheus metrics exporter for the test channels.
//!
//! # Metrics Exposed
//!
//! All metrics carry a `channel` label (`raw_entropy`, `raw_array`,
//! `irq_perf`).
//!
//! ## Producer Metrics
//! - `entropy_testing_samples_accepted_total` - Samples stored in the ring
//! - `entropy_testing_samples_rejected_total` - Samples declined while collection was off
//!
//! ## Consumer Metrics
//! - `entropy_testing_samples_drained_total` - Samples delivered to readers
//! - `entropy_testing_samples_overwritten_total` - Samples lost to wraparound
//!
//! ## State Metrics
//! - `entropy_testing_ring_occupancy` - Unread samples in the ring
//! - `entropy_testing_collection_enabled` - Runtime enable flag (1=enabled)
//! - `entropy_testing_boot_mode` - Boot flag (0=off, 1=armed, 2=completed)
//!
//! # Example
//!
//! ```no_run
//! use entropy_testing::{metrics::MetricsRegistry, ChannelSet, TestingConfig};
//!
//! let channels = ChannelSet::new(&TestingConfig::default()).expect("valid config");
//! let registry = MetricsRegistry::new().expect("Failed to create registry");
//!
//! registry.update(&channels.stats());
//! println!("{}", registry.encode().expect("encodable"));
//! ```

mod collector;
#[cfg(feature = "metrics")]
mod server;

pub use collector::{MetricsError, MetricsRegistry};
#[cfg(feature = "metrics")]
pub use server::{MetricsServer, MetricsServerConfig, ServerError};
