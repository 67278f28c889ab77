//! Entropy Testing Channels
//!
//! Collects raw samples from noise sources for offline statistical
//! testing (for example SP800-90B entropy assessment) without disturbing
//! the producer's timing.
//!
//! # Architecture
//!
//! Three independent channels (raw entropy, raw array samples, interrupt
//! timing) share one engine:
//!
//! ```text
//! noise source ──store──▶ RingBuffer ──drain──▶ staging ──extract──▶ reader
//!  (never blocks)          (per channel)        (zeroed)
//! ```
//!
//! # Collection Modes
//!
//! - **Runtime**: collection starts when a reader begins reading and stops
//!   once the reader has drained everything.
//! - **Boot**: an armed channel collects from the first sample until its
//!   ring has been filled once, then rejects all further samples.
//!
//! # Example
//!
//! ```no_run
//! use entropy_testing::{ChannelKind, ChannelSet, NeverCancelled, TestingConfig};
//!
//! let mut config = TestingConfig::default();
//! config.boot.raw_entropy = 1;
//! let channels = ChannelSet::new(&config).unwrap();
//!
//! // Producer side, e.g. from an interrupt handler
//! channels.store_raw(0x1234_5678);
//!
//! // Consumer side
//! let mut file = channels.open(ChannelKind::RawEntropy);
//! let mut buf = [0u8; 4096];
//! let n = file.read(&mut buf, &NeverCancelled).unwrap();
//! println!("collected {} bytes", n);
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod channel;
pub mod config;
pub mod error;
pub mod extraction;
pub mod interface;
pub mod metrics;
pub mod source;

// Re-export commonly used types at crate root
pub use channel::{BootMode, CancelFlag, Cancellation, NeverCancelled, TestChannel};
pub use config::TestingConfig;
pub use error::TestingError;
pub use extraction::{extract, ChannelFile};
pub use interface::{ChannelKind, ChannelSet};
pub use source::{MockNoiseSource, NoiseFeeder, NoiseSource};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
