//! Error types shared by the channel engine and the extraction layer.
//!
//! A producer write that is declined is not an error; [`TestChannel::store`]
//! reports it through its `bool` return value.
//!
//! [`TestChannel::store`]: crate::channel::TestChannel::store

use crate::config::ConfigError;
use thiserror::Error;

/// Errors that can occur while collecting or extracting test data.
///
/// Every variant is local to the call that produced it. The channel's
/// ring buffer and indices stay consistent regardless of where a consumer
/// call aborts.
#[derive(Debug, Error)]
pub enum TestingError {
    /// Cancellation was observed before any data was transferred.
    ///
    /// Callers should treat this as a request to restart the read.
    #[error("interrupted before any data was transferred")]
    Interrupted,

    /// The staging buffer for an extraction could not be allocated.
    #[error("failed to allocate {requested} byte staging buffer")]
    ResourceExhausted {
        /// Requested staging size in bytes.
        requested: usize,
    },

    /// Delivering bytes to the consumer's buffer failed.
    #[error("failed to copy data to consumer: {0}")]
    FaultOnCopy(#[from] std::io::Error),

    /// A boot mode value outside `{0, 1, 2}`.
    #[error("invalid boot mode value {0} (expected 0, 1 or 2)")]
    InvalidBootMode(u8),

    /// The boot mode may not be changed to or from `Completed` externally.
    #[error("boot mode is managed by the channel once collection completes")]
    BootModeLocked,

    /// Ring capacity must be a non-zero power of two.
    #[error("invalid ring capacity {0} (must be a non-zero power of two)")]
    InvalidCapacity(usize),

    /// Invalid startup configuration.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, TestingError>;
