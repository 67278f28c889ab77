//! Noise source abstraction.
//!
//! This module provides a trait-based abstraction over raw noise
//! hardware, allowing for both real sources and mock implementations for
//! testing.

use rand_chacha::ChaCha20Rng;
use rand_core::{OsRng, RngCore, SeedableRng};
use thiserror::Error;

/// Errors that can occur while sampling a noise source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("noise source exhausted")]
    Exhausted,
    #[error("failed to read noise source: {0}")]
    ReadFailed(String),
}

/// Trait for noise source implementations.
pub trait NoiseSource: Send {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Reads one raw sample.
    fn sample(&mut self) -> Result<u32, SourceError>;
}

/// Mock noise source producing ChaCha20 output.
///
/// NOT a physical noise source: it only exercises the collection path.
pub struct MockNoiseSource {
    rng: ChaCha20Rng,
    sequence: u64,
    limit: Option<u64>,
}

impl MockNoiseSource {
    /// Creates a source seeded from the OS.
    pub fn new() -> Self {
        let mut seed = [0u8; 32];
        OsRng.fill_bytes(&mut seed);
        Self::from_rng(ChaCha20Rng::from_seed(seed))
    }

    /// Creates a reproducible source.
    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(ChaCha20Rng::seed_from_u64(seed))
    }

    fn from_rng(rng: ChaCha20Rng) -> Self {
        Self {
            rng,
            sequence: 0,
            limit: None,
        }
    }

    /// Stops producing samples after `limit` have been read.
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Samples produced so far.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

impl Default for MockNoiseSource {
    fn default() -> Self {
        Self::new()
    }
}

impl NoiseSource for MockNoiseSource {
    fn name(&self) -> &str {
        "mock"
    }

    fn sample(&mut self) -> Result<u32, SourceError> {
        if self.limit.is_some_and(|limit| self.sequence >= limit) {
            return Err(SourceError::Exhausted);
        }
        self.sequence += 1;
        Ok(self.rng.next_u32())
    }
}

impl std::fmt::Debug for MockNoiseSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockNoiseSource")
            .field("sequence", &self.sequence)
            .field("limit", &self.limit)
            .finish()
    }
}
