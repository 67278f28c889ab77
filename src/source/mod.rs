//! Noise sources feeding the test channels.
//!
//! The channels only see individual 32-bit samples. A [`NoiseSource`]
//! produces them, and a [`NoiseFeeder`] plays the part of the interrupt
//! handler that pushes them into a [`ChannelSet`](crate::ChannelSet).

mod feeder;
mod mock;

pub use feeder::{FeedStats, NoiseFeeder};
pub use mock::{MockNoiseSource, NoiseSource, SourceError};
