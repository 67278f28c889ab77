//! Producer/consumer test channels.
//!
//! A [`TestChannel`] moves raw 32-bit samples from a producer that must
//! never block to a single blocking consumer. Samples are buffered in a
//! fixed [`RingBuffer`]; when the consumer falls behind, the oldest unread
//! samples are overwritten.

mod cancel;
mod engine;
mod ring;
mod state;

pub use cancel::{CancelFlag, Cancellation, NeverCancelled};
pub use engine::{ChannelStats, TestChannel};
pub use ring::{RingBuffer, DEFAULT_CAPACITY, WORD_SIZE};
pub use state::{BootMode, ChannelMode};
