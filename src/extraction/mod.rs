//! Byte-stream extraction on top of the word-granular drain loop.
//!
//! Turns repeated [`TestChannel::drain`](crate::channel::TestChannel::drain)
//! calls into an arbitrary-length read for an external consumer, moving
//! data through a staging buffer that is zeroed before release.

mod extract;
mod file;
mod staging;

pub use extract::{extract, LARGE_REQUEST_THRESHOLD};
pub use file::{ChannelFile, FILE_MODE};
pub use staging::StagingBuffer;
