//! Force sensor input.
//!
//! - [`frame`] - 11-byte frame layout, decode and encode
//! - [`channel`] - [`ForceChannel`]: frame sync, init and shutdown commands
//! - [`poller`] - [`ForcePoller`]: background thread feeding the event bus

pub mod channel;
pub mod frame;
pub mod poller;

pub use channel::ForceChannel;
pub use frame::{RawSample, decode_frame, encode_frame};
pub use poller::ForcePoller;
