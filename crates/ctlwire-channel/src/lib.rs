//! Point-to-point control channel between a test driver and a worker.
//!
//! A [`MessageChannel`] owns one stream connection and enforces the reply
//! rules of every control message: which tags are fire-and-forget, which
//! block for an `ACK`, which carry text, and when the receiver must answer.
//! It also sends rate-limited liveness probes so a dead connection is
//! noticed before the next blocking read.
//!
//! The channel is strictly synchronous and not meant to be shared between
//! threads; every operation takes `&mut self`.

pub mod channel;
pub mod clock;
pub mod config;
pub mod error;
pub mod listener;
pub mod message;

pub use channel::MessageChannel;
pub use clock::{Clock, SystemClock};
pub use config::{
    ChannelConfig, BUFFERED_REPLY_WAIT, DEFAULT_MAX_CONSECUTIVE_NULLS, DEFAULT_SEND_TIMEOUT,
    LIVENESS_INTERVAL, REPLY_WAIT,
};
pub use ctlwire_frame::Tag;
pub use error::{ChannelError, ErrorKind, Result};
pub use listener::ChannelListener;
pub use message::Message;
