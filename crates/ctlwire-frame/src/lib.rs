//! Tag-and-length wire framing for the ctlwire control protocol.
//!
//! Every control message starts with a 4-byte big-endian tag. Tags that
//! carry text are followed by a 4-byte big-endian length and that many raw
//! bytes. This crate owns the byte layout, the reusable receive buffer, and
//! the timeout-bounded read/write loops; the request/reply rules live one
//! layer up in `ctlwire-channel`.

pub mod buffer;
pub mod codec;
pub mod error;
pub mod framed;
pub mod tag;

pub use buffer::{ReceiveBuffer, GROWTH_SLACK, INITIAL_BUFFER_SIZE};
pub use codec::{
    buffered_frame_len, buffered_payload, decode_int, encode_buffered, encode_tag, encode_text,
    FrameConfig, DEFAULT_MAX_PAYLOAD, HEADER_SIZE, TAG_SIZE,
};
pub use error::{FrameError, Result};
pub use framed::FramedStream;
pub use tag::Tag;
