use bytes::{BufMut, BytesMut};

use crate::error::{FrameError, Result};
use crate::tag::Tag;

/// A bare control message: one big-endian `i32`.
pub const TAG_SIZE: usize = 4;

/// Tag plus length prefix: the header of every text-carrying frame.
pub const HEADER_SIZE: usize = 8;

/// Default maximum payload size: 16 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// Encode a tag as it appears on the wire.
pub fn encode_tag(tag: Tag) -> [u8; TAG_SIZE] {
    tag.as_i32().to_be_bytes()
}

/// Decode one big-endian `i32` (a tag value or a length prefix).
pub fn decode_int(bytes: [u8; TAG_SIZE]) -> i32 {
    i32::from_be_bytes(bytes)
}

/// Total wire size of a buffered-send frame for `text`.
pub fn buffered_frame_len(text: &str) -> usize {
    HEADER_SIZE + text.len()
}

/// The part of `text` a buffered-send frame actually carries: everything but
/// the last eight bytes.
pub fn buffered_payload(text: &str) -> &[u8] {
    let kept = text.len().saturating_sub(HEADER_SIZE);
    &text.as_bytes()[..kept]
}

/// Encode a buffered-send frame into `dst`, which must be zero-filled.
///
/// Wire format:
/// ```text
/// ┌──────────┬──────────┬───────────────────────────────┬──────────────┐
/// │ Tag      │ Length L │ text[..L-8]                   │ 8 zero bytes │
/// │ (4B BE)  │ (4B BE)  │                               │              │
/// └──────────┴──────────┴───────────────────────────────┴──────────────┘
/// ```
///
/// `L` is the text's byte length and exactly `L` bytes follow the header,
/// but only the first `L - 8` are text; the tail is zero padding. Peers
/// depend on this layout, so the last eight text bytes never reach the
/// wire. Texts shorter than eight bytes are sent as `L` zero bytes.
///
/// # Panics
///
/// Panics if `dst` is shorter than [`buffered_frame_len`].
pub fn encode_buffered(tag: Tag, text: &str, dst: &mut [u8]) -> Result<usize> {
    let len = checked_len(text.len())?;
    let total = buffered_frame_len(text);
    let frame = &mut dst[..total];

    frame[..4].copy_from_slice(&encode_tag(tag));
    frame[4..HEADER_SIZE].copy_from_slice(&len.to_be_bytes());
    let payload = buffered_payload(text);
    frame[HEADER_SIZE..HEADER_SIZE + payload.len()].copy_from_slice(payload);

    Ok(total)
}

/// Encode a text-carrying frame with the full text: `[tag][L][L bytes]`.
///
/// This is the layout a text receiver decodes byte for byte.
pub fn encode_text(tag: Tag, text: &str, dst: &mut BytesMut) -> Result<()> {
    let len = checked_len(text.len())?;
    dst.reserve(HEADER_SIZE + text.len());
    dst.put_i32(tag.as_i32());
    dst.put_i32(len);
    dst.put_slice(text.as_bytes());
    Ok(())
}

fn checked_len(len: usize) -> Result<i32> {
    i32::try_from(len).map_err(|_| FrameError::PayloadTooLarge {
        size: len,
        max: i32::MAX as usize,
    })
}

/// Configuration for frame decoding.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum accepted length prefix in bytes. Default: 16 MiB.
    pub max_payload_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
        }
    }
}
