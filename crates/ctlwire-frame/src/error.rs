/// Errors that can occur while moving frames over a stream.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// A read failed for a reason other than the timeout expiring.
    #[error("read failure: {0}")]
    Read(#[source] std::io::Error),

    /// A write failed (including a write timeout).
    #[error("send failure: {0}")]
    Write(#[source] std::io::Error),

    /// A promised payload did not fully arrive.
    #[error("failed to read payload: expected {expected} bytes, got {got}")]
    ShortRead { expected: usize, got: usize },

    /// The stream accepted fewer bytes than the frame holds.
    #[error("tried to write {expected} bytes, only wrote {wrote}")]
    ShortWrite { expected: usize, wrote: usize },

    /// A length prefix was negative.
    #[error("invalid payload length {0}")]
    InvalidLength(i32),

    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The value read where a tag was expected is not a known tag.
    #[error("unknown message tag {0:#x}")]
    UnknownTag(i32),

    /// The payload bytes are not UTF-8.
    #[error("payload is not valid UTF-8: {0}")]
    InvalidText(#[from] std::str::Utf8Error),
}

pub type Result<T> = std::result::Result<T, FrameError>;
