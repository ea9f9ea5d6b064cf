use ctlwire_frame::{FrameError, Tag};

/// Coarse classification callers can act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The connection is gone or was never established.
    Connection,
    /// A read failed or a promised payload did not arrive.
    Read,
    /// A write failed or was short.
    Write,
    /// The peer broke the message protocol.
    Protocol,
}

/// Errors that can occur in channel operations.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// Transport-level error while connecting or accepting.
    #[error("connection failure: {0}")]
    Connect(#[from] ctlwire_transport::TransportError),

    /// The liveness probe could not be delivered; the connection is dead.
    #[error("connection failure: liveness probe failed: {0}")]
    Liveness(String),

    /// The channel has been torn down.
    #[error("channel is closed")]
    Closed,

    /// The peer closed its end; nothing more will arrive.
    #[error("connection failure: peer closed the connection")]
    PeerClosed,

    /// Frame-level error.
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// A text payload was expected but its length prefix never arrived.
    #[error("failed to read text, length not available")]
    MissingLength,

    /// A send that requires an acknowledgement got something else.
    #[error("{tag} was not acknowledged (reply: {})", reply_name(.reply))]
    NotAcknowledged { tag: Tag, reply: Option<Tag> },

    /// The peer sent more back-to-back `NULL` tags than allowed.
    #[error("received more than {0} consecutive NULL messages")]
    NullFlood(usize),

    /// Text was offered for a tag that does not carry any.
    #[error("{0} does not carry a text payload")]
    UnexpectedPayload(Tag),
}

impl ChannelError {
    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ChannelError::Connect(_)
            | ChannelError::Liveness(_)
            | ChannelError::Closed
            | ChannelError::PeerClosed => ErrorKind::Connection,
            ChannelError::Frame(err) => match err {
                FrameError::Read(_) | FrameError::ShortRead { .. } => ErrorKind::Read,
                FrameError::Write(_) | FrameError::ShortWrite { .. } => ErrorKind::Write,
                FrameError::InvalidLength(_)
                | FrameError::PayloadTooLarge { .. }
                | FrameError::UnknownTag(_)
                | FrameError::InvalidText(_) => ErrorKind::Protocol,
            },
            ChannelError::MissingLength
            | ChannelError::NotAcknowledged { .. }
            | ChannelError::NullFlood(_)
            | ChannelError::UnexpectedPayload(_) => ErrorKind::Protocol,
        }
    }
}

fn reply_name(reply: &Option<Tag>) -> &'static str {
    reply.map(Tag::name).unwrap_or("none")
}

pub type Result<T> = std::result::Result<T, ChannelError>;
