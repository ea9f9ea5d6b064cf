use std::fmt;
use std::io;

use ctlwire_channel::{ChannelError, ErrorKind};
use ctlwire_frame::FrameError;
use ctlwire_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const CONNECTION_ERROR: i32 = 3;
pub const PROTOCOL_ERROR: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

fn is_timeout(err: &io::Error) -> bool {
    matches!(err.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock)
}

pub fn channel_error(context: &str, err: ChannelError) -> CliError {
    let code = match &err {
        ChannelError::Connect(TransportError::Connect { source, .. }) if is_timeout(source) => {
            TIMEOUT
        }
        ChannelError::Frame(FrameError::Write(source)) if is_timeout(source) => TIMEOUT,
        _ => match err.kind() {
            ErrorKind::Connection => CONNECTION_ERROR,
            ErrorKind::Read | ErrorKind::Write => FAILURE,
            ErrorKind::Protocol => PROTOCOL_ERROR,
        },
    };
    CliError::new(code, format!("{context}: {err}"))
}
