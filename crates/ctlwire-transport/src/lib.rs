//! Stream socket transport for the ctlwire control protocol.
//!
//! This is the lowest layer of ctlwire: a timed connect primitive, a
//! listener for the driver side, and the [`ControlStream`] type every other
//! layer reads from and writes to. Writes on a [`ControlStream`] never raise
//! `SIGPIPE`; a peer that went away shows up as an ordinary I/O error.

pub mod error;
pub mod stream;
pub mod tcp;

pub use error::{Result, TransportError};
pub use stream::{ControlStream, TimedStream};
pub use tcp::{connect, ControlListener};
