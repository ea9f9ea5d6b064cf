//! Control channel between a test driver and its workers.
//!
//! A driver listens, a worker connects, and the two exchange small tagged
//! control messages over one TCP connection: run requests, completion
//! reports, pings, and shutdown notices. Every message type has a fixed
//! reply rule, and each side probes the connection before blocking on a
//! read so a vanished peer is noticed.
//!
//! # Crate Structure
//!
//! - [`transport`]: TCP connect/listen with SIGPIPE-safe streams
//! - [`frame`]: tag values, wire layouts, and timed frame I/O
//! - [`channel`]: the message channel itself (behind the `channel` feature)

/// Re-export transport types.
pub mod transport {
    pub use ctlwire_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use ctlwire_frame::*;
}

/// Re-export channel types (requires `channel` feature).
#[cfg(feature = "channel")]
pub mod channel {
    pub use ctlwire_channel::*;
}
