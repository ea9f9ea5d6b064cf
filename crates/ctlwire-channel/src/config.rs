use std::time::Duration;

use ctlwire_frame::DEFAULT_MAX_PAYLOAD;

/// Minimum spacing between two liveness probes.
pub const LIVENESS_INTERVAL: Duration = Duration::from_secs(60);

/// How long `EXITING`, `PING` and `EXIT` wait for their `ACK`.
pub const REPLY_WAIT: Duration = Duration::from_secs(60);

/// How long a text-carrying send waits for its `ACK`.
pub const BUFFERED_REPLY_WAIT: Duration = Duration::from_secs(180);

/// Default write timeout for sends the channel issues on its own.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(60);

/// Default cap on back-to-back `NULL` tags skipped by one read.
pub const DEFAULT_MAX_CONSECUTIVE_NULLS: usize = 1024;

/// Channel behavior configuration.
///
/// The protocol timing above is fixed; these knobs only cover what the
/// protocol leaves to the implementation.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Write timeout for probes, acknowledgements, teardown notices and
    /// text-carrying sends.
    pub send_timeout: Duration,
    /// Consecutive `NULL` tags tolerated before a read gives up.
    pub max_consecutive_nulls: usize,
    /// Largest accepted text payload in bytes.
    pub max_payload_size: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            send_timeout: DEFAULT_SEND_TIMEOUT,
            max_consecutive_nulls: DEFAULT_MAX_CONSECUTIVE_NULLS,
            max_payload_size: DEFAULT_MAX_PAYLOAD,
        }
    }
}
