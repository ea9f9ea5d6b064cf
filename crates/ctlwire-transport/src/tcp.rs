use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::stream::ControlStream;

/// Smallest timeout handed to the OS; a zero duration is rejected by std.
const MIN_TIMEOUT: Duration = Duration::from_millis(1);

/// Connect to a listening driver with a bounded wait.
///
/// `addr` is anything `ToSocketAddrs` accepts as a string (`host:port`).
/// Each resolved address is tried in turn with whatever remains of
/// `timeout`; the whole call never takes longer than `timeout` plus
/// resolution time. Refusal, timeout, and unreachable hosts all surface as
/// [`TransportError::Connect`].
pub fn connect(addr: &str, timeout: Duration) -> Result<ControlStream> {
    let candidates: Vec<SocketAddr> = addr
        .to_socket_addrs()
        .map_err(|source| TransportError::Resolve {
            addr: addr.to_string(),
            source,
        })?
        .collect();

    if candidates.is_empty() {
        return Err(TransportError::Resolve {
            addr: addr.to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, "no addresses resolved"),
        });
    }

    let deadline = Instant::now() + timeout;
    let mut last_err = None;
    for candidate in candidates {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() && last_err.is_some() {
            break;
        }
        match TcpStream::connect_timeout(&candidate, remaining.max(MIN_TIMEOUT)) {
            Ok(stream) => {
                debug!(%candidate, "connected");
                let stream = ControlStream::from(stream);
                stream.set_nodelay(true)?;
                return Ok(stream);
            }
            Err(err) => {
                debug!(%candidate, error = %err, "connect attempt failed");
                last_err = Some(err);
            }
        }
    }

    Err(TransportError::Connect {
        addr: addr.to_string(),
        source: last_err
            .unwrap_or_else(|| io::Error::new(io::ErrorKind::TimedOut, "connect timed out")),
    })
}

/// TCP listener for the driver side of a control connection.
pub struct ControlListener {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl ControlListener {
    /// Bind and listen on `addr` (`host:port`; port 0 picks a free port).
    pub fn bind(addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr).map_err(|source| TransportError::Bind {
            addr: addr.to_string(),
            source,
        })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| TransportError::Bind {
                addr: addr.to_string(),
                source,
            })?;

        info!(%local_addr, "listening for control connections");

        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Accept an incoming connection (blocking).
    pub fn accept(&self) -> Result<ControlStream> {
        let (stream, peer) = self.listener.accept().map_err(TransportError::Accept)?;
        debug!(%peer, "accepted connection");
        let stream = ControlStream::from(stream);
        stream.set_nodelay(true)?;
        Ok(stream)
    }

    /// The address this listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}
