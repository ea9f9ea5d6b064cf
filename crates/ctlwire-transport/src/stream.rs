use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::time::Duration;

/// A byte stream whose blocking reads and writes can be bounded by a timeout.
///
/// Everything above the transport layer is generic over this trait, so the
/// protocol runs unchanged over TCP, Unix stream sockets, or an in-memory
/// fake in tests.
pub trait TimedStream: Read + Write {
    /// Bound subsequent blocking reads. `None` blocks indefinitely.
    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()>;

    /// Bound subsequent blocking writes. `None` blocks indefinitely.
    fn set_write_timeout(&self, timeout: Option<Duration>) -> io::Result<()>;

    /// Shut down both directions of the stream.
    fn shutdown(&self) -> io::Result<()>;

    /// Human-readable peer identity for diagnostics.
    fn peer_label(&self) -> String {
        "unknown".to_string()
    }
}

/// A connected control stream.
///
/// Wraps either a TCP stream (the usual driver/worker link) or a Unix
/// stream socket. On Linux every write goes through `send(2)` with
/// `MSG_NOSIGNAL`; on Apple platforms the socket is marked `SO_NOSIGPIPE`
/// when the stream is created. Process signal disposition is never touched.
pub struct ControlStream {
    inner: ControlStreamInner,
}

enum ControlStreamInner {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
}

impl From<TcpStream> for ControlStream {
    fn from(stream: TcpStream) -> Self {
        let stream = Self {
            inner: ControlStreamInner::Tcp(stream),
        };
        stream.suppress_sigpipe();
        stream
    }
}

#[cfg(unix)]
impl From<std::os::unix::net::UnixStream> for ControlStream {
    fn from(stream: std::os::unix::net::UnixStream) -> Self {
        let stream = Self {
            inner: ControlStreamInner::Unix(stream),
        };
        stream.suppress_sigpipe();
        stream
    }
}

impl Read for ControlStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.inner {
            ControlStreamInner::Tcp(stream) => stream.read(buf),
            #[cfg(unix)]
            ControlStreamInner::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for ControlStream {
    #[cfg(any(target_os = "linux", target_os = "android"))]
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        use std::os::fd::AsRawFd;

        let fd = match &self.inner {
            ControlStreamInner::Tcp(stream) => stream.as_raw_fd(),
            ControlStreamInner::Unix(stream) => stream.as_raw_fd(),
        };

        // SAFETY: `buf` is a valid readable slice of `buf.len()` bytes and `fd`
        // is an open socket descriptor owned by this stream for its lifetime.
        let rc = unsafe {
            libc::send(
                fd,
                buf.as_ptr().cast::<libc::c_void>(),
                buf.len(),
                libc::MSG_NOSIGNAL,
            )
        };
        if rc < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(rc as usize)
        }
    }

    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.inner {
            ControlStreamInner::Tcp(stream) => stream.write(buf),
            #[cfg(unix)]
            ControlStreamInner::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.inner {
            ControlStreamInner::Tcp(stream) => stream.flush(),
            #[cfg(unix)]
            ControlStreamInner::Unix(stream) => stream.flush(),
        }
    }
}

impl ControlStream {
    #[cfg(any(target_os = "macos", target_os = "ios"))]
    fn suppress_sigpipe(&self) {
        use std::os::fd::AsRawFd;

        let fd = match &self.inner {
            ControlStreamInner::Tcp(stream) => stream.as_raw_fd(),
            ControlStreamInner::Unix(stream) => stream.as_raw_fd(),
        };
        let one: libc::c_int = 1;

        // SAFETY: `one` outlives the call and the length matches its type;
        // `fd` is an open socket descriptor owned by this stream.
        let rc = unsafe {
            libc::setsockopt(
                fd,
                libc::SOL_SOCKET,
                libc::SO_NOSIGPIPE,
                (&one as *const libc::c_int).cast::<libc::c_void>(),
                std::mem::size_of::<libc::c_int>() as libc::socklen_t,
            )
        };
        if rc != 0 {
            tracing::warn!(
                error = %io::Error::last_os_error(),
                "failed to set SO_NOSIGPIPE"
            );
        }
    }

    #[cfg(not(any(target_os = "macos", target_os = "ios")))]
    fn suppress_sigpipe(&self) {}

    /// Disable Nagle's algorithm on TCP streams. No-op for Unix sockets.
    pub fn set_nodelay(&self, nodelay: bool) -> io::Result<()> {
        match &self.inner {
            ControlStreamInner::Tcp(stream) => stream.set_nodelay(nodelay),
            #[cfg(unix)]
            ControlStreamInner::Unix(_) => Ok(()),
        }
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        match &self.inner {
            ControlStreamInner::Tcp(_) => "tcp",
            #[cfg(unix)]
            ControlStreamInner::Unix(_) => "unix-stream",
        }
    }
}

impl TimedStream for ControlStream {
    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        match &self.inner {
            ControlStreamInner::Tcp(stream) => stream.set_read_timeout(timeout),
            #[cfg(unix)]
            ControlStreamInner::Unix(stream) => stream.set_read_timeout(timeout),
        }
    }

    fn set_write_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        match &self.inner {
            ControlStreamInner::Tcp(stream) => stream.set_write_timeout(timeout),
            #[cfg(unix)]
            ControlStreamInner::Unix(stream) => stream.set_write_timeout(timeout),
        }
    }

    fn shutdown(&self) -> io::Result<()> {
        match &self.inner {
            ControlStreamInner::Tcp(stream) => stream.shutdown(Shutdown::Both),
            #[cfg(unix)]
            ControlStreamInner::Unix(stream) => stream.shutdown(Shutdown::Both),
        }
    }

    fn peer_label(&self) -> String {
        match &self.inner {
            ControlStreamInner::Tcp(stream) => stream.peer_label(),
            #[cfg(unix)]
            ControlStreamInner::Unix(stream) => stream.peer_label(),
        }
    }
}

impl TimedStream for TcpStream {
    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        TcpStream::set_read_timeout(self, timeout)
    }

    fn set_write_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        TcpStream::set_write_timeout(self, timeout)
    }

    fn shutdown(&self) -> io::Result<()> {
        TcpStream::shutdown(self, Shutdown::Both)
    }

    fn peer_label(&self) -> String {
        self.peer_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| "unknown".to_string())
    }
}

#[cfg(unix)]
impl TimedStream for std::os::unix::net::UnixStream {
    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        std::os::unix::net::UnixStream::set_read_timeout(self, timeout)
    }

    fn set_write_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        std::os::unix::net::UnixStream::set_write_timeout(self, timeout)
    }

    fn shutdown(&self) -> io::Result<()> {
        std::os::unix::net::UnixStream::shutdown(self, Shutdown::Both)
    }

    fn peer_label(&self) -> String {
        match self.peer_addr() {
            Ok(addr) => match addr.as_pathname() {
                Some(path) => path.display().to_string(),
                None => "unnamed".to_string(),
            },
            Err(_) => "unknown".to_string(),
        }
    }
}

impl std::fmt::Debug for ControlStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlStream")
            .field("type", &self.transport_name())
            .field("peer", &self.peer_label())
            .finish()
    }
}
