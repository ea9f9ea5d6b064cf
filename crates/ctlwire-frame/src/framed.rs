use std::io::{self, ErrorKind};
use std::time::{Duration, Instant};

use bytes::BytesMut;
use ctlwire_transport::TimedStream;
use tracing::{debug, trace};

use crate::buffer::ReceiveBuffer;
use crate::codec::{
    buffered_frame_len, decode_int, encode_buffered, encode_tag, encode_text, FrameConfig,
    HEADER_SIZE, TAG_SIZE,
};
use crate::error::{FrameError, Result};
use crate::tag::Tag;

const INITIAL_WRITE_CAPACITY: usize = 256;

/// Smallest timeout handed to the OS; a zero duration is rejected by std.
const MIN_TIMEOUT: Duration = Duration::from_millis(1);

/// Reads and writes control frames on one stream, every call bounded by a
/// caller-supplied timeout.
///
/// Owns the stream and the [`ReceiveBuffer`] used for payload reads and
/// buffered sends. Not meant for concurrent use: one read or one write at a
/// time.
pub struct FramedStream<T> {
    inner: T,
    buffer: ReceiveBuffer,
    write_buf: BytesMut,
    config: FrameConfig,
    peer_closed: bool,
}

impl<T: TimedStream> FramedStream<T> {
    /// Create a framed stream with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a framed stream with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buffer: ReceiveBuffer::new(),
            write_buf: BytesMut::with_capacity(INITIAL_WRITE_CAPACITY),
            config,
            peer_closed: false,
        }
    }

    /// Read one big-endian `i32` within `timeout`.
    ///
    /// Returns `Ok(None)` when fewer than four bytes arrive before the
    /// timeout expires or the peer closes the stream; the two cases are told
    /// apart by [`peer_closed`](Self::peer_closed). Only a genuine I/O error
    /// is reported as [`FrameError::Read`].
    pub fn read_int(&mut self, timeout: Duration) -> Result<Option<i32>> {
        let mut bytes = [0u8; TAG_SIZE];
        let got = self.fill(&mut bytes, timeout)?;
        if got == TAG_SIZE {
            let value = decode_int(bytes);
            trace!(value, "received integer");
            Ok(Some(value))
        } else {
            if got > 0 {
                debug!(got, "discarding partial integer");
            }
            Ok(None)
        }
    }

    /// Read a `len`-byte text payload within `timeout`.
    ///
    /// The length prefix has already been consumed by the caller. A payload
    /// that does not fully arrive is a [`FrameError::ShortRead`]; there is no
    /// partial-message recovery. The text ends at the first NUL byte, which
    /// drops the zero padding of buffered-send frames.
    pub fn read_text(&mut self, len: i32, timeout: Duration) -> Result<String> {
        let len = usize::try_from(len).map_err(|_| FrameError::InvalidLength(len))?;
        if len > self.config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: len,
                max: self.config.max_payload_size,
            });
        }
        if len == 0 {
            return Ok(String::new());
        }

        let buf = self.buffer.prepare(len);
        let (got, closed) = read_within(&mut self.inner, buf, timeout)?;
        self.peer_closed |= closed;
        if got < len {
            return Err(FrameError::ShortRead { expected: len, got });
        }

        let end = buf.iter().position(|b| *b == 0).unwrap_or(len);
        let text = std::str::from_utf8(&buf[..end])?;
        Ok(text.to_owned())
    }

    /// Write a bare tag within `timeout`, returning the bytes written.
    ///
    /// A short count is not an error here; the caller decides what a
    /// partial tag means.
    pub fn write_tag(&mut self, tag: Tag, timeout: Duration) -> Result<usize> {
        trace!(%tag, "sending tag");
        write_within(&mut self.inner, &encode_tag(tag), timeout)
    }

    /// Write a buffered-send frame (see [`encode_buffered`]) in one piece.
    ///
    /// The frame is assembled in the receive buffer. Anything short of the
    /// whole frame is a [`FrameError::ShortWrite`].
    pub fn write_buffered(&mut self, tag: Tag, text: &str, timeout: Duration) -> Result<usize> {
        let total = buffered_frame_len(text);
        let frame = self.buffer.prepare(total);
        encode_buffered(tag, text, frame)?;

        let wrote = write_within(&mut self.inner, frame, timeout)?;
        if wrote != total {
            return Err(FrameError::ShortWrite {
                expected: total,
                wrote,
            });
        }
        debug!(%tag, len = text.len(), "sent buffered frame");
        Ok(total)
    }

    /// Write `[tag][len][text]` with the whole text.
    pub fn write_text(&mut self, tag: Tag, text: &str, timeout: Duration) -> Result<usize> {
        self.write_buf.clear();
        encode_text(tag, text, &mut self.write_buf)?;

        let total = HEADER_SIZE + text.len();
        let wrote = write_within(&mut self.inner, &self.write_buf, timeout)?;
        if wrote != total {
            return Err(FrameError::ShortWrite {
                expected: total,
                wrote,
            });
        }
        debug!(%tag, len = text.len(), "sent text frame");
        Ok(total)
    }

    /// Bytes currently allocated by the receive buffer.
    pub fn buffer_capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// Free the receive buffer.
    pub fn release_buffer(&mut self) {
        self.buffer.release();
    }

    /// Whether a read has seen the peer close its end of the stream.
    ///
    /// Sticky: once set, no further bytes will ever arrive.
    pub fn peer_closed(&self) -> bool {
        self.peer_closed
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    fn fill(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let (got, closed) = read_within(&mut self.inner, buf, timeout)?;
        self.peer_closed |= closed;
        Ok(got)
    }
}

fn is_timeout(err: &io::Error) -> bool {
    matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
}

/// Fill `buf` until it is full, the deadline passes, or the peer closes.
/// Returns how many bytes arrived and whether the stream hit end-of-file.
fn read_within<T: TimedStream>(
    stream: &mut T,
    buf: &mut [u8],
    timeout: Duration,
) -> Result<(usize, bool)> {
    let deadline = Instant::now() + timeout;
    let mut filled = 0usize;
    let mut closed = false;

    while filled < buf.len() {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        stream
            .set_read_timeout(Some(remaining.max(MIN_TIMEOUT)))
            .map_err(FrameError::Read)?;

        match stream.read(&mut buf[filled..]) {
            Ok(0) => {
                debug!(filled, "peer closed stream");
                closed = true;
                break;
            }
            Ok(n) => filled += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) if is_timeout(&err) => break,
            Err(err) => return Err(FrameError::Read(err)),
        }
    }

    Ok((filled, closed))
}

/// Write as much of `buf` as the stream accepts before the deadline.
///
/// Running out of time mid-write is an error. A failed send that carries no
/// OS error code is treated as "nothing more written".
fn write_within<T: TimedStream>(stream: &mut T, buf: &[u8], timeout: Duration) -> Result<usize> {
    let deadline = Instant::now() + timeout;
    let mut offset = 0usize;

    while offset < buf.len() {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(FrameError::Write(io::Error::new(
                ErrorKind::TimedOut,
                format!("write timed out after {timeout:?} ({offset} of {} bytes)", buf.len()),
            )));
        }
        stream
            .set_write_timeout(Some(remaining.max(MIN_TIMEOUT)))
            .map_err(FrameError::Write)?;

        match stream.write(&buf[offset..]) {
            Ok(0) => break,
            Ok(n) => offset += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) if is_timeout(&err) => continue,
            Err(err) if err.raw_os_error() == Some(0) => {
                debug!(offset, "send failed without an error code");
                break;
            }
            Err(err) => return Err(FrameError::Write(err)),
        }
    }

    loop {
        match stream.flush() {
            Ok(()) => return Ok(offset),
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(FrameError::Write(err)),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::collections::VecDeque;
    use std::io::{Read, Write};
    use std::os::unix::net::UnixStream;

    use super::*;
    use crate::buffer::{GROWTH_SLACK, INITIAL_BUFFER_SIZE};

    const SHORT: Duration = Duration::from_millis(50);
    const LONG: Duration = Duration::from_secs(2);

    fn pair() -> (FramedStream<UnixStream>, UnixStream) {
        let (left, right) = UnixStream::pair().unwrap();
        (FramedStream::new(left), right)
    }

    #[test]
    fn every_tag_roundtrips() {
        let (left, right) = UnixStream::pair().unwrap();
        let mut writer = FramedStream::new(left);
        let mut reader = FramedStream::new(right);

        for tag in Tag::ALL {
            assert_eq!(writer.write_tag(tag, LONG).unwrap(), TAG_SIZE);
            let value = reader.read_int(LONG).unwrap().unwrap();
            assert_eq!(Tag::try_from(value).unwrap(), tag);
        }
    }

    #[test]
    fn read_int_times_out_without_error() {
        let (mut framed, _peer) = pair();
        let started = Instant::now();
        assert_eq!(framed.read_int(SHORT).unwrap(), None);
        assert!(started.elapsed() >= SHORT);
        assert!(started.elapsed() < LONG);
    }

    #[test]
    fn read_int_partial_is_no_value() {
        let (mut framed, mut peer) = pair();
        peer.write_all(&[0x00, 0x00]).unwrap();
        assert_eq!(framed.read_int(SHORT).unwrap(), None);
    }

    #[test]
    fn read_int_eof_is_no_value() {
        let (mut framed, peer) = pair();
        drop(peer);
        assert_eq!(framed.read_int(LONG).unwrap(), None);
    }

    #[test]
    fn eof_is_remembered_but_timeout_is_not() {
        let (mut framed, peer) = pair();
        assert_eq!(framed.read_int(SHORT).unwrap(), None);
        assert!(!framed.peer_closed());

        peer.shutdown(std::net::Shutdown::Write).unwrap();
        let started = Instant::now();
        assert_eq!(framed.read_int(LONG).unwrap(), None);
        assert!(started.elapsed() < LONG);
        assert!(framed.peer_closed());
    }

    #[test]
    fn truncated_text_marks_peer_closed() {
        let (mut framed, mut peer) = pair();
        peer.write_all(b"ab").unwrap();
        drop(peer);
        assert!(framed.read_text(4, LONG).is_err());
        assert!(framed.peer_closed());
    }

    #[test]
    fn read_int_genuine_error_is_fatal() {
        let stream = ScriptedStream::reading(vec![Err(ErrorKind::ConnectionReset)]);
        let mut framed = FramedStream::new(stream);
        let err = framed.read_int(LONG).unwrap_err();
        assert!(matches!(err, FrameError::Read(e) if e.kind() == ErrorKind::ConnectionReset));
    }

    #[test]
    fn read_int_retries_interrupted_and_joins_fragments() {
        let stream = ScriptedStream::reading(vec![
            Err(ErrorKind::Interrupted),
            Ok(vec![0x00]),
            Ok(vec![0x00, 0xab]),
            Ok(vec![0xc5]),
        ]);
        let mut framed = FramedStream::new(stream);
        assert_eq!(framed.read_int(LONG).unwrap(), Some(Tag::Done.as_i32()));
    }

    #[test]
    fn read_text_exact() {
        let (mut framed, mut peer) = pair();
        peer.write_all(b"task-7").unwrap();
        assert_eq!(framed.read_text(6, LONG).unwrap(), "task-7");
    }

    #[test]
    fn read_text_stops_at_padding() {
        let (mut framed, mut peer) = pair();
        peer.write_all(b"abc\0\0\0\0\0").unwrap();
        assert_eq!(framed.read_text(8, LONG).unwrap(), "abc");
    }

    #[test]
    fn read_text_nothing_delivered_is_short_read() {
        let (mut framed, _peer) = pair();
        let err = framed.read_text(12, SHORT).unwrap_err();
        assert!(matches!(
            err,
            FrameError::ShortRead {
                expected: 12,
                got: 0
            }
        ));
    }

    #[test]
    fn read_text_truncated_is_short_read() {
        let (mut framed, mut peer) = pair();
        peer.write_all(b"half").unwrap();
        drop(peer);
        let err = framed.read_text(8, LONG).unwrap_err();
        assert!(matches!(err, FrameError::ShortRead { expected: 8, got: 4 }));
    }

    #[test]
    fn read_text_rejects_bad_lengths() {
        let (mut framed, _peer) = pair();
        assert!(matches!(
            framed.read_text(-1, SHORT),
            Err(FrameError::InvalidLength(-1))
        ));

        let (left, _capped_peer) = UnixStream::pair().unwrap();
        let mut framed = FramedStream::with_config(
            left,
            FrameConfig {
                max_payload_size: 16,
            },
        );
        assert!(matches!(
            framed.read_text(17, SHORT),
            Err(FrameError::PayloadTooLarge { size: 17, max: 16 })
        ));
    }

    #[test]
    fn read_text_zero_length_is_empty() {
        let (mut framed, _peer) = pair();
        assert_eq!(framed.read_text(0, SHORT).unwrap(), "");
    }

    #[test]
    fn read_text_rejects_invalid_utf8() {
        let (mut framed, mut peer) = pair();
        peer.write_all(&[0xff, 0xfe]).unwrap();
        assert!(matches!(
            framed.read_text(2, LONG),
            Err(FrameError::InvalidText(_))
        ));
    }

    #[test]
    fn buffer_grows_for_large_payload_and_hides_old_bytes() {
        let (mut framed, mut peer) = pair();
        let big = "x".repeat(1000);
        peer.write_all(big.as_bytes()).unwrap();
        assert_eq!(framed.read_text(1000, LONG).unwrap(), big);
        assert_eq!(framed.buffer_capacity(), 1000 + GROWTH_SLACK);

        peer.write_all(b"yy").unwrap();
        assert_eq!(framed.read_text(2, LONG).unwrap(), "yy");
        assert_eq!(framed.buffer_capacity(), 1000 + GROWTH_SLACK);

        framed.release_buffer();
        assert_eq!(framed.buffer_capacity(), 0);
        peer.write_all(b"z").unwrap();
        framed.read_text(1, LONG).unwrap();
        assert_eq!(framed.buffer_capacity(), INITIAL_BUFFER_SIZE);
    }

    #[test]
    fn write_buffered_puts_layout_on_wire() {
        let (mut framed, mut peer) = pair();
        let text = "0123456789abcdef";
        assert_eq!(framed.write_buffered(Tag::Done, text, LONG).unwrap(), 24);

        let mut wire = [0u8; 24];
        peer.read_exact(&mut wire).unwrap();
        assert_eq!(&wire[..4], &encode_tag(Tag::Done));
        assert_eq!(&wire[4..8], &16i32.to_be_bytes());
        assert_eq!(&wire[8..16], b"01234567");
        assert_eq!(&wire[16..], &[0u8; 8]);
    }

    #[test]
    fn write_text_puts_whole_text_on_wire() {
        let (mut framed, mut peer) = pair();
        framed.write_text(Tag::Run, "task-7", LONG).unwrap();

        let mut wire = [0u8; 14];
        peer.read_exact(&mut wire).unwrap();
        assert_eq!(&wire[8..], b"task-7");
    }

    #[test]
    fn write_to_closed_peer_is_write_error() {
        let (left, right) = UnixStream::pair().unwrap();
        let mut framed = FramedStream::new(ctlwire_transport::ControlStream::from(left));
        drop(right);

        let err = framed.write_tag(Tag::Ping, LONG).unwrap_err();
        assert!(matches!(err, FrameError::Write(e) if e.kind() == ErrorKind::BrokenPipe));
    }

    #[test]
    fn send_failure_without_error_code_is_short_count() {
        let mut stream = ScriptedStream::reading(Vec::new());
        stream.write_error = Some(io::Error::from_raw_os_error(0));
        let mut framed = FramedStream::new(stream);

        assert_eq!(framed.write_tag(Tag::Ack, LONG).unwrap(), 0);

        let err = framed.write_buffered(Tag::Done, "payload!payload!", LONG).unwrap_err();
        assert!(matches!(
            err,
            FrameError::ShortWrite {
                expected: 24,
                wrote: 0
            }
        ));
    }

    #[test]
    fn write_interrupted_then_succeeds() {
        let mut stream = ScriptedStream::reading(Vec::new());
        stream.write_error = Some(io::Error::from(ErrorKind::Interrupted));
        let mut framed = FramedStream::new(stream);

        assert_eq!(framed.write_tag(Tag::Exit, LONG).unwrap(), TAG_SIZE);
        assert_eq!(framed.get_ref().written, encode_tag(Tag::Exit));
    }

    /// In-memory stream that replays scripted read results.
    struct ScriptedStream {
        reads: VecDeque<std::result::Result<Vec<u8>, ErrorKind>>,
        write_error: Option<io::Error>,
        written: Vec<u8>,
    }

    impl ScriptedStream {
        fn reading(reads: Vec<std::result::Result<Vec<u8>, ErrorKind>>) -> Self {
            Self {
                reads: reads.into(),
                write_error: None,
                written: Vec::new(),
            }
        }
    }

    impl Read for ScriptedStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.reads.pop_front() {
                None => Ok(0),
                Some(Err(kind)) => Err(io::Error::from(kind)),
                Some(Ok(bytes)) => {
                    buf[..bytes.len()].copy_from_slice(&bytes);
                    Ok(bytes.len())
                }
            }
        }
    }

    impl Write for ScriptedStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if let Some(err) = self.write_error.take() {
                // Errors with no OS code keep failing, like a dead socket
                // that never reports why.
                if err.raw_os_error() == Some(0) {
                    self.write_error = Some(io::Error::from_raw_os_error(0));
                }
                return Err(err);
            }
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl TimedStream for ScriptedStream {
        fn set_read_timeout(&self, _timeout: Option<Duration>) -> io::Result<()> {
            Ok(())
        }

        fn set_write_timeout(&self, _timeout: Option<Duration>) -> io::Result<()> {
            Ok(())
        }

        fn shutdown(&self) -> io::Result<()> {
            Ok(())
        }
    }
}
