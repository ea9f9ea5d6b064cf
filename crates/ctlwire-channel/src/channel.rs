use std::time::{Duration, Instant};

use ctlwire_frame::{FrameConfig, FramedStream, Tag, TAG_SIZE};
use ctlwire_transport::{ControlStream, TimedStream};
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::{ChannelConfig, BUFFERED_REPLY_WAIT, LIVENESS_INTERVAL, REPLY_WAIT};
use crate::error::{ChannelError, Result};
use crate::message::Message;

/// One end of a driver/worker control connection.
///
/// Exchanges are strictly request/reply: a reply always answers the message
/// sent immediately before it. Before every blocking read the channel makes
/// sure a liveness probe (`NULL`) has gone out within the last
/// [`LIVENESS_INTERVAL`]; `NULL`s arriving from the peer are skipped.
///
/// Dropping the channel tears it down: a best-effort `EXITING` notice, then
/// the socket is shut down and the receive buffer freed.
pub struct MessageChannel<T: TimedStream = ControlStream, C: Clock = SystemClock> {
    stream: Option<FramedStream<T>>,
    clock: C,
    next_liveness_check: Option<Instant>,
    config: ChannelConfig,
    peer: String,
}

impl MessageChannel<ControlStream, SystemClock> {
    /// Connect to a driver at `addr` (`host:port`), waiting at most `timeout`.
    pub fn connect(addr: &str, timeout: Duration) -> Result<Self> {
        Self::connect_with_config(addr, timeout, ChannelConfig::default())
    }

    /// Connect with explicit configuration.
    pub fn connect_with_config(addr: &str, timeout: Duration, config: ChannelConfig) -> Result<Self> {
        let stream = ctlwire_transport::connect(addr, timeout)?;
        info!(%addr, "control channel connected");
        Ok(Self::with_config(stream, config))
    }
}

impl<T: TimedStream> MessageChannel<T, SystemClock> {
    /// Run the protocol over an already-open stream, e.g. one accepted by a
    /// driver.
    pub fn from_stream(stream: T) -> Self {
        Self::with_config(stream, ChannelConfig::default())
    }

    /// Run the protocol over an already-open stream with explicit configuration.
    pub fn with_config(stream: T, config: ChannelConfig) -> Self {
        Self::with_clock(stream, config, SystemClock)
    }
}

impl<T: TimedStream, C: Clock> MessageChannel<T, C> {
    /// Run the protocol with a custom clock for liveness scheduling.
    pub fn with_clock(stream: T, config: ChannelConfig, clock: C) -> Self {
        let peer = stream.peer_label();
        let frame_config = FrameConfig {
            max_payload_size: config.max_payload_size,
        };
        Self {
            stream: Some(FramedStream::with_config(stream, frame_config)),
            clock,
            next_liveness_check: None,
            config,
            peer,
        }
    }

    /// Receive the next message, reading any text it carries.
    ///
    /// `DONE` and `RUN` read their text and, when it is non-empty, answer
    /// with `ACK`. `ERROR` and `EXIT` are always answered with `ACK`.
    /// Returns `Ok(None)` if nothing arrived within `timeout`.
    pub fn receive(&mut self, timeout: Duration) -> Result<Option<Message>> {
        let Some(tag) = self.read_tag(timeout)? else {
            return Ok(None);
        };

        let message = match tag {
            Tag::Done | Tag::Run => {
                let text = self.read_string(timeout)?;
                if !text.is_empty() {
                    self.acknowledge()?;
                }
                Message::with_text(tag, text)
            }
            Tag::Error | Tag::Exit => {
                self.acknowledge()?;
                Message::new(tag)
            }
            Tag::Null | Tag::Ping | Tag::Ack | Tag::Exiting => Message::new(tag),
        };

        debug!(peer = %self.peer, %message, "received");
        Ok(Some(message))
    }

    /// Receive the next tag without reading any text after it.
    ///
    /// Same as [`receive`](Self::receive) except that `DONE` and `RUN`
    /// neither consume their text nor send `ACK`. Only use this when the
    /// peer is known not to follow those tags with text; otherwise the
    /// stream falls out of step.
    pub fn receive_tag(&mut self, timeout: Duration) -> Result<Option<Tag>> {
        let Some(tag) = self.read_tag(timeout)? else {
            return Ok(None);
        };

        if matches!(tag, Tag::Error | Tag::Exit) {
            self.acknowledge()?;
        }
        debug!(peer = %self.peer, %tag, "received");
        Ok(Some(tag))
    }

    /// Send a bare tag.
    ///
    /// `NULL`, `ERROR`, `ACK`, `RUN` and `DONE` succeed once the four bytes
    /// are written. `EXITING`, `PING` and `EXIT` then wait up to
    /// [`REPLY_WAIT`] and succeed only if the reply is `ACK`. A short write
    /// or a wrong reply returns `Ok(false)`; I/O failures are errors.
    pub fn send(&mut self, tag: Tag, timeout: Duration) -> Result<bool> {
        let wrote = self.framed()?.write_tag(tag, timeout)?;
        if wrote != TAG_SIZE {
            debug!(peer = %self.peer, %tag, wrote, "short tag write");
            return Ok(false);
        }

        if !tag.requires_ack() {
            return Ok(true);
        }

        let reply = self.receive_tag(REPLY_WAIT)?;
        if reply != Some(Tag::Ack) {
            debug!(peer = %self.peer, %tag, ?reply, "send not acknowledged");
            return Ok(false);
        }
        Ok(true)
    }

    /// Send `PING` and wait for the peer's `ACK`.
    pub fn ping(&mut self) -> Result<bool> {
        let timeout = self.config.send_timeout;
        self.send(Tag::Ping, timeout)
    }

    /// Send a text-carrying tag in the historical buffered layout and wait
    /// up to [`BUFFERED_REPLY_WAIT`] for `ACK`.
    ///
    /// Only the first `len - 8` bytes of `text` reach the peer; see
    /// [`ctlwire_frame::encode_buffered`]. Use [`send_text`](Self::send_text)
    /// when the peer must see the whole text.
    pub fn send_buffer(&mut self, tag: Tag, text: &str) -> Result<()> {
        if !tag.carries_text() {
            return Err(ChannelError::UnexpectedPayload(tag));
        }
        let timeout = self.config.send_timeout;
        self.framed()?.write_buffered(tag, text, timeout)?;
        self.expect_ack(tag, BUFFERED_REPLY_WAIT)
    }

    /// Send a text-carrying tag with its whole text.
    ///
    /// The receiver acknowledges non-empty text only, so an empty text is
    /// sent without waiting for a reply.
    pub fn send_text(&mut self, tag: Tag, text: &str) -> Result<()> {
        if !tag.carries_text() {
            return Err(ChannelError::UnexpectedPayload(tag));
        }
        let timeout = self.config.send_timeout;
        self.framed()?.write_text(tag, text, timeout)?;
        if text.is_empty() {
            return Ok(());
        }
        self.expect_ack(tag, BUFFERED_REPLY_WAIT)
    }

    /// Tear the channel down. Safe to call more than once.
    ///
    /// Sends `EXITING` unless the peer has already closed its end (failures
    /// ignored), shuts the socket down, and frees the receive buffer. Every
    /// later operation fails with [`ChannelError::Closed`].
    pub fn close(&mut self) {
        if self.stream.is_none() {
            return;
        }

        if self.peer_closed() {
            debug!(peer = %self.peer, "peer already gone, skipping EXITING");
        } else {
            let timeout = self.config.send_timeout;
            match self.send(Tag::Exiting, timeout) {
                Ok(true) => debug!(peer = %self.peer, "peer acknowledged EXITING"),
                Ok(false) => debug!(peer = %self.peer, "peer did not acknowledge EXITING"),
                Err(err) => warn!(peer = %self.peer, error = %err, "EXITING notice failed"),
            }
        }

        if let Some(mut framed) = self.stream.take() {
            if let Err(err) = framed.get_ref().shutdown() {
                debug!(peer = %self.peer, error = %err, "socket shutdown failed");
            }
            framed.release_buffer();
        }
        info!(peer = %self.peer, "control channel closed");
    }

    /// Whether [`close`](Self::close) has run.
    pub fn is_closed(&self) -> bool {
        self.stream.is_none()
    }

    /// Whether a read has seen the peer close its end of the connection.
    ///
    /// Once set, every further read fails with [`ChannelError::PeerClosed`]
    /// instead of waiting out its timeout.
    pub fn peer_closed(&self) -> bool {
        self.stream.as_ref().is_some_and(FramedStream::peer_closed)
    }

    /// Peer identity for diagnostics.
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Current configuration.
    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Bytes held by the receive buffer (zero once closed).
    pub fn buffer_capacity(&self) -> usize {
        self.stream
            .as_ref()
            .map(FramedStream::buffer_capacity)
            .unwrap_or(0)
    }

    fn framed(&mut self) -> Result<&mut FramedStream<T>> {
        self.stream.as_mut().ok_or(ChannelError::Closed)
    }

    /// Send a liveness probe unless one went out within the last interval.
    fn check_liveness(&mut self) -> Result<()> {
        if self.stream.is_none() {
            return Err(ChannelError::Closed);
        }

        let now = self.clock.now();
        if self.next_liveness_check.is_some_and(|next| now < next) {
            return Ok(());
        }
        self.next_liveness_check = Some(now + LIVENESS_INTERVAL);

        let timeout = self.config.send_timeout;
        match self.send(Tag::Null, timeout) {
            Ok(true) => Ok(()),
            Ok(false) => Err(ChannelError::Liveness("probe was not fully written".to_string())),
            Err(err) => Err(ChannelError::Liveness(err.to_string())),
        }
    }

    fn read_int(&mut self, timeout: Duration) -> Result<Option<i32>> {
        if self.peer_closed() {
            return Err(ChannelError::PeerClosed);
        }
        self.check_liveness()?;
        Ok(self.framed()?.read_int(timeout)?)
    }

    /// Read the next tag, skipping liveness probes from the peer.
    fn read_tag(&mut self, timeout: Duration) -> Result<Option<Tag>> {
        let mut nulls = 0usize;
        loop {
            let Some(value) = self.read_int(timeout)? else {
                return Ok(None);
            };
            let tag = Tag::try_from(value)?;
            if tag != Tag::Null {
                return Ok(Some(tag));
            }

            nulls += 1;
            if nulls > self.config.max_consecutive_nulls {
                return Err(ChannelError::NullFlood(self.config.max_consecutive_nulls));
            }
        }
    }

    fn read_string(&mut self, timeout: Duration) -> Result<String> {
        let len = self
            .read_int(timeout)?
            .ok_or(ChannelError::MissingLength)?;
        Ok(self.framed()?.read_text(len, timeout)?)
    }

    fn acknowledge(&mut self) -> Result<()> {
        let timeout = self.config.send_timeout;
        if !self.send(Tag::Ack, timeout)? {
            debug!(peer = %self.peer, "ACK not fully written");
        }
        Ok(())
    }

    fn expect_ack(&mut self, tag: Tag, wait: Duration) -> Result<()> {
        match self.receive_tag(wait)? {
            Some(Tag::Ack) => Ok(()),
            reply => Err(ChannelError::NotAcknowledged { tag, reply }),
        }
    }
}

impl<T: TimedStream, C: Clock> Drop for MessageChannel<T, C> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<T: TimedStream, C: Clock> std::fmt::Debug for MessageChannel<T, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageChannel")
            .field("peer", &self.peer)
            .field("closed", &self.is_closed())
            .field("next_liveness_check", &self.next_liveness_check)
            .field("config", &self.config)
            .finish()
    }
}
