use std::net::SocketAddr;

use ctlwire_transport::ControlListener;
use tracing::info;

use crate::channel::MessageChannel;
use crate::config::ChannelConfig;
use crate::error::Result;

/// Listens for worker connections on the driver side.
pub struct ChannelListener {
    listener: ControlListener,
    config: ChannelConfig,
}

impl ChannelListener {
    /// Bind to `addr` (`host:port`; port 0 picks a free port).
    pub fn bind(addr: &str) -> Result<Self> {
        let listener = ControlListener::bind(addr)?;
        Ok(Self {
            listener,
            config: ChannelConfig::default(),
        })
    }

    /// Override the configuration handed to accepted channels.
    pub fn with_config(mut self, config: ChannelConfig) -> Self {
        self.config = config;
        self
    }

    /// Block until a worker connects.
    pub fn accept(&self) -> Result<MessageChannel> {
        let stream = self.listener.accept()?;
        let channel = MessageChannel::with_config(stream, self.config.clone());
        info!(peer = %channel.peer(), "worker connected");
        Ok(channel)
    }

    /// The bound address.
    pub fn local_addr(&self) -> SocketAddr {
        self.listener.local_addr()
    }
}
