//! Server configuration.

use std::net::SocketAddr;

/// Configuration for the transport adapters.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Maximum size of one request frame, in bytes.
    pub max_frame_bytes: usize,
    /// Capacity of each connection's outbound event channel.
    ///
    /// When a connection's channel is full, further events stay in the
    /// session queue until the client acknowledges or reconnects.
    pub event_channel_capacity: usize,
}

impl ServerConfig {
    /// Creates a configuration bound to the given address.
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            max_frame_bytes: 1024 * 1024,
            event_channel_capacity: 256,
        }
    }

    /// Sets the maximum request frame size.
    #[must_use]
    pub fn with_max_frame_bytes(mut self, bytes: usize) -> Self {
        self.max_frame_bytes = bytes;
        self
    }

    /// Sets the outbound event channel capacity.
    #[must_use]
    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(SocketAddr::from(([127, 0, 0, 1], 8090)))
    }
}
