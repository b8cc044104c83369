//! Framed duplex transport abstraction.

use crate::error::{ClientError, ClientResult};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// A bidirectional, framed text transport (WebSocket or equivalent).
///
/// Implementations need no internal synchronization: the client's single
/// driver task owns the transport exclusively, so `send` is never called
/// from two paths concurrently.
#[async_trait]
pub trait DuplexTransport: Send {
    /// Sends one frame.
    async fn send(&mut self, frame: String) -> ClientResult<()>;

    /// Receives the next frame; `None` means the connection closed.
    async fn recv(&mut self) -> Option<ClientResult<String>>;
}

/// An in-memory transport for tests.
///
/// Created in a pair with a [`MockRemote`], which plays the server side:
/// frames the client sends appear on `from_client`, and frames pushed into
/// `to_client` arrive at the client. Dropping the remote closes the
/// connection.
#[derive(Debug)]
pub struct MockTransport {
    inbound: mpsc::Receiver<String>,
    outbound: mpsc::Sender<String>,
}

/// The server side of a [`MockTransport`] pair.
#[derive(Debug)]
pub struct MockRemote {
    /// Pushes frames toward the client.
    pub to_client: mpsc::Sender<String>,
    /// Receives frames the client sent.
    pub from_client: mpsc::Receiver<String>,
}

impl MockTransport {
    /// Creates a connected transport/remote pair.
    pub fn pair() -> (Self, MockRemote) {
        let (to_client, inbound) = mpsc::channel(32);
        let (outbound, from_client) = mpsc::channel(32);
        (
            Self { inbound, outbound },
            MockRemote {
                to_client,
                from_client,
            },
        )
    }
}

#[async_trait]
impl DuplexTransport for MockTransport {
    async fn send(&mut self, frame: String) -> ClientResult<()> {
        self.outbound
            .send(frame)
            .await
            .map_err(|_| ClientError::Transport("connection closed".into()))
    }

    async fn recv(&mut self) -> Option<ClientResult<String>> {
        self.inbound.recv().await.map(Ok)
    }
}
