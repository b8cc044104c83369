//! Duplex client: one driver task owns the connection.

use crate::correlation::PendingRequests;
use crate::error::{ClientError, ClientResult};
use crate::transport::DuplexTransport;
use std::sync::Arc;
use synchub_protocol::{Event, ServerFrame, SyncRequest, SyncResponse};
use tokio::sync::{mpsc, watch};

/// A client for duplex connections that multiplex requests and events.
///
/// A single spawned driver task owns the transport: every outbound frame
/// passes through one queue, and at most one send is in flight on the
/// connection at a time. Inbound frames are routed structurally: responses
/// resolve their pending request by echoed `req` id (in any order), events
/// flow to the event receiver returned by [`connect`](Self::connect).
///
/// Closing the connection, or losing it, resolves every outstanding
/// request as [`ClientError::Cancelled`].
#[derive(Debug)]
pub struct DuplexClient {
    pending: Arc<PendingRequests>,
    out_tx: mpsc::Sender<String>,
    shutdown: watch::Sender<bool>,
}

impl DuplexClient {
    /// Takes ownership of a transport and starts the driver task.
    ///
    /// Returns the client and the stream of unsolicited events.
    pub fn connect<T: DuplexTransport + 'static>(mut transport: T) -> (Self, mpsc::Receiver<Event>) {
        let pending = Arc::new(PendingRequests::new());
        let (out_tx, mut out_rx) = mpsc::channel::<String>(64);
        let (event_tx, event_rx) = mpsc::channel::<Event>(64);
        let (shutdown, mut shutdown_rx) = watch::channel(false);

        let driver_pending = Arc::clone(&pending);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    outbound = out_rx.recv() => match outbound {
                        Some(frame) => {
                            if let Err(error) = transport.send(frame).await {
                                tracing::warn!(%error, "send failed; closing connection");
                                break;
                            }
                        }
                        None => break,
                    },
                    inbound = transport.recv() => match inbound {
                        Some(Ok(raw)) => route_frame(&raw, &driver_pending, &event_tx).await,
                        Some(Err(error)) => {
                            tracing::warn!(%error, "receive failed; closing connection");
                            break;
                        }
                        None => break,
                    },
                }
            }
            // Connection gone: nothing outstanding may dangle.
            driver_pending.cancel_all();
        });

        (
            Self {
                pending,
                out_tx,
                shutdown,
            },
            event_rx,
        )
    }

    /// Sends a request and awaits its correlated response.
    ///
    /// The client assigns the `req` id; any id already on the request is
    /// replaced. Multiple requests may be outstanding concurrently and
    /// complete in any order.
    pub async fn request(&self, mut request: SyncRequest) -> ClientResult<SyncResponse> {
        let (req_id, rx) = self.pending.register();
        request.req_id = Some(req_id);

        let frame = match request.encode() {
            Ok(frame) => frame,
            Err(error) => {
                self.pending.forget(req_id);
                return Err(error.into());
            }
        };
        if self.out_tx.send(frame).await.is_err() {
            self.pending.forget(req_id);
            return Err(ClientError::NotConnected);
        }

        rx.await.map_err(|_| ClientError::Cancelled)
    }

    /// Number of requests awaiting their response.
    pub fn pending_requests(&self) -> usize {
        self.pending.len()
    }

    /// Returns true while the driver task is running.
    pub fn is_connected(&self) -> bool {
        !self.out_tx.is_closed()
    }

    /// Shuts the connection down, cancelling outstanding requests.
    pub fn close(&self) {
        let _ = self.shutdown.send(true);
    }
}

async fn route_frame(raw: &str, pending: &PendingRequests, events: &mpsc::Sender<Event>) {
    match ServerFrame::decode(raw) {
        Ok(ServerFrame::Event(event)) => {
            if events.send(event).await.is_err() {
                tracing::debug!("event receiver dropped; event discarded");
            }
        }
        Ok(ServerFrame::Response(response)) => {
            let Some(req_id) = response.req_id else {
                tracing::warn!("response without req id discarded");
                return;
            };
            if let Err(error) = pending.complete(req_id, response) {
                tracing::warn!(%error, "unmatched response");
            }
        }
        Err(error) => {
            tracing::warn!(%error, "undecodable frame discarded");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;
    use synchub_protocol::Task;

    #[tokio::test]
    async fn responses_complete_out_of_order() {
        let (transport, mut remote) = MockTransport::pair();
        let (client, _events) = DuplexClient::connect(transport);

        // The server side: read both requests, answer them in reverse.
        let server = tokio::spawn(async move {
            let first = SyncRequest::decode(&remote.from_client.recv().await.unwrap()).unwrap();
            let second = SyncRequest::decode(&remote.from_client.recv().await.unwrap()).unwrap();
            for request in [second, first] {
                let mut response = SyncResponse::default();
                response.req_id = request.req_id;
                response.client_id = request.database.clone();
                remote
                    .to_client
                    .send(response.encode().unwrap())
                    .await
                    .unwrap();
            }
            remote
        });

        let (a, b) = tokio::join!(
            client.request(SyncRequest::new(vec![]).with_database("a")),
            client.request(SyncRequest::new(vec![]).with_database("b")),
        );
        let a = a.unwrap();
        let b = b.unwrap();
        // Each response found its own request despite reversed arrival.
        assert_eq!(a.client_id.as_deref(), Some("a"));
        assert_eq!(b.client_id.as_deref(), Some("b"));
        assert_ne!(a.req_id, b.req_id);
        assert!(client.pending_requests() == 0);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn connection_loss_cancels_pending() {
        let (transport, mut remote) = MockTransport::pair();
        let (client, _events) = DuplexClient::connect(transport);

        let pending = tokio::spawn(async move {
            // Swallow the request; never answer.
            let _ = remote.from_client.recv().await;
            drop(remote);
        });

        let err = client
            .request(SyncRequest::new(vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Cancelled));
        pending.await.unwrap();
    }

    #[tokio::test]
    async fn events_flow_to_the_event_stream() {
        let (transport, remote) = MockTransport::pair();
        let (_client, mut events) = DuplexClient::connect(transport);

        let event = Event {
            seq: 1,
            src_user: None,
            client_id: "c1".into(),
            tasks: vec![Task::SendMessage {
                name: "ping".into(),
                param: serde_json::Value::Null,
            }],
        };
        remote
            .to_client
            .send(event.encode().unwrap())
            .await
            .unwrap();

        let received = events.recv().await.unwrap();
        assert_eq!(received, event);
    }

    #[tokio::test]
    async fn unmatched_response_does_not_kill_connection() {
        let (transport, mut remote) = MockTransport::pair();
        let (client, _events) = DuplexClient::connect(transport);

        // A response nobody asked for.
        let mut bogus = SyncResponse::default();
        bogus.req_id = Some(999);
        remote
            .to_client
            .send(bogus.encode().unwrap())
            .await
            .unwrap();

        // The connection still serves a real request afterwards.
        let server = tokio::spawn(async move {
            let request = SyncRequest::decode(&remote.from_client.recv().await.unwrap()).unwrap();
            let mut response = SyncResponse::default();
            response.req_id = request.req_id;
            remote
                .to_client
                .send(response.encode().unwrap())
                .await
                .unwrap();
            remote
        });

        let response = client.request(SyncRequest::new(vec![])).await.unwrap();
        assert!(response.tasks.is_empty());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn close_disconnects() {
        let (transport, _remote) = MockTransport::pair();
        let (client, _events) = DuplexClient::connect(transport);
        assert!(client.is_connected());

        client.close();
        // The driver exits and drops its end of the outbound queue.
        tokio::task::yield_now().await;
        let err = client.request(SyncRequest::new(vec![])).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::NotConnected | ClientError::Cancelled
        ));
    }
}
