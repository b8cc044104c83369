//! WebSocket adapter: requests and events multiplexed on one connection.
//!
//! The server-to-client direction only ever carries solicited responses and
//! unsolicited events. One writer task owns the socket sink, so concurrent
//! event emission and response writes serialize through a single queue and
//! at most one send is in flight on the connection at a time.

use crate::server::ServerState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use synchub_engine::HubError;
use synchub_protocol::{ErrorResponse, ServerFrame, SyncRequest, SyncResponse, TaskError, TaskResult};
use tokio::sync::mpsc;

/// `GET /ws`: upgrades the connection and hands it to the driver.
pub(crate) async fn ws_handler(State(state): State<ServerState>, ws: WebSocketUpgrade) -> Response {
    ws.max_message_size(state.config.max_frame_bytes)
        .on_upgrade(move |socket| drive_connection(socket, state))
}

async fn drive_connection(socket: WebSocket, state: ServerState) {
    let (mut sink, mut stream) = socket.split();
    let capacity = state.config.event_channel_capacity;

    // Events arrive as frames from the dispatcher; responses arrive already
    // encoded from per-request tasks. Both funnel through the writer.
    let (event_tx, mut event_rx) = mpsc::channel::<ServerFrame>(capacity);
    let (reply_tx, mut reply_rx) = mpsc::channel::<String>(capacity);

    let writer = tokio::spawn(async move {
        loop {
            let text = tokio::select! {
                biased;
                reply = reply_rx.recv() => match reply {
                    Some(text) => text,
                    None => break,
                },
                event = event_rx.recv() => match event {
                    Some(frame) => match frame.encode() {
                        Ok(text) => text,
                        Err(error) => {
                            tracing::warn!(%error, "dropping unencodable event frame");
                            continue;
                        }
                    },
                    None => break,
                },
            };
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    let mut bound_client: Option<String> = None;
    while let Some(message) = stream.next().await {
        let Ok(message) = message else { break };
        let text = match message {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };

        let request = match SyncRequest::decode(&text) {
            Ok(request) => request,
            Err(error) => {
                send_error(&reply_tx, &error.to_string()).await;
                continue;
            }
        };
        if request.req_id.is_none() {
            send_error(&reply_tx, "duplex requests require a req id").await;
            continue;
        }

        if let Some(client_id) = request.client_id.as_deref() {
            if bound_client.as_deref() != Some(client_id) {
                if let Some(previous) = bound_client.take() {
                    state.hub.sessions().detach_target(&previous);
                }
                state.hub.sessions().bind_target(client_id, event_tx.clone());
                bound_client = Some(client_id.to_string());
            }
        }

        // Each request runs on its own task so a slow one never delays the
        // next; responses complete out of order and correlate by req id.
        let hub = Arc::clone(&state.hub);
        let reply = reply_tx.clone();
        tokio::spawn(async move {
            let req_id = request.req_id;
            let client_id = request.client_id.clone();
            let slots = request.tasks.len();
            let response = match hub.handle(request).await {
                Ok(response) => response,
                Err(error) => whole_request_failure(req_id, client_id, slots, &error),
            };
            match response.encode() {
                Ok(text) => {
                    let _ = reply.send(text).await;
                }
                Err(error) => tracing::error!(%error, "response failed to encode"),
            }
        });
    }

    if let Some(client_id) = bound_client {
        state.hub.sessions().detach_target(&client_id);
    }
    drop(reply_tx);
    drop(event_tx);
    let _ = writer.await;
}

async fn send_error(reply: &mpsc::Sender<String>, message: &str) {
    match ErrorResponse::new(message).encode() {
        Ok(text) => {
            let _ = reply.send(text).await;
        }
        Err(error) => tracing::error!(%error, "error response failed to encode"),
    }
}

/// Builds a correlated response for a request the hub rejected outright.
///
/// An uncorrelated error frame would leave the client's pending request
/// dangling, so the rejection fills every result slot instead; the slot
/// count still matches the request.
fn whole_request_failure(
    req_id: Option<u64>,
    client_id: Option<String>,
    slots: usize,
    error: &HubError,
) -> SyncResponse {
    let task_error = match error {
        HubError::UnknownDatabase(_) => TaskError::database(error.to_string()),
        HubError::InvalidRequest(_) => TaskError::invalid(error.to_string()),
    };
    let mut response = SyncResponse::new(vec![TaskResult::Error(task_error); slots]);
    response.req_id = req_id;
    response.client_id = client_id;
    response
}
