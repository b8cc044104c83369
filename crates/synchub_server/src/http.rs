//! HTTP adapter: one POST carries one request and yields one response.

use crate::error::ServerError;
use crate::server::ServerState;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use synchub_protocol::{ErrorResponse, SyncRequest};

/// Liveness probe.
pub(crate) async fn health() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/json")],
        concat!(r#"{"status":"ok","version":""#, env!("CARGO_PKG_VERSION"), "\"}"),
    )
}

/// `POST /sync`: decode one request, run it, encode one response.
///
/// There is no server push on this transport; queued events wait for the
/// client's WebSocket connection or its next acknowledgement.
pub(crate) async fn sync_handler(State(state): State<ServerState>, body: String) -> Response {
    if body.len() > state.config.max_frame_bytes {
        let err = ServerError::FrameTooLarge {
            size: body.len(),
            limit: state.config.max_frame_bytes,
        };
        return error_response(StatusCode::PAYLOAD_TOO_LARGE, &err.to_string());
    }

    let request = match SyncRequest::decode(&body) {
        Ok(request) => request,
        Err(error) => return error_response(StatusCode::BAD_REQUEST, &error.to_string()),
    };

    match state.hub.handle(request).await {
        Ok(response) => match response.encode() {
            Ok(json) => json_response(StatusCode::OK, json),
            Err(error) => {
                tracing::error!(%error, "response failed to encode");
                error_response(StatusCode::INTERNAL_SERVER_ERROR, &error.to_string())
            }
        },
        Err(error) => error_response(StatusCode::BAD_REQUEST, &error.to_string()),
    }
}

fn json_response(status: StatusCode, json: String) -> Response {
    (status, [(header::CONTENT_TYPE, "application/json")], json).into_response()
}

fn error_response(status: StatusCode, message: &str) -> Response {
    let body = ErrorResponse::new(message)
        .encode()
        .unwrap_or_else(|_| r#"{"message":"error response failed to encode"}"#.to_string());
    json_response(status, body)
}
