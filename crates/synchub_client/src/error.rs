//! Error types for the duplex client.

use synchub_protocol::ProtocolError;
use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur on a duplex connection.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Network or transport failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The peer violated the protocol (e.g. a response with an unknown
    /// correlation id).
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// The connection closed while the request was outstanding.
    #[error("request cancelled: connection closed")]
    Cancelled,

    /// The client is not connected.
    #[error("not connected")]
    NotConnected,

    /// A message failed to encode or decode.
    #[error("codec error: {0}")]
    Codec(#[from] ProtocolError),
}
