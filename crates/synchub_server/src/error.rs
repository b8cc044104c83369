//! Error types for the transport adapters.

use synchub_engine::HubError;
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the transport adapters.
#[derive(Error, Debug)]
pub enum ServerError {
    /// The request body did not decode as a sync request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The request was rejected by the hub before any task executed.
    #[error(transparent)]
    Hub(#[from] HubError),

    /// The request body exceeded the configured frame limit.
    #[error("frame too large: {size} bytes exceeds limit of {limit}")]
    FrameTooLarge {
        /// Size of the offending frame.
        size: usize,
        /// Configured maximum frame size.
        limit: usize,
    },

    /// I/O error while binding or serving.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ServerError::InvalidRequest(_)
                | ServerError::Hub(_)
                | ServerError::FrameTooLarge { .. }
        )
    }

    /// Returns true if this is a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        matches!(self, ServerError::Io(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_classification() {
        assert!(ServerError::InvalidRequest("bad".into()).is_client_error());
        assert!(ServerError::Hub(HubError::UnknownDatabase("nope".into())).is_client_error());
        assert!(!ServerError::InvalidRequest("bad".into()).is_server_error());
    }

    #[test]
    fn error_display() {
        let err = ServerError::FrameTooLarge {
            size: 2048,
            limit: 1024,
        };
        let msg = err.to_string();
        assert!(msg.contains("2048"));
        assert!(msg.contains("1024"));
    }
}
