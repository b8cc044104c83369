//! Error types for the hub.

use thiserror::Error;

/// Result type for hub operations.
pub type HubResult<T> = Result<T, HubError>;

/// Whole-request failures from the hub.
///
/// A `HubError` means no task in the request executed; transport adapters
/// map it to the protocol's error response envelope. Per-task and
/// per-entity failures never surface here; they occupy result slots.
#[derive(Error, Debug)]
pub enum HubError {
    /// The request named a database this hub does not serve.
    #[error("unknown database: {0}")]
    UnknownDatabase(String),

    /// The request could not be interpreted.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}
