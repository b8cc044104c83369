//! Error types for the storage contract.

use thiserror::Error;

/// Result type for container operations.
pub type StoreResult<T> = Result<T, CommandError>;

/// A whole-task failure from the storage contract.
///
/// A `CommandError` fails the entire task; per-entity failures are instead
/// reported inside the success payload's error map and never surface here.
#[derive(Error, Debug)]
pub enum CommandError {
    /// The named container does not exist and cannot be created implicitly.
    #[error("unknown container: {0}")]
    UnknownContainer(String),

    /// The filter expression could not be interpreted by this backend.
    #[error("unsupported filter: {0}")]
    Filter(String),

    /// The continuation cursor was not produced by this backend.
    #[error("invalid cursor: {0}")]
    Cursor(String),

    /// The backend rejected the operation.
    #[error("storage error: {0}")]
    Storage(String),

    /// An I/O failure in the backend.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CommandError {
    /// Returns true if the failure stems from the request, not the backend.
    pub fn is_request_error(&self) -> bool {
        matches!(
            self,
            CommandError::UnknownContainer(_) | CommandError::Filter(_) | CommandError::Cursor(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_classification() {
        assert!(CommandError::Filter("no grammar".into()).is_request_error());
        assert!(!CommandError::Storage("disk".into()).is_request_error());
    }

    #[test]
    fn error_display() {
        let err = CommandError::UnknownContainer("orders".into());
        assert_eq!(err.to_string(), "unknown container: orders");
    }
}
