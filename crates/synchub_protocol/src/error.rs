//! Error taxonomies for tasks and entities.
//!
//! Two deliberately separate taxonomies with different propagation scope:
//! a [`TaskError`] invalidates exactly one task's result slot inside an
//! otherwise successful batch, while an [`EntityError`] invalidates exactly
//! one entity's slot inside an otherwise successful task. Sibling tasks and
//! sibling entities are never affected.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for protocol encode/decode operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while encoding or decoding wire messages.
///
/// These are transport-level failures: a request that fails to decode is
/// rejected as a whole before any task executes.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The payload could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// The message could not be encoded.
    #[error("encode error: {0}")]
    Encode(String),
}

/// Classifies a failure that invalidates one whole task slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskErrorKind {
    /// The task was malformed or missing required fields; it was rejected
    /// before reaching the container contract.
    InvalidTask,
    /// The authorizer rejected the task.
    PermissionDenied,
    /// The storage contract reported a failure for the whole task.
    DatabaseError,
    /// The query filter could not be interpreted.
    FilterError,
    /// The task failed schema or shape validation.
    ValidationError,
    /// A command-level failure outside the storage contract.
    CommandError,
    /// An exception escaped task execution and was caught at the executor
    /// boundary.
    UnhandledException,
    /// The task kind is not supported by this hub.
    NotImplemented,
    /// A synchronization-layer failure (event delivery, session state).
    SyncError,
}

/// A failure scoped to one whole task inside an otherwise successful batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskError {
    /// What went wrong.
    pub kind: TaskErrorKind,
    /// Human-readable description.
    pub message: String,
    /// Stacktrace, attached only when the hub is configured to reveal it.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub stacktrace: Option<String>,
}

impl TaskError {
    /// Creates a task error of the given kind.
    pub fn new(kind: TaskErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            stacktrace: None,
        }
    }

    /// Creates an `InvalidTask` error.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(TaskErrorKind::InvalidTask, message)
    }

    /// Creates a `PermissionDenied` error.
    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(TaskErrorKind::PermissionDenied, message)
    }

    /// Creates a `DatabaseError` from a storage-contract failure.
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(TaskErrorKind::DatabaseError, message)
    }

    /// Creates a `FilterError`.
    pub fn filter(message: impl Into<String>) -> Self {
        Self::new(TaskErrorKind::FilterError, message)
    }

    /// Creates a `NotImplemented` error for the named task kind.
    pub fn not_implemented(name: impl Into<String>) -> Self {
        Self::new(
            TaskErrorKind::NotImplemented,
            format!("task not implemented: {}", name.into()),
        )
    }

    /// Creates an `UnhandledException` error.
    pub fn unhandled(message: impl Into<String>) -> Self {
        Self::new(TaskErrorKind::UnhandledException, message)
    }

    /// Attaches a stacktrace.
    #[must_use]
    pub fn with_stacktrace(mut self, stacktrace: impl Into<String>) -> Self {
        self.stacktrace = Some(stacktrace.into());
        self
    }

    /// Returns true if the task was rejected before reaching storage.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self.kind,
            TaskErrorKind::InvalidTask
                | TaskErrorKind::PermissionDenied
                | TaskErrorKind::NotImplemented
        )
    }
}

impl std::fmt::Display for TaskError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

/// Classifies a failure that invalidates one entity slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityErrorKind {
    /// The stored payload was not well-formed JSON of the expected shape.
    Parse,
    /// The entity could not be read.
    Read,
    /// The entity could not be written (e.g. create of an existing id).
    Write,
    /// The entity could not be deleted.
    Delete,
    /// The patch could not be applied.
    Patch,
}

/// A failure scoped to one entity inside an otherwise successful task.
///
/// Sibling entities in the same task still commit; the error occupies only
/// this entity's slot in the task result's error map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityError {
    /// What went wrong.
    pub kind: EntityErrorKind,
    /// Id of the failed entity.
    pub id: String,
    /// Container the entity belongs to.
    pub container: String,
    /// Human-readable description.
    pub message: String,
    /// Set when this entity failed because an earlier task errored.
    #[serde(rename = "causedByTaskError", skip_serializing_if = "Option::is_none", default)]
    pub caused_by_task_error: Option<TaskErrorKind>,
    /// Stacktrace, attached only when the hub is configured to reveal it.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub stacktrace: Option<String>,
}

impl EntityError {
    /// Creates an entity error of the given kind.
    pub fn new(
        kind: EntityErrorKind,
        id: impl Into<String>,
        container: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            id: id.into(),
            container: container.into(),
            message: message.into(),
            caused_by_task_error: None,
            stacktrace: None,
        }
    }

    /// Creates a `Parse` error for a payload that failed shape validation.
    pub fn parse(
        id: impl Into<String>,
        container: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(EntityErrorKind::Parse, id, container, message)
    }

    /// Creates a `Read` error.
    pub fn read(
        id: impl Into<String>,
        container: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(EntityErrorKind::Read, id, container, message)
    }

    /// Creates a `Write` error.
    pub fn write(
        id: impl Into<String>,
        container: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(EntityErrorKind::Write, id, container, message)
    }

    /// Creates a `Delete` error.
    pub fn delete(
        id: impl Into<String>,
        container: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(EntityErrorKind::Delete, id, container, message)
    }

    /// Creates a `Patch` error.
    pub fn patch(
        id: impl Into<String>,
        container: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(EntityErrorKind::Patch, id, container, message)
    }
}

impl std::fmt::Display for EntityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:?} error for '{}' in '{}': {}",
            self.kind, self.id, self.container, self.message
        )
    }
}
