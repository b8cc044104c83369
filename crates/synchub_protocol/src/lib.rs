//! # SyncHub Protocol
//!
//! Task, result, and wire envelope types for the SyncHub protocol.
//!
//! This crate provides:
//! - `Task`: the tagged union of batch operations (create, upsert, read,
//!   query, patch, delete, message, subscribe, reserve keys)
//! - `TaskResult`: the matching tagged union of per-task outcomes
//! - `TaskError` / `EntityError`: the two error taxonomies
//! - `SyncRequest` / `SyncResponse` / `Event`: the wire envelope
//!
//! This is a pure protocol crate with no I/O operations. Encoding is JSON;
//! every task and result object carries a `"task"` discriminant field, and
//! the tag→type mapping is fixed at compile time through serde's internally
//! tagged enum support. An unknown task tag decodes to
//! [`Task::Unrecognized`] so the surrounding batch still decodes.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod envelope;
mod error;
mod result;
mod task;

pub use envelope::{ErrorResponse, Event, ServerFrame, SyncRequest, SyncResponse};
pub use error::{
    EntityError, EntityErrorKind, ProtocolError, ProtocolResult, TaskError, TaskErrorKind,
};
pub use result::{
    CreateResult, DeleteResult, MessageResult, PatchResult, QueryResult, ReadResult,
    ReserveKeysResult, SubscribeResult, TaskResult, UpsertResult,
};
pub use task::{ChangeType, Task, TaskKind};

/// Map of entity id to the error that failed it, keyed in stable order.
pub type EntityErrors = std::collections::BTreeMap<String, EntityError>;

/// Per-container map of per-entity errors, as carried on the response
/// envelope (`createErrors` / `upsertErrors`).
pub type ContainerErrors = std::collections::BTreeMap<String, EntityErrors>;
