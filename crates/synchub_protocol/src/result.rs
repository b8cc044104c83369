//! The task result tagged union.

use crate::error::TaskError;
use crate::task::{Task, TaskKind};
use crate::EntityErrors;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Result of a create task.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CreateResult {
    /// Number of entities created.
    #[serde(default)]
    pub created: u64,
    /// Generated keys, in entity order, for entities that had none.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keys: Vec<String>,
    /// Per-entity failures; sibling entities still committed.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub errors: EntityErrors,
}

/// Result of an upsert task.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UpsertResult {
    /// Number of entities written.
    #[serde(default)]
    pub upserted: u64,
    /// Per-entity failures; sibling entities still committed.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub errors: EntityErrors,
}

/// Result of a read task.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReadResult {
    /// Entities found, in request id order.
    #[serde(default)]
    pub entities: Vec<Value>,
    /// Referenced entities, keyed by reference field name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub references: BTreeMap<String, Vec<Value>>,
    /// Per-entity failures (missing ids, malformed payloads).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub errors: EntityErrors,
}

/// Result of a query task.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QueryResult {
    /// Matching entities.
    #[serde(default)]
    pub entities: Vec<Value>,
    /// Continuation cursor when more results are available.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub cursor: Option<String>,
    /// Per-entity failures (malformed payloads).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub errors: EntityErrors,
}

/// Result of a patch task.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PatchResult {
    /// Number of entities patched.
    #[serde(default)]
    pub patched: u64,
    /// Per-entity failures; sibling patches still committed.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub errors: EntityErrors,
}

/// Result of a delete task.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DeleteResult {
    /// Number of entities deleted.
    #[serde(default)]
    pub deleted: u64,
    /// Per-entity failures; sibling deletes still committed.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub errors: EntityErrors,
}

/// Result of a message task.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MessageResult {
    /// Number of clients the message was fanned out to.
    #[serde(default)]
    pub receivers: u64,
}

/// Acknowledgement of a subscription task.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SubscribeResult {}

/// Result of a key reservation task.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReserveKeysResult {
    /// The reserved keys, unique within the container.
    #[serde(default)]
    pub keys: Vec<String>,
}

/// Outcome of one task, occupying the same slot index as its task.
///
/// Internally tagged with the same `"task"` discriminants as [`Task`], plus
/// an `"error"` tag for a whole-task failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "task")]
pub enum TaskResult {
    /// Create outcome.
    #[serde(rename = "create")]
    Create(CreateResult),
    /// Upsert outcome.
    #[serde(rename = "upsert")]
    Upsert(UpsertResult),
    /// Read outcome.
    #[serde(rename = "read")]
    Read(ReadResult),
    /// Query outcome.
    #[serde(rename = "query")]
    Query(QueryResult),
    /// Patch outcome.
    #[serde(rename = "patch")]
    Patch(PatchResult),
    /// Delete outcome.
    #[serde(rename = "delete")]
    Delete(DeleteResult),
    /// Message outcome.
    #[serde(rename = "message")]
    Message(MessageResult),
    /// Message-subscription acknowledgement.
    #[serde(rename = "subscribeMessage")]
    SubscribeMessage(SubscribeResult),
    /// Change-subscription acknowledgement.
    #[serde(rename = "subscribeChanges")]
    SubscribeChanges(SubscribeResult),
    /// Key reservation outcome.
    #[serde(rename = "reserveKeys")]
    ReserveKeys(ReserveKeysResult),
    /// Whole-task failure.
    #[serde(rename = "error")]
    Error(TaskError),
}

impl TaskResult {
    /// Returns true if this slot holds a whole-task failure.
    pub fn is_error(&self) -> bool {
        matches!(self, TaskResult::Error(_))
    }

    /// Returns the task error, if this slot holds one.
    pub fn as_error(&self) -> Option<&TaskError> {
        match self {
            TaskResult::Error(err) => Some(err),
            _ => None,
        }
    }

    /// Returns the per-entity error map of a success payload, if it has one.
    pub fn entity_errors(&self) -> Option<&EntityErrors> {
        match self {
            TaskResult::Create(r) => Some(&r.errors),
            TaskResult::Upsert(r) => Some(&r.errors),
            TaskResult::Read(r) => Some(&r.errors),
            TaskResult::Query(r) => Some(&r.errors),
            TaskResult::Patch(r) => Some(&r.errors),
            TaskResult::Delete(r) => Some(&r.errors),
            _ => None,
        }
    }

    /// Returns true if this result's variant matches the task's kind.
    ///
    /// An error result matches every task kind: any slot may fail.
    pub fn matches(&self, task: &Task) -> bool {
        let kind = match self {
            TaskResult::Create(_) => TaskKind::Create,
            TaskResult::Upsert(_) => TaskKind::Upsert,
            TaskResult::Read(_) => TaskKind::Read,
            TaskResult::Query(_) => TaskKind::Query,
            TaskResult::Patch(_) => TaskKind::Patch,
            TaskResult::Delete(_) => TaskKind::Delete,
            TaskResult::Message(_) => TaskKind::Message,
            TaskResult::SubscribeMessage(_) => TaskKind::SubscribeMessage,
            TaskResult::SubscribeChanges(_) => TaskKind::SubscribeChanges,
            TaskResult::ReserveKeys(_) => TaskKind::ReserveKeys,
            TaskResult::Error(_) => return true,
        };
        kind == task.kind()
    }
}

impl From<TaskError> for TaskResult {
    fn from(err: TaskError) -> Self {
        TaskResult::Error(err)
    }
}
