//! The task tagged union and pre-dispatch validation.

use crate::error::TaskError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The kind of change a mutation task applies, as used by change
/// subscriptions to narrow which mutations they observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChangeType {
    /// Entity creation.
    Create,
    /// Entity upsert.
    Upsert,
    /// Entity deletion.
    Delete,
    /// Entity patch.
    Patch,
}

/// Discriminates the task variants without carrying their payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    /// `CreateEntities`.
    Create,
    /// `UpsertEntities`.
    Upsert,
    /// `ReadEntities`.
    Read,
    /// `QueryEntities`.
    Query,
    /// `PatchEntities`.
    Patch,
    /// `DeleteEntities`.
    Delete,
    /// `SendMessage`.
    Message,
    /// `SubscribeMessage`.
    SubscribeMessage,
    /// `SubscribeChanges`.
    SubscribeChanges,
    /// `ReserveKeys`.
    ReserveKeys,
    /// Any tag outside the fixed mapping.
    Unrecognized,
}

impl TaskKind {
    /// Returns true for tasks that mutate container state.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            TaskKind::Create | TaskKind::Upsert | TaskKind::Patch | TaskKind::Delete
        )
    }

    /// Returns true for the message-send task.
    pub fn is_message(&self) -> bool {
        matches!(self, TaskKind::Message)
    }

    /// Returns true for tasks that only mutate subscription state.
    pub fn is_subscription(&self) -> bool {
        matches!(self, TaskKind::SubscribeMessage | TaskKind::SubscribeChanges)
    }

    /// Returns the change type this mutation emits, if any.
    pub fn change_type(&self) -> Option<ChangeType> {
        match self {
            TaskKind::Create => Some(ChangeType::Create),
            TaskKind::Upsert => Some(ChangeType::Upsert),
            TaskKind::Delete => Some(ChangeType::Delete),
            TaskKind::Patch => Some(ChangeType::Patch),
            _ => None,
        }
    }
}

/// One operation inside a batch request.
///
/// Tasks are internally tagged on the wire: each object carries a `"task"`
/// field selecting the variant. The tag→variant mapping is fixed at compile
/// time; an unknown tag decodes to [`Task::Unrecognized`] so the rest of
/// the batch still decodes, and that slot alone resolves to a
/// `NotImplemented` error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "task")]
pub enum Task {
    /// Creates entities; fails per entity when the id already exists.
    #[serde(rename = "create")]
    CreateEntities {
        /// Target container.
        container: String,
        /// Entities to create, as JSON objects.
        #[serde(default)]
        entities: Vec<Value>,
        /// Field under which generated keys are stored; `"id"` when absent.
        #[serde(rename = "keyName", skip_serializing_if = "Option::is_none", default)]
        key_name: Option<String>,
    },

    /// Creates or replaces entities.
    #[serde(rename = "upsert")]
    UpsertEntities {
        /// Target container.
        container: String,
        /// Entities to upsert, as JSON objects.
        #[serde(default)]
        entities: Vec<Value>,
    },

    /// Reads entities by id, optionally expanding reference fields.
    #[serde(rename = "read")]
    ReadEntities {
        /// Target container.
        container: String,
        /// Ids to read. Empty reads nothing and succeeds.
        #[serde(default)]
        ids: Vec<String>,
        /// Names of fields whose values are ids of entities to also return.
        #[serde(default)]
        references: Vec<String>,
    },

    /// Queries entities by filter.
    #[serde(rename = "query")]
    QueryEntities {
        /// Target container.
        container: String,
        /// Backend-interpreted filter expression. Empty matches nothing.
        #[serde(default)]
        filter: String,
        /// Continuation cursor from a previous query result.
        #[serde(skip_serializing_if = "Option::is_none", default)]
        cursor: Option<String>,
        /// Maximum number of entities to return.
        #[serde(skip_serializing_if = "Option::is_none", default)]
        limit: Option<u64>,
    },

    /// Applies partial updates; each patch object names its target id.
    #[serde(rename = "patch")]
    PatchEntities {
        /// Target container.
        container: String,
        /// Patch objects; top-level fields are merged into the entity.
        #[serde(default)]
        patches: Vec<Value>,
    },

    /// Deletes entities by id, or the whole container with `all`.
    #[serde(rename = "delete")]
    DeleteEntities {
        /// Target container.
        container: String,
        /// Ids to delete. Must be empty when `all` is set.
        #[serde(default)]
        ids: Vec<String>,
        /// Deletes every entity in the container.
        #[serde(default)]
        all: bool,
    },

    /// Sends a named message to subscribed clients.
    #[serde(rename = "message")]
    SendMessage {
        /// Message name, matched against subscription prefixes.
        name: String,
        /// Arbitrary message parameter.
        #[serde(default)]
        param: Value,
    },

    /// Subscribes (or unsubscribes) the requesting client to message names.
    #[serde(rename = "subscribeMessage")]
    SubscribeMessage {
        /// Name or prefix to match. A trailing `*` matches any name with
        /// the given prefix; the empty string matches every message.
        #[serde(default)]
        name: String,
        /// Removes the subscription instead of adding it. An empty `name`
        /// with `remove` clears all message subscriptions for the client.
        #[serde(default)]
        remove: bool,
    },

    /// Subscribes the requesting client to container changes.
    #[serde(rename = "subscribeChanges")]
    SubscribeChanges {
        /// Container to observe.
        container: String,
        /// Which mutation kinds to observe. Empty removes the subscription.
        #[serde(rename = "changeTypes", default)]
        change_types: Vec<ChangeType>,
        /// Optional backend-interpreted filter narrowing observed entities.
        #[serde(skip_serializing_if = "Option::is_none", default)]
        filter: Option<String>,
    },

    /// Reserves a block of unique keys in a container.
    #[serde(rename = "reserveKeys")]
    ReserveKeys {
        /// Target container.
        container: String,
        /// Number of keys to reserve; must be at least 1.
        count: u64,
    },

    /// A task whose `"task"` tag is outside the fixed mapping.
    ///
    /// The payload is discarded; the hub answers the slot with a
    /// `NotImplemented` error while sibling tasks run.
    #[serde(other, rename = "unrecognized")]
    Unrecognized,
}

impl Task {
    /// Returns the discriminant for this task.
    pub fn kind(&self) -> TaskKind {
        match self {
            Task::CreateEntities { .. } => TaskKind::Create,
            Task::UpsertEntities { .. } => TaskKind::Upsert,
            Task::ReadEntities { .. } => TaskKind::Read,
            Task::QueryEntities { .. } => TaskKind::Query,
            Task::PatchEntities { .. } => TaskKind::Patch,
            Task::DeleteEntities { .. } => TaskKind::Delete,
            Task::SendMessage { .. } => TaskKind::Message,
            Task::SubscribeMessage { .. } => TaskKind::SubscribeMessage,
            Task::SubscribeChanges { .. } => TaskKind::SubscribeChanges,
            Task::ReserveKeys { .. } => TaskKind::ReserveKeys,
            Task::Unrecognized => TaskKind::Unrecognized,
        }
    }

    /// Returns the human-readable task name (its wire tag).
    pub fn name(&self) -> &'static str {
        match self {
            Task::CreateEntities { .. } => "create",
            Task::UpsertEntities { .. } => "upsert",
            Task::ReadEntities { .. } => "read",
            Task::QueryEntities { .. } => "query",
            Task::PatchEntities { .. } => "patch",
            Task::DeleteEntities { .. } => "delete",
            Task::SendMessage { .. } => "message",
            Task::SubscribeMessage { .. } => "subscribeMessage",
            Task::SubscribeChanges { .. } => "subscribeChanges",
            Task::ReserveKeys { .. } => "reserveKeys",
            Task::Unrecognized => "unrecognized",
        }
    }

    /// Returns the container this task targets, if it targets one.
    pub fn container(&self) -> Option<&str> {
        match self {
            Task::CreateEntities { container, .. }
            | Task::UpsertEntities { container, .. }
            | Task::ReadEntities { container, .. }
            | Task::QueryEntities { container, .. }
            | Task::PatchEntities { container, .. }
            | Task::DeleteEntities { container, .. }
            | Task::SubscribeChanges { container, .. }
            | Task::ReserveKeys { container, .. } => Some(container.as_str()),
            Task::SendMessage { .. } | Task::SubscribeMessage { .. } | Task::Unrecognized => None,
        }
    }

    /// Validates the task before dispatch.
    ///
    /// A task missing its container or a required field fails with
    /// `InvalidTask` and never reaches the container contract.
    pub fn validate(&self) -> Result<(), TaskError> {
        if let Some(container) = self.container() {
            if container.is_empty() {
                return Err(TaskError::invalid(format!(
                    "task '{}' is missing its container",
                    self.name()
                )));
            }
        }

        match self {
            Task::DeleteEntities { ids, all, .. } => {
                // Exactly one of non-empty ids or all=true.
                if *all && !ids.is_empty() {
                    return Err(TaskError::invalid(
                        "delete task must not combine ids with all",
                    ));
                }
                if !*all && ids.is_empty() {
                    return Err(TaskError::invalid(
                        "delete task requires ids or all",
                    ));
                }
            }
            Task::SendMessage { name, .. } => {
                if name.is_empty() {
                    return Err(TaskError::invalid("message task requires a name"));
                }
            }
            Task::ReserveKeys { count, .. } => {
                if *count == 0 {
                    return Err(TaskError::invalid(
                        "reserveKeys task requires a count of at least 1",
                    ));
                }
            }
            _ => {}
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn create_wire_shape() {
        let task = Task::CreateEntities {
            container: "items".into(),
            entities: vec![json!({"id": "1", "v": 1})],
            key_name: None,
        };
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["task"], "create");
        assert_eq!(json["container"], "items");
        assert!(json.get("keyName").is_none());

        let back: Task = serde_json::from_value(json).unwrap();
        assert_eq!(back, task);
    }

    #[test]
    fn unknown_tag_decodes_to_unrecognized() {
        let task: Task =
            serde_json::from_value(json!({"task": "teleport", "container": "x"})).unwrap();
        assert_eq!(task, Task::Unrecognized);
        assert_eq!(task.kind(), TaskKind::Unrecognized);
        assert!(!task.kind().is_mutation());
        assert!(task.validate().is_ok(), "the slot is answered at execution");
    }

    #[test]
    fn missing_tag_fails_decode() {
        assert!(serde_json::from_value::<Task>(json!({"container": "x"})).is_err());
    }

    #[test]
    fn optional_fields_default() {
        let task: Task =
            serde_json::from_value(json!({"task": "query", "container": "items"})).unwrap();
        match task {
            Task::QueryEntities { filter, cursor, limit, .. } => {
                assert!(filter.is_empty());
                assert!(cursor.is_none());
                assert!(limit.is_none());
            }
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn missing_container_is_invalid() {
        let task = Task::ReadEntities {
            container: String::new(),
            ids: vec!["1".into()],
            references: vec![],
        };
        let err = task.validate().unwrap_err();
        assert_eq!(err.kind, crate::TaskErrorKind::InvalidTask);
    }

    #[test]
    fn delete_requires_exactly_one_selector() {
        let both = Task::DeleteEntities {
            container: "c".into(),
            ids: vec!["1".into()],
            all: true,
        };
        assert!(both.validate().is_err());

        let neither = Task::DeleteEntities {
            container: "c".into(),
            ids: vec![],
            all: false,
        };
        assert!(neither.validate().is_err());

        let ids_only = Task::DeleteEntities {
            container: "c".into(),
            ids: vec!["1".into()],
            all: false,
        };
        assert!(ids_only.validate().is_ok());

        let all_only = Task::DeleteEntities {
            container: "c".into(),
            ids: vec![],
            all: true,
        };
        assert!(all_only.validate().is_ok());
    }

    #[test]
    fn kind_classification() {
        assert!(TaskKind::Create.is_mutation());
        assert!(TaskKind::Delete.is_mutation());
        assert!(!TaskKind::Read.is_mutation());
        assert!(TaskKind::Message.is_message());
        assert!(TaskKind::SubscribeMessage.is_subscription());
        assert_eq!(TaskKind::Patch.change_type(), Some(ChangeType::Patch));
        assert_eq!(TaskKind::Query.change_type(), None);
    }

    #[test]
    fn subscribe_changes_wire_shape() {
        let task = Task::SubscribeChanges {
            container: "orders".into(),
            change_types: vec![ChangeType::Create, ChangeType::Delete],
            filter: None,
        };
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["task"], "subscribeChanges");
        assert_eq!(json["changeTypes"], serde_json::json!(["create", "delete"]));
    }
}
