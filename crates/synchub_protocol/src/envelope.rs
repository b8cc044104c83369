//! Wire envelope types: request, response, error response, and event.
//!
//! Envelopes are stateless, self-contained messages: each is created per
//! call, encoded, and discarded. Field names on the wire are abbreviated
//! (`user`, `ack`, `req`, `clt`) and identical across transports.

use crate::error::{ProtocolError, ProtocolResult};
use crate::result::TaskResult;
use crate::task::Task;
use crate::ContainerErrors;
use serde::{Deserialize, Serialize};

/// A batch of tasks submitted by one client.
///
/// `tasks` order is significant and preserved in the response.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SyncRequest {
    /// Ordered list of tasks to execute.
    #[serde(default)]
    pub tasks: Vec<Task>,
    /// Id of the user issuing the request.
    #[serde(rename = "user", skip_serializing_if = "Option::is_none", default)]
    pub user_id: Option<String>,
    /// Authentication token, consumed by the authorizer hook.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub token: Option<String>,
    /// Highest event seq the client has durably received; trims its queue.
    #[serde(rename = "ack", skip_serializing_if = "Option::is_none", default)]
    pub event_ack: Option<u64>,
    /// Correlation id echoed on the response. Required on duplex transports.
    #[serde(rename = "req", skip_serializing_if = "Option::is_none", default)]
    pub req_id: Option<u64>,
    /// Client identity for subscriptions and event delivery.
    #[serde(rename = "clt", skip_serializing_if = "Option::is_none", default)]
    pub client_id: Option<String>,
    /// Target database; the hub default when absent.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub database: Option<String>,
}

impl SyncRequest {
    /// Creates a request carrying the given tasks.
    pub fn new(tasks: Vec<Task>) -> Self {
        Self {
            tasks,
            ..Self::default()
        }
    }

    /// Sets the client id.
    #[must_use]
    pub fn with_client(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Sets the user id.
    #[must_use]
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Sets the event acknowledgement.
    #[must_use]
    pub fn with_ack(mut self, ack: u64) -> Self {
        self.event_ack = Some(ack);
        self
    }

    /// Sets the target database.
    #[must_use]
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Encodes to a JSON string.
    pub fn encode(&self) -> ProtocolResult<String> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Encode(e.to_string()))
    }

    /// Decodes from a JSON string.
    pub fn decode(json: &str) -> ProtocolResult<Self> {
        serde_json::from_str(json).map_err(|e| ProtocolError::Decode(e.to_string()))
    }
}

/// The batch of per-task results answering one [`SyncRequest`].
///
/// `tasks[i]` corresponds to the request's `tasks[i]`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SyncResponse {
    /// Ordered list of task results, one per request task.
    #[serde(default)]
    pub tasks: Vec<TaskResult>,
    /// Correlation id echoed from the request.
    #[serde(rename = "req", skip_serializing_if = "Option::is_none", default)]
    pub req_id: Option<u64>,
    /// Client id echoed from the request.
    #[serde(rename = "clt", skip_serializing_if = "Option::is_none", default)]
    pub client_id: Option<String>,
    /// Per-container create failures aggregated across the batch.
    #[serde(
        rename = "createErrors",
        skip_serializing_if = "ContainerErrors::is_empty",
        default
    )]
    pub create_errors: ContainerErrors,
    /// Per-container upsert failures aggregated across the batch.
    #[serde(
        rename = "upsertErrors",
        skip_serializing_if = "ContainerErrors::is_empty",
        default
    )]
    pub upsert_errors: ContainerErrors,
}

impl SyncResponse {
    /// Creates a response carrying the given results.
    pub fn new(tasks: Vec<TaskResult>) -> Self {
        Self {
            tasks,
            ..Self::default()
        }
    }

    /// Encodes to a JSON string.
    pub fn encode(&self) -> ProtocolResult<String> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Encode(e.to_string()))
    }

    /// Decodes from a JSON string.
    pub fn decode(json: &str) -> ProtocolResult<Self> {
        serde_json::from_str(json).map_err(|e| ProtocolError::Decode(e.to_string()))
    }
}

/// Whole-request rejection, sent when no task executed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// What went wrong.
    pub message: String,
}

impl ErrorResponse {
    /// Creates an error response.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Encodes to a JSON string.
    pub fn encode(&self) -> ProtocolResult<String> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Encode(e.to_string()))
    }

    /// Decodes from a JSON string.
    pub fn decode(json: &str) -> ProtocolResult<Self> {
        serde_json::from_str(json).map_err(|e| ProtocolError::Decode(e.to_string()))
    }
}

/// A change or message notification pushed to one subscribed client.
///
/// An event carries the tasks that caused it, so clients replay change
/// events with the same decoder they use for requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Per-client sequence number; strictly increasing by 1 from 1.
    pub seq: u64,
    /// User whose request caused the event.
    #[serde(rename = "src", skip_serializing_if = "Option::is_none", default)]
    pub src_user: Option<String>,
    /// Client the event is addressed to.
    #[serde(rename = "clt")]
    pub client_id: String,
    /// The causing tasks.
    pub tasks: Vec<Task>,
}

impl Event {
    /// Encodes to a JSON string.
    pub fn encode(&self) -> ProtocolResult<String> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Encode(e.to_string()))
    }

    /// Decodes from a JSON string.
    pub fn decode(json: &str) -> ProtocolResult<Self> {
        serde_json::from_str(json).map_err(|e| ProtocolError::Decode(e.to_string()))
    }
}

/// One frame in the server→client direction of a duplex connection.
///
/// The duplex direction only ever carries unsolicited events and solicited
/// responses. The two are distinguished structurally: an event always has a
/// `seq` field, a response never does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerFrame {
    /// An unsolicited subscription event.
    Event(Event),
    /// A response to a correlated request.
    Response(SyncResponse),
}

impl ServerFrame {
    /// Encodes to a JSON string.
    pub fn encode(&self) -> ProtocolResult<String> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Encode(e.to_string()))
    }

    /// Decodes from a JSON string.
    pub fn decode(json: &str) -> ProtocolResult<Self> {
        serde_json::from_str(json).map_err(|e| ProtocolError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TaskError;
    use crate::result::MessageResult;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn unknown_task_kind_does_not_fail_the_request() {
        let request = SyncRequest::decode(
            r#"{"tasks":[{"task":"teleport","container":"x"},{"task":"delete","container":"c","all":true}]}"#,
        )
        .unwrap();
        assert_eq!(request.tasks[0], Task::Unrecognized);
        assert!(matches!(request.tasks[1], Task::DeleteEntities { .. }));
    }

    #[test]
    fn request_wire_names() {
        let req = SyncRequest::new(vec![Task::SendMessage {
            name: "ping".into(),
            param: serde_json::Value::Null,
        }])
        .with_user("alice")
        .with_client("c1")
        .with_ack(7);

        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["user"], "alice");
        assert_eq!(json["clt"], "c1");
        assert_eq!(json["ack"], 7);
        assert!(json.get("req").is_none());
        assert!(json.get("database").is_none());

        let back = SyncRequest::decode(&req.encode().unwrap()).unwrap();
        assert_eq!(back, req);
    }

    #[test]
    fn response_preserves_slot_order() {
        let resp = SyncResponse::new(vec![
            TaskResult::Message(MessageResult { receivers: 2 }),
            TaskResult::Error(TaskError::invalid("bad")),
        ]);
        let back = SyncResponse::decode(&resp.encode().unwrap()).unwrap();
        assert_eq!(back.tasks.len(), 2);
        assert!(!back.tasks[0].is_error());
        assert!(back.tasks[1].is_error());
    }

    #[test]
    fn malformed_request_is_decode_error() {
        let err = SyncRequest::decode("{\"tasks\": [{\"task\": 42}]}").unwrap_err();
        assert!(matches!(err, ProtocolError::Decode(_)));
    }

    #[test]
    fn frame_disambiguation() {
        let event = Event {
            seq: 1,
            src_user: None,
            client_id: "c1".into(),
            tasks: vec![],
        };
        let frame = ServerFrame::decode(&event.encode().unwrap()).unwrap();
        assert!(matches!(frame, ServerFrame::Event(_)));

        let mut resp = SyncResponse::new(vec![]);
        resp.req_id = Some(5);
        let frame = ServerFrame::decode(&resp.encode().unwrap()).unwrap();
        match frame {
            ServerFrame::Response(r) => assert_eq!(r.req_id, Some(5)),
            other => panic!("expected response frame, got {other:?}"),
        }
    }

    #[test]
    fn event_roundtrip_with_tasks() {
        let event = Event {
            seq: 3,
            src_user: Some("alice".into()),
            client_id: "c2".into(),
            tasks: vec![Task::CreateEntities {
                container: "orders".into(),
                entities: vec![json!({"id": "o1"})],
                key_name: None,
            }],
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["src"], "alice");
        assert_eq!(json["clt"], "c2");
        assert_eq!(json["tasks"][0]["task"], "create");

        let back = Event::decode(&event.encode().unwrap()).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn error_response_shape() {
        let resp = ErrorResponse::new("unknown database: nope");
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json, json!({"message": "unknown database: nope"}));
    }

    proptest! {
        #[test]
        fn request_roundtrips(
            name in "[a-z][a-z0-9_]{0,12}",
            ack in proptest::option::of(0u64..10_000),
            req in proptest::option::of(0u64..10_000),
        ) {
            let request = SyncRequest {
                tasks: vec![Task::SendMessage {
                    name,
                    param: serde_json::Value::Null,
                }],
                event_ack: ack,
                req_id: req,
                ..SyncRequest::default()
            };
            let back = SyncRequest::decode(&request.encode().unwrap()).unwrap();
            prop_assert_eq!(back, request);
        }
    }
}
