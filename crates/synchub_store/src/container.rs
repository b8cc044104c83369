//! Entity container contract.

use crate::error::StoreResult;
use async_trait::async_trait;
use serde_json::Value;
use synchub_protocol::{
    CreateResult, DeleteResult, PatchResult, QueryResult, ReadResult, ReserveKeysResult,
    UpsertResult,
};

/// Per-request context threaded into every container call.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    /// Name of the database the request targets.
    pub database: String,
    /// Id of the user issuing the request, when known.
    pub user_id: Option<String>,
}

impl ExecutionContext {
    /// Creates a context for the given database.
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            user_id: None,
        }
    }

    /// Sets the requesting user.
    #[must_use]
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

/// The abstract storage interface each entity task executes against.
///
/// Containers are **opaque entity stores**: the hub owns task semantics,
/// validation, and event fan-out; implementations own persistence and any
/// backend-level concurrency control. Implementations must be `Send + Sync`
/// because multiple requests execute concurrently against one database.
///
/// # Partial failure
///
/// Every operation may return a *partial* result: an overall
/// [`CommandError`](crate::CommandError) fails the whole task, while a
/// success payload may carry per-id `EntityError`s for entities that failed
/// individually. Entities without an error slot are committed.
///
/// # Read-your-write
///
/// The executor awaits operations strictly in task order, so a container
/// observes task *i*'s mutation before task *i+1* is issued. Whether task
/// *i+1* *reads* that write is this contract's responsibility: it is
/// guaranteed only when the implementation applies mutations synchronously
/// before returning (as [`InMemoryContainer`](crate::InMemoryContainer)
/// does). Remote or write-behind backends must document their own
/// visibility window.
#[async_trait]
pub trait EntityContainer: Send + Sync {
    /// Creates entities, failing per entity when its id already exists.
    ///
    /// Entities without a key get one generated and reported in the
    /// result's `keys`; `key_name` overrides the `"id"` key field.
    async fn create(
        &self,
        container: &str,
        entities: Vec<Value>,
        key_name: Option<&str>,
        ctx: &ExecutionContext,
    ) -> StoreResult<CreateResult>;

    /// Creates or replaces entities.
    async fn upsert(
        &self,
        container: &str,
        entities: Vec<Value>,
        ctx: &ExecutionContext,
    ) -> StoreResult<UpsertResult>;

    /// Reads entities by id, expanding the named reference fields.
    async fn read(
        &self,
        container: &str,
        ids: &[String],
        references: &[String],
        ctx: &ExecutionContext,
    ) -> StoreResult<ReadResult>;

    /// Queries entities with a backend-interpreted filter.
    async fn query(
        &self,
        container: &str,
        filter: &str,
        cursor: Option<&str>,
        limit: Option<u64>,
        ctx: &ExecutionContext,
    ) -> StoreResult<QueryResult>;

    /// Applies partial updates; each patch names its target id.
    async fn patch(
        &self,
        container: &str,
        patches: Vec<Value>,
        ctx: &ExecutionContext,
    ) -> StoreResult<PatchResult>;

    /// Deletes entities by id, or every entity when `all` is set.
    async fn delete(
        &self,
        container: &str,
        ids: &[String],
        all: bool,
        ctx: &ExecutionContext,
    ) -> StoreResult<DeleteResult>;

    /// Reserves `count` keys unique within the container.
    async fn reserve_keys(
        &self,
        container: &str,
        count: u64,
        ctx: &ExecutionContext,
    ) -> StoreResult<ReserveKeysResult>;

    /// Whether payloads returned by `read`/`query` are guaranteed to be
    /// well-formed JSON.
    ///
    /// When this returns false (file-backed stores), the executor
    /// shape-checks returned entities and converts malformed slots into
    /// per-entity `Parse` errors without discarding the batch.
    fn self_validating_json(&self) -> bool {
        true
    }
}
