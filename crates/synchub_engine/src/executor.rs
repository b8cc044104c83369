//! Task batch execution with task-level failure isolation.

use crate::config::HubConfig;
use crate::dispatcher::EventDispatcher;
use crate::registry::SubscriptionRegistry;
use crate::session::ClientSessions;
use futures::FutureExt;
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use synchub_protocol::{
    EntityError, EntityErrors, MessageResult, QueryResult, ReadResult, SubscribeResult, Task,
    TaskError, TaskErrorKind, TaskResult,
};
use synchub_store::{CommandError, EntityContainer, ExecutionContext};

/// Where the executor is in its per-request state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorState {
    /// The batch was received but no task has started.
    Received,
    /// The task at this index is executing.
    Executing(usize),
    /// Every task has a result slot.
    Completed,
}

/// Outcome of executing one batch.
#[derive(Debug)]
pub struct BatchOutcome {
    /// Per-task results; slot *i* answers task *i*.
    pub results: Vec<TaskResult>,
    /// Number of events fanned out to subscribers while executing.
    pub events_dispatched: u64,
}

/// Executes an ordered batch of tasks against one database.
///
/// The executor is pure per-request state: it holds no locks of its own and
/// requires none across requests. Tasks run strictly in order; task *i* may
/// observe the side effects of tasks *0..i-1*, and a failure at any slot
/// never aborts or skips sibling tasks. A panic escaping a task is caught
/// at this boundary, converted to an `UnhandledException` result for that
/// slot only, and execution proceeds.
pub struct TaskBatchExecutor<'a> {
    container: &'a dyn EntityContainer,
    registry: &'a SubscriptionRegistry,
    dispatcher: &'a EventDispatcher,
    sessions: &'a ClientSessions,
    config: &'a HubConfig,
    ctx: ExecutionContext,
    client_id: Option<String>,
    token: Option<String>,
    state: ExecutorState,
}

impl<'a> TaskBatchExecutor<'a> {
    /// Creates an executor for one request.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        container: &'a dyn EntityContainer,
        registry: &'a SubscriptionRegistry,
        dispatcher: &'a EventDispatcher,
        sessions: &'a ClientSessions,
        config: &'a HubConfig,
        ctx: ExecutionContext,
        client_id: Option<String>,
        token: Option<String>,
    ) -> Self {
        Self {
            container,
            registry,
            dispatcher,
            sessions,
            config,
            ctx,
            client_id,
            token,
            state: ExecutorState::Received,
        }
    }

    /// Returns the executor's current state.
    pub fn state(&self) -> ExecutorState {
        self.state
    }

    /// Executes the batch, producing one result slot per task.
    pub async fn execute(&mut self, tasks: &[Task]) -> BatchOutcome {
        let mut results = Vec::with_capacity(tasks.len());
        let mut events_dispatched = 0u64;

        for (index, task) in tasks.iter().enumerate() {
            self.state = ExecutorState::Executing(index);
            tracing::debug!(index, task = task.name(), "executing task");

            let result = match AssertUnwindSafe(self.execute_one(task)).catch_unwind().await {
                Ok(result) => result,
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    tracing::error!(index, task = task.name(), message, "task panicked");
                    let mut error = TaskError::unhandled(message);
                    if self.config.reveal_stacktraces {
                        error = error.with_stacktrace(format!(
                            "panic while executing task '{}' at index {index}",
                            task.name()
                        ));
                    }
                    TaskResult::Error(error)
                }
            };

            if let TaskResult::Message(message) = &result {
                events_dispatched += message.receivers;
            }
            if !result.is_error() {
                events_dispatched += self.fan_out_changes(task);
            }

            if let Some(error) = result.as_error() {
                tracing::debug!(index, task = task.name(), %error, "task failed");
            }
            results.push(result);
        }

        self.state = ExecutorState::Completed;
        BatchOutcome {
            results,
            events_dispatched,
        }
    }

    async fn execute_one(&self, task: &Task) -> TaskResult {
        if let Err(error) = task.validate() {
            return TaskResult::Error(error);
        }
        if !self
            .config
            .authorizer
            .authorize(task, self.token.as_deref(), &self.ctx)
        {
            return TaskResult::Error(TaskError::permission_denied(format!(
                "task '{}' was rejected",
                task.name()
            )));
        }

        match task {
            Task::CreateEntities {
                container,
                entities,
                key_name,
            } => self
                .container
                .create(container, entities.clone(), key_name.as_deref(), &self.ctx)
                .await
                .map(TaskResult::Create)
                .unwrap_or_else(|e| command_error_result(e)),

            Task::UpsertEntities { container, entities } => self
                .container
                .upsert(container, entities.clone(), &self.ctx)
                .await
                .map(TaskResult::Upsert)
                .unwrap_or_else(|e| command_error_result(e)),

            Task::ReadEntities {
                container,
                ids,
                references,
            } => {
                if ids.is_empty() {
                    return TaskResult::Read(ReadResult::default());
                }
                match self.container.read(container, ids, references, &self.ctx).await {
                    Ok(mut result) => {
                        if !self.container.self_validating_json() {
                            result.entities =
                                validate_payloads(container, result.entities, &mut result.errors);
                        }
                        TaskResult::Read(result)
                    }
                    Err(e) => command_error_result(e),
                }
            }

            Task::QueryEntities {
                container,
                filter,
                cursor,
                limit,
            } => {
                if filter.is_empty() {
                    return TaskResult::Query(QueryResult::default());
                }
                match self
                    .container
                    .query(container, filter, cursor.as_deref(), *limit, &self.ctx)
                    .await
                {
                    Ok(mut result) => {
                        if !self.container.self_validating_json() {
                            result.entities =
                                validate_payloads(container, result.entities, &mut result.errors);
                        }
                        TaskResult::Query(result)
                    }
                    Err(e) => command_error_result(e),
                }
            }

            Task::PatchEntities { container, patches } => self
                .container
                .patch(container, patches.clone(), &self.ctx)
                .await
                .map(TaskResult::Patch)
                .unwrap_or_else(|e| command_error_result(e)),

            Task::DeleteEntities { container, ids, all } => self
                .container
                .delete(container, ids, *all, &self.ctx)
                .await
                .map(TaskResult::Delete)
                .unwrap_or_else(|e| command_error_result(e)),

            Task::ReserveKeys { container, count } => self
                .container
                .reserve_keys(container, *count, &self.ctx)
                .await
                .map(TaskResult::ReserveKeys)
                .unwrap_or_else(|e| command_error_result(e)),

            Task::SendMessage { name, .. } => {
                let receivers = self.registry.match_message(name);
                for client_id in &receivers {
                    self.dispatcher
                        .dispatch(client_id, self.ctx.user_id.as_deref(), vec![task.clone()]);
                }
                TaskResult::Message(MessageResult {
                    receivers: receivers.len() as u64,
                })
            }

            Task::SubscribeMessage { name, remove } => {
                let Some(client_id) = self.client_id.as_deref() else {
                    return TaskResult::Error(TaskError::invalid(
                        "subscribeMessage requires a client id",
                    ));
                };
                if *remove {
                    self.registry.unsubscribe_message(client_id, name);
                } else {
                    self.sessions.ensure(client_id);
                    self.registry.subscribe_message(client_id, name);
                }
                TaskResult::SubscribeMessage(SubscribeResult {})
            }

            Task::SubscribeChanges {
                container,
                change_types,
                filter,
            } => {
                let Some(client_id) = self.client_id.as_deref() else {
                    return TaskResult::Error(TaskError::invalid(
                        "subscribeChanges requires a client id",
                    ));
                };
                if !change_types.is_empty() {
                    self.sessions.ensure(client_id);
                }
                self.registry.subscribe_changes(
                    client_id,
                    container,
                    change_types.clone(),
                    filter.clone(),
                );
                TaskResult::SubscribeChanges(SubscribeResult {})
            }

            Task::Unrecognized => {
                TaskResult::Error(TaskError::not_implemented("unknown task kind"))
            }
        }
    }

    /// Fans a successful mutation out to matching change subscribers.
    fn fan_out_changes(&self, task: &Task) -> u64 {
        let Some(change_type) = task.kind().change_type() else {
            return 0;
        };
        let Some(container) = task.container() else {
            return 0;
        };

        let entities = task_entity_values(task);
        let receivers = self.registry.match_change(container, change_type, entities);
        for client_id in &receivers {
            self.dispatcher
                .dispatch(client_id, self.ctx.user_id.as_deref(), vec![task.clone()]);
        }
        receivers.len() as u64
    }
}

/// The entity values a mutation carries, for filter narrowing.
fn task_entity_values(task: &Task) -> &[Value] {
    match task {
        Task::CreateEntities { entities, .. } | Task::UpsertEntities { entities, .. } => entities,
        Task::PatchEntities { patches, .. } => patches,
        _ => &[],
    }
}

/// Wraps a storage-contract failure as the task's error slot.
fn command_error_result(error: CommandError) -> TaskResult {
    let kind = match &error {
        CommandError::Filter(_) => TaskErrorKind::FilterError,
        CommandError::Cursor(_) => TaskErrorKind::ValidationError,
        _ => TaskErrorKind::DatabaseError,
    };
    TaskResult::Error(TaskError::new(kind, error.to_string()))
}

/// Shape-checks payloads from backends that cannot guarantee well-formed
/// JSON, converting malformed slots to `Parse` errors.
fn validate_payloads(
    container: &str,
    entities: Vec<Value>,
    errors: &mut EntityErrors,
) -> Vec<Value> {
    let mut valid = Vec::with_capacity(entities.len());
    for (index, entity) in entities.into_iter().enumerate() {
        if entity.is_object() {
            valid.push(entity);
        } else {
            let id = entity
                .get("id")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| format!("#{index}"));
            errors.insert(
                id.clone(),
                EntityError::parse(id, container, "payload is not a JSON object"),
            );
        }
    }
    valid
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "task panicked".to_string()
    }
}
