//! In-memory reference container.

use crate::container::{EntityContainer, ExecutionContext};
use crate::error::{CommandError, StoreResult};
use crate::filter::filter_matches;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use synchub_protocol::{
    CreateResult, DeleteResult, EntityError, PatchResult, QueryResult, ReadResult,
    ReserveKeysResult, UpsertResult,
};

/// Default key field when a create task names none.
const DEFAULT_KEY_FIELD: &str = "id";

#[derive(Debug, Default)]
struct ContainerState {
    entities: BTreeMap<String, Value>,
    reserved: u64,
}

/// An in-memory entity container.
///
/// Suitable for unit tests, integration tests, and ephemeral hubs that
/// don't need persistence. Containers are created implicitly on first
/// write. Mutations apply synchronously under the lock, so within one
/// batch a later task reads an earlier task's writes.
///
/// # Thread safety
///
/// All state sits behind one `parking_lot::RwLock`; the container can be
/// shared freely across concurrent requests.
#[derive(Debug, Default)]
pub struct InMemoryContainer {
    state: RwLock<HashMap<String, ContainerState>>,
}

impl InMemoryContainer {
    /// Creates a new empty container set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of entities in the named container.
    pub fn len(&self, container: &str) -> usize {
        self.state
            .read()
            .get(container)
            .map(|c| c.entities.len())
            .unwrap_or(0)
    }

    /// Returns true if the named container holds no entities.
    pub fn is_empty(&self, container: &str) -> bool {
        self.len(container) == 0
    }

    /// Returns a copy of the entity with the given id, for inspection.
    pub fn get(&self, container: &str, id: &str) -> Option<Value> {
        self.state
            .read()
            .get(container)
            .and_then(|c| c.entities.get(id).cloned())
    }

    fn entity_key(entity: &Value, key_field: &str) -> Option<String> {
        match entity.get(key_field)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

#[async_trait]
impl EntityContainer for InMemoryContainer {
    async fn create(
        &self,
        container: &str,
        entities: Vec<Value>,
        key_name: Option<&str>,
        _ctx: &ExecutionContext,
    ) -> StoreResult<CreateResult> {
        let key_field = key_name.unwrap_or(DEFAULT_KEY_FIELD);
        let mut state = self.state.write();
        let slot = state.entry(container.to_string()).or_default();

        let mut result = CreateResult::default();
        for (index, mut entity) in entities.into_iter().enumerate() {
            if !entity.is_object() {
                let id = format!("#{index}");
                result.errors.insert(
                    id.clone(),
                    EntityError::parse(id, container, "entity is not a JSON object"),
                );
                continue;
            }

            let id = match Self::entity_key(&entity, key_field) {
                Some(id) => id,
                None => {
                    let id = uuid::Uuid::new_v4().to_string();
                    entity[key_field] = Value::String(id.clone());
                    result.keys.push(id.clone());
                    id
                }
            };

            if slot.entities.contains_key(&id) {
                result.errors.insert(
                    id.clone(),
                    EntityError::write(id, container, "entity already exists"),
                );
                continue;
            }

            slot.entities.insert(id, entity);
            result.created += 1;
        }

        tracing::debug!(container, created = result.created, "create applied");
        Ok(result)
    }

    async fn upsert(
        &self,
        container: &str,
        entities: Vec<Value>,
        _ctx: &ExecutionContext,
    ) -> StoreResult<UpsertResult> {
        let mut state = self.state.write();
        let slot = state.entry(container.to_string()).or_default();

        let mut result = UpsertResult::default();
        for (index, entity) in entities.into_iter().enumerate() {
            let Some(id) = Self::entity_key(&entity, DEFAULT_KEY_FIELD) else {
                let id = format!("#{index}");
                result.errors.insert(
                    id.clone(),
                    EntityError::write(id, container, "entity has no id"),
                );
                continue;
            };
            slot.entities.insert(id, entity);
            result.upserted += 1;
        }
        Ok(result)
    }

    async fn read(
        &self,
        container: &str,
        ids: &[String],
        references: &[String],
        _ctx: &ExecutionContext,
    ) -> StoreResult<ReadResult> {
        let state = self.state.read();
        let Some(slot) = state.get(container) else {
            // Nothing stored yet: every id is a read miss.
            let mut result = ReadResult::default();
            for id in ids {
                result.errors.insert(
                    id.clone(),
                    EntityError::read(id.clone(), container, "entity not found"),
                );
            }
            return Ok(result);
        };

        let mut result = ReadResult::default();
        for id in ids {
            match slot.entities.get(id) {
                Some(entity) => result.entities.push(entity.clone()),
                None => {
                    result.errors.insert(
                        id.clone(),
                        EntityError::read(id.clone(), container, "entity not found"),
                    );
                }
            }
        }

        for field in references {
            let mut referenced = Vec::new();
            for entity in &result.entities {
                if let Some(ref_id) = entity.get(field).and_then(Value::as_str) {
                    if let Some(target) = slot.entities.get(ref_id) {
                        referenced.push(target.clone());
                    }
                }
            }
            if !referenced.is_empty() {
                result.references.insert(field.clone(), referenced);
            }
        }

        Ok(result)
    }

    async fn query(
        &self,
        container: &str,
        filter: &str,
        cursor: Option<&str>,
        limit: Option<u64>,
        _ctx: &ExecutionContext,
    ) -> StoreResult<QueryResult> {
        let offset: usize = match cursor {
            Some(raw) => raw
                .parse()
                .map_err(|_| CommandError::Cursor(raw.to_string()))?,
            None => 0,
        };

        let state = self.state.read();
        let mut result = QueryResult::default();
        let Some(slot) = state.get(container) else {
            return Ok(result);
        };

        let mut matching = Vec::new();
        for entity in slot.entities.values() {
            if filter_matches(entity, filter)? {
                matching.push(entity.clone());
            }
        }

        let remaining = matching.len().saturating_sub(offset);
        let take = limit.map(|l| l as usize).unwrap_or(remaining).min(remaining);
        result.entities = matching.into_iter().skip(offset).take(take).collect();
        if take < remaining {
            result.cursor = Some((offset + take).to_string());
        }

        Ok(result)
    }

    async fn patch(
        &self,
        container: &str,
        patches: Vec<Value>,
        _ctx: &ExecutionContext,
    ) -> StoreResult<PatchResult> {
        let mut state = self.state.write();
        let slot = state.entry(container.to_string()).or_default();

        let mut result = PatchResult::default();
        for (index, patch) in patches.into_iter().enumerate() {
            let Some(id) = Self::entity_key(&patch, DEFAULT_KEY_FIELD) else {
                let id = format!("#{index}");
                result.errors.insert(
                    id.clone(),
                    EntityError::patch(id, container, "patch has no id"),
                );
                continue;
            };

            let Some(entity) = slot.entities.get_mut(&id) else {
                result.errors.insert(
                    id.clone(),
                    EntityError::patch(id, container, "entity not found"),
                );
                continue;
            };

            let (Some(target), Some(fields)) = (entity.as_object_mut(), patch.as_object()) else {
                result.errors.insert(
                    id.clone(),
                    EntityError::patch(id, container, "patch is not a JSON object"),
                );
                continue;
            };

            for (key, value) in fields {
                if key != DEFAULT_KEY_FIELD {
                    target.insert(key.clone(), value.clone());
                }
            }
            result.patched += 1;
        }
        Ok(result)
    }

    async fn delete(
        &self,
        container: &str,
        ids: &[String],
        all: bool,
        _ctx: &ExecutionContext,
    ) -> StoreResult<DeleteResult> {
        let mut state = self.state.write();
        let slot = state.entry(container.to_string()).or_default();

        let mut result = DeleteResult::default();
        if all {
            result.deleted = slot.entities.len() as u64;
            slot.entities.clear();
            return Ok(result);
        }

        for id in ids {
            if slot.entities.remove(id).is_some() {
                result.deleted += 1;
            } else {
                result.errors.insert(
                    id.clone(),
                    EntityError::delete(id.clone(), container, "entity not found"),
                );
            }
        }
        Ok(result)
    }

    async fn reserve_keys(
        &self,
        container: &str,
        count: u64,
        _ctx: &ExecutionContext,
    ) -> StoreResult<ReserveKeysResult> {
        let mut state = self.state.write();
        let slot = state.entry(container.to_string()).or_default();

        let end = slot
            .reserved
            .checked_add(count)
            .ok_or_else(|| CommandError::Storage("key reservation counter exhausted".into()))?;
        let start = slot.reserved + 1;
        slot.reserved = end;
        let keys = (start..=end)
            .map(|n| format!("{container}-{n}"))
            .collect();
        Ok(ReserveKeysResult { keys })
    }
}
