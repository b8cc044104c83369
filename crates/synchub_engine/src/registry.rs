//! Per-database subscription indexes.

use parking_lot::RwLock;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use synchub_protocol::ChangeType;
use synchub_store::filter_matches;

/// A client's interest in one container's mutations.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeSubscription {
    /// Which mutation kinds to observe.
    pub change_types: HashSet<ChangeType>,
    /// Optional filter narrowing observed entities. Events whose causing
    /// task carries no entity values (deletes) are not narrowed.
    pub filter: Option<String>,
}

/// Message-name patterns, indexed both ways: by pattern for matching and
/// by client for removal.
#[derive(Debug, Default)]
struct MessageIndex {
    by_pattern: HashMap<String, HashSet<String>>,
    by_client: HashMap<String, HashSet<String>>,
}

impl MessageIndex {
    fn subscribe(&mut self, client_id: &str, pattern: &str) {
        // Re-subscribing the same pair is idempotent.
        self.by_pattern
            .entry(pattern.to_string())
            .or_default()
            .insert(client_id.to_string());
        self.by_client
            .entry(client_id.to_string())
            .or_default()
            .insert(pattern.to_string());
    }

    fn unsubscribe(&mut self, client_id: &str, pattern: &str) {
        if pattern.is_empty() {
            self.remove_client(client_id);
            return;
        }
        if let Some(patterns) = self.by_client.get_mut(client_id) {
            patterns.remove(pattern);
            if patterns.is_empty() {
                self.by_client.remove(client_id);
            }
        }
        if let Some(clients) = self.by_pattern.get_mut(pattern) {
            clients.remove(client_id);
            if clients.is_empty() {
                self.by_pattern.remove(pattern);
            }
        }
    }

    fn remove_client(&mut self, client_id: &str) {
        let Some(patterns) = self.by_client.remove(client_id) else {
            return;
        };
        for pattern in patterns {
            if let Some(clients) = self.by_pattern.get_mut(&pattern) {
                clients.remove(client_id);
                if clients.is_empty() {
                    self.by_pattern.remove(&pattern);
                }
            }
        }
    }
}

/// Returns whether a subscription pattern matches a message name.
///
/// A trailing `*` matches any name with the given prefix; the empty
/// pattern matches every name; anything else matches exactly.
fn pattern_matches(pattern: &str, name: &str) -> bool {
    if pattern.is_empty() {
        return true;
    }
    match pattern.strip_suffix('*') {
        Some(prefix) => name.starts_with(prefix),
        None => pattern == name,
    }
}

/// Per-database subscription state.
///
/// Two independent indexes: message-name patterns per client, and per
/// container the set of clients with a change subscription. Change lookup
/// touches only the named container's entry, so its cost is proportional to
/// that container's subscribers, not the total subscriber count.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    messages: RwLock<MessageIndex>,
    changes: RwLock<HashMap<String, HashMap<String, ChangeSubscription>>>,
}

impl SubscriptionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes the client to a message-name pattern.
    pub fn subscribe_message(&self, client_id: &str, pattern: &str) {
        self.messages.write().subscribe(client_id, pattern);
    }

    /// Removes the client's subscription to a pattern; an empty pattern
    /// clears all of the client's message subscriptions.
    pub fn unsubscribe_message(&self, client_id: &str, pattern: &str) {
        self.messages.write().unsubscribe(client_id, pattern);
    }

    /// Subscribes the client to a container's changes, replacing any
    /// previous subscription for the pair. Empty `change_types` removes.
    pub fn subscribe_changes(
        &self,
        client_id: &str,
        container: &str,
        change_types: Vec<ChangeType>,
        filter: Option<String>,
    ) {
        let mut changes = self.changes.write();
        if change_types.is_empty() {
            if let Some(subscribers) = changes.get_mut(container) {
                subscribers.remove(client_id);
                if subscribers.is_empty() {
                    changes.remove(container);
                }
            }
            return;
        }
        changes.entry(container.to_string()).or_default().insert(
            client_id.to_string(),
            ChangeSubscription {
                change_types: change_types.into_iter().collect(),
                filter,
            },
        );
    }

    /// Removes every subscription held by the client.
    pub fn remove_client(&self, client_id: &str) {
        self.messages.write().remove_client(client_id);
        let mut changes = self.changes.write();
        changes.retain(|_, subscribers| {
            subscribers.remove(client_id);
            !subscribers.is_empty()
        });
    }

    /// Returns the clients subscribed to the given message name.
    pub fn match_message(&self, name: &str) -> Vec<String> {
        let messages = self.messages.read();
        let mut matched = HashSet::new();
        for (pattern, clients) in &messages.by_pattern {
            if pattern_matches(pattern, name) {
                matched.extend(clients.iter().cloned());
            }
        }
        let mut matched: Vec<String> = matched.into_iter().collect();
        matched.sort();
        matched
    }

    /// Returns the clients whose change subscription matches a mutation of
    /// the given type on the given container.
    ///
    /// `entities` are the causing task's entity values; a subscription
    /// filter narrows delivery to events where at least one entity matches.
    pub fn match_change(
        &self,
        container: &str,
        change_type: ChangeType,
        entities: &[Value],
    ) -> Vec<String> {
        let changes = self.changes.read();
        let Some(subscribers) = changes.get(container) else {
            return Vec::new();
        };

        let mut matched: Vec<String> = subscribers
            .iter()
            .filter(|(_, sub)| sub.change_types.contains(&change_type))
            .filter(|(_, sub)| match &sub.filter {
                Some(filter) if !entities.is_empty() => entities
                    .iter()
                    .any(|entity| filter_matches(entity, filter).unwrap_or(false)),
                _ => true,
            })
            .map(|(client_id, _)| client_id.clone())
            .collect();
        matched.sort();
        matched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn exact_wildcard_and_empty_patterns() {
        let registry = SubscriptionRegistry::new();
        registry.subscribe_message("exact", "order.created");
        registry.subscribe_message("prefix", "order.*");
        registry.subscribe_message("all", "");

        assert_eq!(
            registry.match_message("order.created"),
            vec!["all", "exact", "prefix"]
        );
        assert_eq!(registry.match_message("order.closed"), vec!["all", "prefix"]);
        assert_eq!(registry.match_message("user.created"), vec!["all"]);
    }

    #[test]
    fn resubscribe_is_idempotent() {
        let registry = SubscriptionRegistry::new();
        registry.subscribe_message("c1", "ping");
        registry.subscribe_message("c1", "ping");
        assert_eq!(registry.match_message("ping"), vec!["c1"]);
    }

    #[test]
    fn empty_pattern_unsubscribe_clears_all() {
        let registry = SubscriptionRegistry::new();
        registry.subscribe_message("c1", "a");
        registry.subscribe_message("c1", "b.*");
        registry.unsubscribe_message("c1", "");
        assert!(registry.match_message("a").is_empty());
        assert!(registry.match_message("b.x").is_empty());
    }

    #[test]
    fn change_lookup_narrows_by_type() {
        let registry = SubscriptionRegistry::new();
        registry.subscribe_changes("c1", "orders", vec![ChangeType::Create], None);
        registry.subscribe_changes("c2", "orders", vec![ChangeType::Delete], None);

        assert_eq!(
            registry.match_change("orders", ChangeType::Create, &[]),
            vec!["c1"]
        );
        assert_eq!(
            registry.match_change("orders", ChangeType::Delete, &[]),
            vec!["c2"]
        );
        assert!(registry
            .match_change("users", ChangeType::Create, &[])
            .is_empty());
    }

    #[test]
    fn change_filter_narrows_by_entity() {
        let registry = SubscriptionRegistry::new();
        registry.subscribe_changes(
            "c1",
            "orders",
            vec![ChangeType::Create],
            Some("status=open".into()),
        );

        let open = [json!({"id": "1", "status": "open"})];
        let closed = [json!({"id": "2", "status": "closed"})];
        assert_eq!(
            registry.match_change("orders", ChangeType::Create, &open),
            vec!["c1"]
        );
        assert!(registry
            .match_change("orders", ChangeType::Create, &closed)
            .is_empty());
        // No entity values (a delete): the filter does not narrow.
        assert_eq!(
            registry.match_change("orders", ChangeType::Create, &[]),
            vec!["c1"]
        );
    }

    #[test]
    fn resubscribe_changes_replaces() {
        let registry = SubscriptionRegistry::new();
        registry.subscribe_changes("c1", "orders", vec![ChangeType::Create], None);
        registry.subscribe_changes("c1", "orders", vec![ChangeType::Delete], None);
        assert!(registry
            .match_change("orders", ChangeType::Create, &[])
            .is_empty());
        assert_eq!(
            registry.match_change("orders", ChangeType::Delete, &[]),
            vec!["c1"]
        );
    }

    #[test]
    fn empty_change_types_unsubscribes() {
        let registry = SubscriptionRegistry::new();
        registry.subscribe_changes("c1", "orders", vec![ChangeType::Create], None);
        registry.subscribe_changes("c1", "orders", vec![], None);
        assert!(registry
            .match_change("orders", ChangeType::Create, &[])
            .is_empty());
    }

    #[test]
    fn remove_client_clears_both_indexes() {
        let registry = SubscriptionRegistry::new();
        registry.subscribe_message("c1", "ping");
        registry.subscribe_changes("c1", "orders", vec![ChangeType::Create], None);
        registry.remove_client("c1");
        assert!(registry.match_message("ping").is_empty());
        assert!(registry
            .match_change("orders", ChangeType::Create, &[])
            .is_empty());
    }
}
