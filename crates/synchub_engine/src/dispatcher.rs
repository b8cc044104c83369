//! Event construction and delivery.

use crate::session::ClientSessions;
use std::sync::Arc;
use synchub_protocol::{Event, Task};

/// What happened to one dispatched event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryOutcome {
    /// The seq the event was issued under.
    pub seq: u64,
    /// Whether the event reached the client's live target.
    pub delivered: bool,
    /// Whether the event was appended to the unacknowledged queue.
    pub queued: bool,
}

/// Turns matched tasks into ordered, numbered events and delivers them.
///
/// The seq is allocated and the event handed off (to the live target and/or
/// the queue) under the session's lock, so for one client the delivery
/// order observed on any target equals seq order, with no gaps.
#[derive(Debug, Clone)]
pub struct EventDispatcher {
    sessions: Arc<ClientSessions>,
    max_queued: usize,
}

impl EventDispatcher {
    /// Creates a dispatcher over the given session table.
    pub fn new(sessions: Arc<ClientSessions>, max_queued: usize) -> Self {
        Self {
            sessions,
            max_queued,
        }
    }

    /// Dispatches one event carrying `tasks` to the given client.
    ///
    /// A queueing session appends the event to its unacknowledged queue
    /// (bounded by evicting the oldest entries) and pushes the backlog to
    /// the live target in seq order; a full target keeps events queued so
    /// the target never observes a seq gap. Without queueing, a full or
    /// closed target is detached.
    pub fn dispatch(
        &self,
        client_id: &str,
        src_user: Option<&str>,
        tasks: Vec<Task>,
    ) -> DeliveryOutcome {
        let session = self.sessions.ensure(client_id);
        let mut session = session.lock();

        session.seq += 1;
        let event = Event {
            seq: session.seq,
            src_user: src_user.map(str::to_string),
            client_id: client_id.to_string(),
            tasks,
        };
        let seq = event.seq;

        let (delivered, queued) = session.offer(client_id, event, self.max_queued);

        tracing::debug!(client_id, seq, delivered, queued, "event dispatched");
        DeliveryOutcome {
            seq,
            delivered,
            queued,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use synchub_protocol::ServerFrame;
    use tokio::sync::mpsc;

    fn task() -> Task {
        Task::SendMessage {
            name: "ping".into(),
            param: serde_json::Value::Null,
        }
    }

    #[test]
    fn seq_increases_without_gaps() {
        let sessions = Arc::new(ClientSessions::new(true));
        let dispatcher = EventDispatcher::new(Arc::clone(&sessions), 100);

        for expected in 1..=5 {
            let outcome = dispatcher.dispatch("c1", None, vec![task()]);
            assert_eq!(outcome.seq, expected);
            assert!(outcome.queued);
            assert!(!outcome.delivered, "no target bound");
        }
        assert_eq!(sessions.snapshot("c1").unwrap().queued, 5);
    }

    #[test]
    fn delivers_to_live_target_in_order() {
        let sessions = Arc::new(ClientSessions::new(false));
        let dispatcher = EventDispatcher::new(Arc::clone(&sessions), 100);
        let (tx, mut rx) = mpsc::channel(8);
        sessions.bind_target("c1", tx);

        dispatcher.dispatch("c1", Some("alice"), vec![task()]);
        dispatcher.dispatch("c1", Some("alice"), vec![task()]);

        for expected in 1..=2 {
            match rx.try_recv().unwrap() {
                ServerFrame::Event(event) => {
                    assert_eq!(event.seq, expected);
                    assert_eq!(event.src_user.as_deref(), Some("alice"));
                }
                other => panic!("expected event, got {other:?}"),
            }
        }
    }

    #[test]
    fn closed_target_is_detached() {
        let sessions = Arc::new(ClientSessions::new(true));
        let dispatcher = EventDispatcher::new(Arc::clone(&sessions), 100);
        let (tx, rx) = mpsc::channel(8);
        sessions.bind_target("c1", tx);
        drop(rx);

        let outcome = dispatcher.dispatch("c1", None, vec![task()]);
        assert!(!outcome.delivered);
        assert!(outcome.queued, "queueing still applies after detach");
        assert!(!sessions.snapshot("c1").unwrap().has_target);
    }

    #[test]
    fn full_target_keeps_events_queued_in_seq_order() {
        let sessions = Arc::new(ClientSessions::new(true));
        let dispatcher = EventDispatcher::new(Arc::clone(&sessions), 100);
        let (tx, mut rx) = mpsc::channel(1);
        sessions.bind_target("c1", tx);

        for _ in 0..3 {
            dispatcher.dispatch("c1", None, vec![task()]);
        }

        let mut seen = Vec::new();
        for _ in 0..2 {
            match rx.try_recv().unwrap() {
                ServerFrame::Event(event) => seen.push(event.seq),
                other => panic!("expected event, got {other:?}"),
            }
            // The next dispatch resumes the backlog into the freed slot.
            dispatcher.dispatch("c1", None, vec![task()]);
        }
        match rx.try_recv().unwrap() {
            ServerFrame::Event(event) => seen.push(event.seq),
            other => panic!("expected event, got {other:?}"),
        }
        assert_eq!(seen, vec![1, 2, 3], "no seq may be skipped on a live target");
    }

    #[test]
    fn full_target_without_queue_is_detached() {
        let sessions = Arc::new(ClientSessions::new(false));
        let dispatcher = EventDispatcher::new(Arc::clone(&sessions), 100);
        let (tx, _rx) = mpsc::channel(1);
        sessions.bind_target("c1", tx);

        assert!(dispatcher.dispatch("c1", None, vec![task()]).delivered);
        let outcome = dispatcher.dispatch("c1", None, vec![task()]);
        assert!(!outcome.delivered);
        assert!(!sessions.snapshot("c1").unwrap().has_target);
    }

    #[test]
    fn queue_bound_evicts_oldest() {
        let sessions = Arc::new(ClientSessions::new(true));
        let dispatcher = EventDispatcher::new(Arc::clone(&sessions), 2);

        for _ in 0..4 {
            dispatcher.dispatch("c1", None, vec![task()]);
        }
        let snapshot = sessions.snapshot("c1").unwrap();
        assert_eq!(snapshot.queued, 2);
        assert_eq!(snapshot.seq, 4, "eviction never rewinds seq");
    }
}
