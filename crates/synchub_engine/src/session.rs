//! Per-client session table: event sequencing, reliable queue, live target.

use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use synchub_protocol::{Event, ServerFrame};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Handle to a client's live transport: the sending half of the
/// connection's single outbound queue.
///
/// Exactly one writer loop consumes the other end, so pushing a frame here
/// never races another send on the underlying connection.
pub type EventTarget = mpsc::Sender<ServerFrame>;

/// Read-only view of one session, for inspection and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// Last issued event seq (0 when none was issued yet).
    pub seq: u64,
    /// Number of unacknowledged queued events.
    pub queued: usize,
    /// Whether a live target is bound.
    pub has_target: bool,
    /// Whether events are queued for reconnect delivery.
    pub queue_events: bool,
}

#[derive(Debug)]
pub(crate) struct ClientSession {
    /// Last issued seq; the next event gets `seq + 1`.
    pub(crate) seq: u64,
    /// Highest seq handed to the currently bound target.
    pub(crate) sent: u64,
    pub(crate) queue_events: bool,
    pub(crate) queue: VecDeque<(u64, Event)>,
    pub(crate) target: Option<EventTarget>,
}

impl ClientSession {
    fn new(queue_events: bool) -> Self {
        Self {
            seq: 0,
            sent: 0,
            queue_events,
            queue: VecDeque::new(),
            target: None,
        }
    }

    /// Drops every queued event with `seq <= ack`.
    pub(crate) fn acknowledge(&mut self, ack: u64) {
        while matches!(self.queue.front(), Some((seq, _)) if *seq <= ack) {
            self.queue.pop_front();
        }
    }

    /// Pushes queued events newer than `sent` to the live target, in seq
    /// order, stopping at the first full channel. The stalled tail stays
    /// queued and resumes on the next flush, so the target never observes
    /// a seq gap. A closed target is detached.
    pub(crate) fn flush_queue(&mut self, client_id: &str) {
        let Some(target) = self.target.clone() else {
            return;
        };
        for (seq, event) in &self.queue {
            if *seq <= self.sent {
                continue;
            }
            match target.try_send(ServerFrame::Event(event.clone())) {
                Ok(()) => self.sent = *seq,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(client_id, seq, "event target backlogged; events remain queued");
                    return;
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!(client_id, seq, "event target closed; detaching");
                    self.target = None;
                    return;
                }
            }
        }
    }

    /// Hands one freshly numbered event to this session.
    ///
    /// A queueing session appends it to the unacknowledged queue (bounded
    /// by evicting the oldest entries) and flushes the backlog; without
    /// queueing the event goes straight to the target, and a full or
    /// closed target is detached rather than skipped past. Returns
    /// `(delivered, queued)` for the offered event.
    pub(crate) fn offer(&mut self, client_id: &str, event: Event, max_queued: usize) -> (bool, bool) {
        let seq = event.seq;
        if self.queue_events {
            self.queue.push_back((seq, event));
            while self.queue.len() > max_queued {
                self.queue.pop_front();
            }
            self.flush_queue(client_id);
            (self.sent >= seq, true)
        } else {
            let mut delivered = false;
            if let Some(target) = self.target.clone() {
                match target.try_send(ServerFrame::Event(event)) {
                    Ok(()) => {
                        self.sent = seq;
                        delivered = true;
                    }
                    Err(TrySendError::Full(_)) => {
                        tracing::warn!(client_id, seq, "event target backlogged; detaching");
                        self.target = None;
                    }
                    Err(TrySendError::Closed(_)) => {
                        tracing::debug!(client_id, seq, "event target closed; detaching");
                        self.target = None;
                    }
                }
            }
            (delivered, false)
        }
    }

    fn is_idle(&self) -> bool {
        self.target.is_none() && self.queue.is_empty() && !self.queue_events
    }
}

/// The shared per-client session table.
///
/// Sessions are created on first subscribe (or explicit target binding),
/// persist across reconnects while their queue is non-empty or they queue
/// events, and are destroyed by [`remove`](Self::remove) or
/// [`prune_idle`](Self::prune_idle). Mutated concurrently from request
/// handling and event emission; the table lock only guards the map, each
/// session has its own lock.
#[derive(Debug)]
pub struct ClientSessions {
    sessions: RwLock<HashMap<String, Arc<Mutex<ClientSession>>>>,
    queue_by_default: bool,
}

impl ClientSessions {
    /// Creates an empty table.
    ///
    /// `queue_by_default` controls whether newly created sessions keep an
    /// unacknowledged queue for reconnect delivery.
    pub fn new(queue_by_default: bool) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            queue_by_default,
        }
    }

    pub(crate) fn ensure(&self, client_id: &str) -> Arc<Mutex<ClientSession>> {
        if let Some(session) = self.sessions.read().get(client_id) {
            return Arc::clone(session);
        }
        let mut sessions = self.sessions.write();
        Arc::clone(
            sessions
                .entry(client_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(ClientSession::new(self.queue_by_default)))),
        )
    }

    pub(crate) fn get(&self, client_id: &str) -> Option<Arc<Mutex<ClientSession>>> {
        self.sessions.read().get(client_id).map(Arc::clone)
    }

    /// Returns true if a session exists for the client.
    pub fn contains(&self, client_id: &str) -> bool {
        self.sessions.read().contains_key(client_id)
    }

    /// Binds a live target to the client, creating the session if needed.
    ///
    /// A reconnect replaces the previous target without resetting `seq` or
    /// losing the queue; queued events are replayed to the new target in
    /// seq order. A replay stalled on a full channel resumes on the next
    /// dispatch or acknowledgement.
    pub fn bind_target(&self, client_id: &str, target: EventTarget) {
        let session = self.ensure(client_id);
        let mut session = session.lock();
        session.sent = 0;
        session.target = Some(target);
        session.flush_queue(client_id);
    }

    /// Detaches the client's live target without touching its queue.
    ///
    /// Called on connection close. The session itself survives while its
    /// queue is non-empty or it queues events.
    pub fn detach_target(&self, client_id: &str) {
        let mut removed_idle = false;
        if let Some(session) = self.get(client_id) {
            let mut session = session.lock();
            session.target = None;
            removed_idle = session.is_idle();
        }
        if removed_idle {
            self.sessions.write().remove(client_id);
        }
    }

    /// Sets whether the client's session queues events.
    pub fn set_queue_events(&self, client_id: &str, queue_events: bool) {
        let session = self.ensure(client_id);
        session.lock().queue_events = queue_events;
    }

    /// Applies an acknowledgement: drops queued events with `seq <= ack`,
    /// then flushes any backlog the freed channel room can now take.
    pub fn acknowledge(&self, client_id: &str, ack: u64) {
        if let Some(session) = self.get(client_id) {
            let mut session = session.lock();
            session.acknowledge(ack);
            session.flush_queue(client_id);
        }
    }

    /// Destroys the client's session, dropping its queue and target.
    pub fn remove(&self, client_id: &str) {
        self.sessions.write().remove(client_id);
    }

    /// Destroys every session with no target, no queue, and queueing off.
    pub fn prune_idle(&self) {
        self.sessions
            .write()
            .retain(|_, session| !session.lock().is_idle());
    }

    /// Returns a snapshot of the client's session, if one exists.
    pub fn snapshot(&self, client_id: &str) -> Option<SessionSnapshot> {
        let session = self.get(client_id)?;
        let session = session.lock();
        Some(SessionSnapshot {
            seq: session.seq,
            queued: session.queue.len(),
            has_target: session.target.is_some(),
            queue_events: session.queue_events,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(seq: u64) -> Event {
        Event {
            seq,
            src_user: None,
            client_id: "c1".into(),
            tasks: vec![],
        }
    }

    #[test]
    fn ack_trims_prefix() {
        let mut session = ClientSession::new(true);
        for seq in 1..=5 {
            session.queue.push_back((seq, event(seq)));
        }
        session.acknowledge(3);
        let remaining: Vec<u64> = session.queue.iter().map(|(seq, _)| *seq).collect();
        assert_eq!(remaining, vec![4, 5]);

        // Acks are idempotent and tolerate already-trimmed seqs.
        session.acknowledge(3);
        assert_eq!(session.queue.len(), 2);
        session.acknowledge(10);
        assert!(session.queue.is_empty());
    }

    #[test]
    fn rebind_keeps_queue_and_replays() {
        let sessions = ClientSessions::new(true);
        {
            let session = sessions.ensure("c1");
            let mut session = session.lock();
            session.seq = 2;
            session.queue.push_back((1, event(1)));
            session.queue.push_back((2, event(2)));
        }

        let (tx, mut rx) = mpsc::channel(8);
        sessions.bind_target("c1", tx);

        let snapshot = sessions.snapshot("c1").unwrap();
        assert_eq!(snapshot.seq, 2, "rebinding must not reset seq");
        assert_eq!(snapshot.queued, 2, "replay must not drain the queue");

        let first = rx.try_recv().unwrap();
        let second = rx.try_recv().unwrap();
        match (first, second) {
            (ServerFrame::Event(a), ServerFrame::Event(b)) => {
                assert_eq!(a.seq, 1);
                assert_eq!(b.seq, 2);
            }
            other => panic!("expected events, got {other:?}"),
        }
    }

    #[test]
    fn stalled_replay_resumes_on_ack() {
        let sessions = ClientSessions::new(true);
        {
            let session = sessions.ensure("c1");
            let mut session = session.lock();
            session.seq = 2;
            session.queue.push_back((1, event(1)));
            session.queue.push_back((2, event(2)));
        }

        let (tx, mut rx) = mpsc::channel(1);
        sessions.bind_target("c1", tx);

        match rx.try_recv().unwrap() {
            ServerFrame::Event(first) => assert_eq!(first.seq, 1),
            other => panic!("expected event, got {other:?}"),
        }
        assert!(rx.try_recv().is_err(), "seq 2 must wait for channel room");

        sessions.acknowledge("c1", 1);
        match rx.try_recv().unwrap() {
            ServerFrame::Event(second) => assert_eq!(second.seq, 2),
            other => panic!("expected event, got {other:?}"),
        }
    }

    #[test]
    fn detach_removes_only_idle_sessions() {
        let sessions = ClientSessions::new(false);
        let (tx, _rx) = mpsc::channel(1);
        sessions.bind_target("c1", tx);
        sessions.detach_target("c1");
        assert!(!sessions.contains("c1"), "idle session should be removed");

        let (tx, _rx) = mpsc::channel(1);
        sessions.bind_target("c2", tx);
        sessions.ensure("c2").lock().queue.push_back((1, event(1)));
        sessions.detach_target("c2");
        assert!(sessions.contains("c2"), "queued session must survive");
    }

    #[test]
    fn prune_removes_idle() {
        let sessions = ClientSessions::new(false);
        sessions.ensure("idle");
        sessions.ensure("queueing");
        sessions.set_queue_events("queueing", true);
        sessions.prune_idle();
        assert!(!sessions.contains("idle"));
        assert!(sessions.contains("queueing"));
    }
}
