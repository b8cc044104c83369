//! Request/response correlation for out-of-order duplex transports.

use crate::error::{ClientError, ClientResult};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use synchub_protocol::SyncResponse;
use tokio::sync::oneshot;

/// Tracks requests awaiting their response on one connection.
///
/// Ids are monotonic and unique among the connection's outstanding
/// requests. A record is stored *before* the request is sent, so a fast
/// response can never race its own registration. Responses may arrive in
/// any order; completion looks the record up by the echoed `req` id and
/// never assumes FIFO.
#[derive(Debug, Default)]
pub struct PendingRequests {
    next_req_id: AtomicU64,
    pending: Mutex<HashMap<u64, oneshot::Sender<SyncResponse>>>,
}

impl PendingRequests {
    /// Creates an empty table; the first request gets id 1.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a request id and registers its completion slot.
    pub fn register(&self) -> (u64, oneshot::Receiver<SyncResponse>) {
        let req_id = self.next_req_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(req_id, tx);
        (req_id, rx)
    }

    /// Removes a registration that was never sent (e.g. the send failed).
    pub fn forget(&self, req_id: u64) {
        self.pending.lock().remove(&req_id);
    }

    /// Completes the request the response correlates to.
    ///
    /// Fails with a protocol violation when no request with the echoed id
    /// is outstanding.
    pub fn complete(&self, req_id: u64, response: SyncResponse) -> ClientResult<()> {
        let sender = self.pending.lock().remove(&req_id).ok_or_else(|| {
            ClientError::ProtocolViolation(format!("no pending request with req {req_id}"))
        })?;
        if sender.send(response).is_err() {
            // The requester gave up waiting; the response is discarded.
            tracing::debug!(req_id, "response arrived for abandoned request");
        }
        Ok(())
    }

    /// Resolves every outstanding request as cancelled.
    ///
    /// Called on connection loss; dropping the completion slots wakes each
    /// waiter with a cancellation instead of leaving it dangling.
    pub fn cancel_all(&self) {
        let cancelled = {
            let mut pending = self.pending.lock();
            let count = pending.len();
            pending.clear();
            count
        };
        if cancelled > 0 {
            tracing::debug!(cancelled, "cancelled pending requests");
        }
    }

    /// Number of outstanding requests.
    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Returns true if no request is outstanding.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
