use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::time::Instant;

use swmlink_core::error::{Result, SwmError};
use swmlink_core::protocol::Envelope;

/// One registered request awaiting its reply.
#[derive(Debug)]
pub struct PendingRequest {
    pub query_id: String,
    /// Local node id of the requester.
    pub requester: String,
    /// Outgoing envelope, kept for diagnostics.
    pub envelope: Envelope,
    pub registered_at: Instant,
    seq: u64,
    reply_tx: oneshot::Sender<Value>,
}

impl PendingRequest {
    /// Registration order within this registry.
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

/// Waiter side of a registration.
///
/// Dropping the matching [`PendingRequest`] without a reply closes the
/// channel, which the waiter observes as [`SwmError::Stopped`].
#[derive(Debug)]
pub struct PendingHandle {
    query_id: String,
    registered_at: Instant,
    rx: oneshot::Receiver<Value>,
}

impl PendingHandle {
    pub fn query_id(&self) -> &str {
        &self.query_id
    }

    pub fn registered_at(&self) -> Instant {
        self.registered_at
    }

    /// Await the reply with no deadline. [`SwmError::Stopped`] if the entry
    /// is cancelled or drained instead.
    pub async fn reply(self) -> Result<Value> {
        self.rx.await.map_err(|_| SwmError::Stopped)
    }

    pub(crate) fn into_parts(self) -> (String, Instant, oneshot::Receiver<Value>) {
        (self.query_id, self.registered_at, self.rx)
    }
}

/// Pending-request registry:
/// - `query_id -> PendingRequest`
///
/// Removal goes through `DashMap::remove`, so a resolve racing a cancel on the
/// same id has exactly one winner.
pub struct PendingRegistry {
    entries: DashMap<String, PendingRequest>,
    seq: AtomicU64,
}

impl Default for PendingRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PendingRegistry {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            seq: AtomicU64::new(1),
        }
    }

    /// Register `query_id`. A live entry with the same id is never replaced.
    pub fn register(
        &self,
        query_id: &str,
        requester: &str,
        envelope: Envelope,
    ) -> Result<PendingHandle> {
        match self.entries.entry(query_id.to_owned()) {
            Entry::Occupied(_) => Err(SwmError::DuplicateCorrelationId(query_id.to_owned())),
            Entry::Vacant(slot) => {
                let (reply_tx, rx) = oneshot::channel();
                let registered_at = Instant::now();
                let seq = self.seq.fetch_add(1, Ordering::Relaxed);
                slot.insert(PendingRequest {
                    query_id: query_id.to_owned(),
                    requester: requester.to_owned(),
                    envelope,
                    registered_at,
                    seq,
                    reply_tx,
                });
                tracing::trace!(query_id, seq, "request registered");
                Ok(PendingHandle {
                    query_id: query_id.to_owned(),
                    registered_at,
                    rx,
                })
            }
        }
    }

    /// Hand `reply` to the waiter of `query_id` and remove the entry.
    ///
    /// Returns `true` iff the entry existed. A waiter that already went away
    /// still counts as resolved.
    pub fn resolve(&self, query_id: &str, reply: Value) -> bool {
        let Some((_, pending)) = self.entries.remove(query_id) else {
            return false;
        };
        if pending.reply_tx.send(reply).is_err() {
            tracing::debug!(query_id, "reply matched but waiter is gone");
        }
        true
    }

    /// Remove `query_id` without a reply. Returns `true` iff it existed.
    pub fn cancel(&self, query_id: &str) -> bool {
        self.entries.remove(query_id).is_some()
    }

    /// Remove every entry, oldest first. Dropping the result releases waiters.
    pub fn drain_all(&self) -> Vec<PendingRequest> {
        let keys: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        let mut drained: Vec<PendingRequest> = keys
            .iter()
            .filter_map(|k| self.entries.remove(k).map(|(_, p)| p))
            .collect();
        drained.sort_by_key(|p| p.seq);
        drained
    }

    pub fn contains(&self, query_id: &str) -> bool {
        self.entries.contains_key(query_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
