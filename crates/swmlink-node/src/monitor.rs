//! Monitor subscriptions.
//!
//! `RSGMonitor` broadcasts are not replies; they fan out to whoever holds a
//! [`MonitorSubscription`]. Dropping the subscription unregisters it.

use serde_json::Value;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

const DEFAULT_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct MonitorHub {
    tx: broadcast::Sender<Value>,
}

impl Default for MonitorHub {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl MonitorHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> MonitorSubscription {
        MonitorSubscription {
            rx: self.tx.subscribe(),
        }
    }

    /// Deliver `payload` to current subscribers. `false` when nobody listens.
    pub fn publish(&self, payload: Value) -> bool {
        if self.tx.receiver_count() == 0 {
            return false;
        }
        self.tx.send(payload).is_ok()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

pub struct MonitorSubscription {
    rx: broadcast::Receiver<Value>,
}

impl MonitorSubscription {
    /// Next monitor payload; `None` once the hub is gone.
    pub async fn recv(&mut self) -> Option<Value> {
        loop {
            match self.rx.recv().await {
                Ok(v) => return Some(v),
                Err(RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "monitor subscriber lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    pub fn try_recv(&mut self) -> Option<Value> {
        loop {
            match self.rx.try_recv() {
                Ok(v) => return Some(v),
                Err(TryRecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "monitor subscriber lagged");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }

    pub fn unsubscribe(self) {}
}
