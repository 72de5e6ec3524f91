//! In-process group bus.
//!
//! `LocalBus` plays the pub/sub network for nodes living in one process:
//! - `peer_id -> PeerSlot` (name, headers, bounded inbound queue)
//! - `group -> {peer_id...}`
//!
//! Delivery is lossy: a full queue drops the event and logs it. SHOUT is never
//! looped back to its sender.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use tokio::sync::mpsc;
use uuid::Uuid;

use swmlink_core::error::{Result, SwmError};
use swmlink_core::protocol::RawEvent;

use super::GroupTransport;

const DEFAULT_QUEUE_CAPACITY: usize = 1024;

#[derive(Clone)]
struct PeerSlot {
    name: String,
    address: String,
    headers: BTreeMap<String, String>,
    tx: mpsc::Sender<RawEvent>,
}

struct BusInner {
    peers: DashMap<String, PeerSlot>,
    groups: DashMap<String, DashSet<String>>,
    queue_capacity: usize,
}

/// Shared handle to one in-process network.
#[derive(Clone)]
pub struct LocalBus {
    inner: Arc<BusInner>,
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalBus {
    pub fn new() -> Self {
        Self::with_queue_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    pub fn with_queue_capacity(queue_capacity: usize) -> Self {
        Self {
            inner: Arc::new(BusInner {
                peers: DashMap::new(),
                groups: DashMap::new(),
                queue_capacity: queue_capacity.max(1),
            }),
        }
    }

    /// Create a node on this bus. It becomes visible to peers on `start`.
    pub fn node(&self, name: &str) -> MemoryTransport {
        let uuid = Uuid::new_v4().simple().to_string().to_uppercase();
        let (tx, rx) = mpsc::channel(self.inner.queue_capacity);
        MemoryTransport {
            bus: self.clone(),
            address: format!("inproc://{uuid}"),
            uuid,
            name: name.to_owned(),
            headers: BTreeMap::new(),
            tx,
            rx,
            started: false,
            groups: BTreeSet::new(),
        }
    }

    /// Number of started nodes.
    pub fn peer_count(&self) -> usize {
        self.inner.peers.len()
    }

    pub fn members(&self, group: &str) -> Vec<String> {
        self.inner
            .groups
            .get(group)
            .map(|set| set.iter().map(|p| p.key().to_string()).collect())
            .unwrap_or_default()
    }

    /// Deliver a raw event straight into one node's queue.
    pub fn inject(&self, to: &str, event: RawEvent) -> bool {
        self.deliver(to, event)
    }

    /// Tell every other node that `peer` went silent.
    pub fn announce_evasive(&self, peer: &str) -> bool {
        let Some(name) = self.inner.peers.get(peer).map(|p| p.name.clone()) else {
            return false;
        };
        for other in self.others(peer) {
            self.deliver(&other, RawEvent::evasive(peer, &name));
        }
        true
    }

    fn deliver(&self, to: &str, event: RawEvent) -> bool {
        let Some(tx) = self.inner.peers.get(to).map(|p| p.tx.clone()) else {
            return false;
        };
        match tx.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(ev)) => {
                tracing::warn!(peer = %to, kind = %ev.kind, "bus queue full, event dropped");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    fn others(&self, me: &str) -> Vec<String> {
        self.inner
            .peers
            .iter()
            .filter(|e| e.key() != me)
            .map(|e| e.key().clone())
            .collect()
    }

    fn groups_of(&self, peer: &str) -> Vec<String> {
        self.inner
            .groups
            .iter()
            .filter(|e| e.value().contains(peer))
            .map(|e| e.key().clone())
            .collect()
    }

    fn add_member(&self, group: &str, peer: &str) {
        self.inner
            .groups
            .entry(group.to_string())
            .or_insert_with(DashSet::new)
            .insert(peer.to_string());
    }

    fn remove_member(&self, group: &str, peer: &str) {
        if let Some(set) = self.inner.groups.get(group) {
            set.remove(peer);
        }
        self.inner.groups.remove_if(group, |_, set| set.is_empty());
    }

    fn detach(&self, peer: &str, name: &str) {
        for group in self.groups_of(peer) {
            self.remove_member(&group, peer);
        }
        self.inner.peers.remove(peer);
        for other in self.others(peer) {
            self.deliver(&other, RawEvent::exit(peer, name));
        }
    }
}

/// One node on a [`LocalBus`].
pub struct MemoryTransport {
    bus: LocalBus,
    uuid: String,
    name: String,
    address: String,
    headers: BTreeMap<String, String>,
    tx: mpsc::Sender<RawEvent>,
    rx: mpsc::Receiver<RawEvent>,
    started: bool,
    groups: BTreeSet<String>,
}

impl MemoryTransport {
    pub fn address(&self) -> &str {
        &self.address
    }

    fn ensure_started(&self) -> Result<()> {
        if !self.started {
            return Err(SwmError::Transport(format!("node {} not started", self.name)));
        }
        Ok(())
    }

    fn detach(&mut self) {
        if !self.started {
            return;
        }
        self.started = false;
        self.groups.clear();
        self.bus.detach(&self.uuid, &self.name);
    }
}

#[async_trait]
impl GroupTransport for MemoryTransport {
    fn uuid(&self) -> &str {
        &self.uuid
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn set_header(&mut self, key: &str, value: &str) {
        self.headers.insert(key.to_owned(), value.to_owned());
    }

    async fn start(&mut self) -> Result<()> {
        if self.started {
            return Ok(());
        }
        let bus = self.bus.clone();

        // snapshot before inserting ourselves
        let existing: Vec<(String, PeerSlot)> = bus
            .inner
            .peers
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();

        bus.inner.peers.insert(
            self.uuid.clone(),
            PeerSlot {
                name: self.name.clone(),
                address: self.address.clone(),
                headers: self.headers.clone(),
                tx: self.tx.clone(),
            },
        );
        self.started = true;

        let me = RawEvent::enter(&self.uuid, &self.name, &self.headers, &self.address);
        for (id, slot) in &existing {
            bus.deliver(id, me.clone());
            bus.deliver(
                &self.uuid,
                RawEvent::enter(id, &slot.name, &slot.headers, &slot.address),
            );
            for group in bus.groups_of(id) {
                bus.deliver(&self.uuid, RawEvent::join(id, &slot.name, &group));
            }
        }
        Ok(())
    }

    async fn join(&mut self, group: &str) -> Result<()> {
        self.ensure_started()?;
        if !self.groups.insert(group.to_owned()) {
            return Ok(());
        }
        self.bus.add_member(group, &self.uuid);
        for other in self.bus.others(&self.uuid) {
            self.bus
                .deliver(&other, RawEvent::join(&self.uuid, &self.name, group));
        }
        Ok(())
    }

    async fn leave(&mut self, group: &str) -> Result<()> {
        self.ensure_started()?;
        if !self.groups.remove(group) {
            return Ok(());
        }
        self.bus.remove_member(group, &self.uuid);
        for other in self.bus.others(&self.uuid) {
            self.bus
                .deliver(&other, RawEvent::leave(&self.uuid, &self.name, group));
        }
        Ok(())
    }

    async fn shout(&mut self, group: &str, body: &str) -> Result<()> {
        self.ensure_started()?;
        let event = RawEvent::shout(&self.uuid, &self.name, group, body);
        for member in self.bus.members(group) {
            if member != self.uuid {
                self.bus.deliver(&member, event.clone());
            }
        }
        Ok(())
    }

    async fn whisper(&mut self, peer: &str, body: &str) -> Result<()> {
        self.ensure_started()?;
        if !self.bus.inner.peers.contains_key(peer) {
            return Err(SwmError::Transport(format!("unknown peer {peer}")));
        }
        self.bus
            .deliver(peer, RawEvent::whisper(&self.uuid, &self.name, body));
        Ok(())
    }

    async fn recv(&mut self) -> Option<RawEvent> {
        self.rx.recv().await
    }

    async fn stop(&mut self) {
        self.detach();
    }
}

impl Drop for MemoryTransport {
    fn drop(&mut self) {
        self.detach();
    }
}
