use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::watch;

/// What we know about one remote peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerInfo {
    pub peer_id: String,
    pub name: String,
    pub address: String,
    pub headers: BTreeMap<String, String>,
    pub groups: BTreeSet<String>,
    /// Set on EVASIVE, cleared by any later traffic from the peer.
    pub evasive: bool,
}

impl PeerInfo {
    fn bare(peer_id: &str, name: &str) -> Self {
        Self {
            peer_id: peer_id.to_owned(),
            name: name.to_owned(),
            address: String::new(),
            headers: BTreeMap::new(),
            groups: BTreeSet::new(),
            evasive: false,
        }
    }
}

/// Connectivity bookkeeping: `peer_id -> PeerInfo`.
///
/// The peer count is mirrored on a watch channel so callers can wait for peers
/// without polling.
pub struct PeerDirectory {
    peers: DashMap<String, PeerInfo>,
    count: watch::Sender<usize>,
}

impl Default for PeerDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl PeerDirectory {
    pub fn new() -> Self {
        let (count, _) = watch::channel(0);
        Self {
            peers: DashMap::new(),
            count,
        }
    }

    pub fn entered(
        &self,
        peer_id: &str,
        name: &str,
        headers: BTreeMap<String, String>,
        address: &str,
    ) {
        // JOIN may have been seen first; keep its groups
        let mut entry = self
            .peers
            .entry(peer_id.to_owned())
            .or_insert_with(|| PeerInfo::bare(peer_id, name));
        entry.name = name.to_owned();
        entry.headers = headers;
        entry.address = address.to_owned();
        entry.evasive = false;
        drop(entry);
        self.publish_count();
    }

    pub fn exited(&self, peer_id: &str) -> Option<PeerInfo> {
        let gone = self.peers.remove(peer_id).map(|(_, v)| v);
        self.publish_count();
        gone
    }

    pub fn joined(&self, peer_id: &str, name: &str, group: &str) {
        let mut entry = self
            .peers
            .entry(peer_id.to_owned())
            .or_insert_with(|| PeerInfo::bare(peer_id, name));
        entry.groups.insert(group.to_owned());
        entry.evasive = false;
        drop(entry);
        self.publish_count();
    }

    pub fn left(&self, peer_id: &str, group: &str) {
        if let Some(mut entry) = self.peers.get_mut(peer_id) {
            entry.groups.remove(group);
        }
    }

    pub fn mark_evasive(&self, peer_id: &str) {
        if let Some(mut entry) = self.peers.get_mut(peer_id) {
            entry.evasive = true;
        }
    }

    /// Any traffic from a peer proves it is alive again.
    pub fn seen(&self, peer_id: &str) {
        if let Some(mut entry) = self.peers.get_mut(peer_id) {
            entry.evasive = false;
        }
    }

    pub fn get(&self, peer_id: &str) -> Option<PeerInfo> {
        self.peers.get(peer_id).map(|r| r.value().clone())
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Snapshot sorted by peer id.
    pub fn snapshot(&self) -> Vec<PeerInfo> {
        let mut all: Vec<PeerInfo> = self.peers.iter().map(|r| r.value().clone()).collect();
        all.sort_by(|a, b| a.peer_id.cmp(&b.peer_id));
        all
    }

    /// Wait until at least `min` peers are known. `false` on timeout.
    pub async fn wait_for(&self, min: usize, timeout: Duration) -> bool {
        let mut rx = self.count.subscribe();
        let reached = tokio::time::timeout(timeout, rx.wait_for(|n| *n >= min)).await;
        matches!(reached, Ok(Ok(_)))
    }

    fn publish_count(&self) {
        self.count.send_replace(self.peers.len());
    }
}
