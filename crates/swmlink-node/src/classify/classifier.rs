use std::sync::Arc;

use swmlink_core::protocol::envelope::correlation_id;
use swmlink_core::protocol::{Envelope, PeerEvent, ReplyKind};

use crate::classify::directory::PeerDirectory;
use crate::monitor::MonitorHub;
use crate::pending::PendingRegistry;

/// Why a message was dropped without effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscardReason {
    /// Body is not a well-formed envelope.
    Undecodable,
    /// Reply type is known but its payload is not a JSON document.
    BadPayload,
    /// Reply payload carries no correlation id.
    MissingCorrelation,
    /// Envelope `type` outside the reply vocabulary.
    UnknownType(String),
    /// Transport event kind outside the known set.
    UnknownEvent(String),
}

/// Outcome of handling one peer event. Never an error: everything that is
/// not a match is logged and dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Lifecycle event (or a direct message not fed into matching).
    Informational,
    Resolved { query_id: String, kind: ReplyKind },
    /// Well-formed reply with no live request (late, duplicate, or foreign).
    Unmatched { query_id: String, kind: ReplyKind },
    MonitorDelivered,
    /// Monitor message with no live subscriber.
    MonitorDropped,
    Discarded(DiscardReason),
}

impl Disposition {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Disposition::Resolved { .. })
    }
}

/// Turns peer events into registry / monitor / directory effects.
pub struct Classifier {
    node: String,
    registry: Arc<PendingRegistry>,
    monitor: MonitorHub,
    directory: Arc<PeerDirectory>,
    match_direct: bool,
}

impl Classifier {
    pub fn new(
        node: impl Into<String>,
        registry: Arc<PendingRegistry>,
        monitor: MonitorHub,
        directory: Arc<PeerDirectory>,
        match_direct: bool,
    ) -> Self {
        Self {
            node: node.into(),
            registry,
            monitor,
            directory,
            match_direct,
        }
    }

    pub fn handle(&self, event: PeerEvent) -> Disposition {
        match event {
            PeerEvent::PeerJoined {
                peer_id,
                name,
                headers,
                address,
            } => {
                tracing::info!(node = %self.node, peer = %name, peer_id = %peer_id, address = %address, "peer entered");
                for (k, v) in &headers {
                    tracing::debug!(peer = %name, header = %k, value = %v, "peer header");
                }
                self.directory.entered(&peer_id, &name, headers, &address);
                Disposition::Informational
            }
            PeerEvent::PeerLeft { peer_id, name } => {
                tracing::info!(node = %self.node, peer = %name, peer_id = %peer_id, "peer exited");
                self.directory.exited(&peer_id);
                Disposition::Informational
            }
            PeerEvent::PeerUnresponsive { peer_id, name } => {
                tracing::info!(node = %self.node, peer = %name, peer_id = %peer_id, "peer is being evasive");
                self.directory.mark_evasive(&peer_id);
                Disposition::Informational
            }
            PeerEvent::GroupJoined {
                peer_id,
                name,
                group,
            } => {
                tracing::info!(node = %self.node, peer = %name, group = %group, "peer joined group");
                self.directory.joined(&peer_id, &name, &group);
                Disposition::Informational
            }
            PeerEvent::GroupLeft {
                peer_id,
                name,
                group,
            } => {
                tracing::info!(node = %self.node, peer = %name, group = %group, "peer left group");
                self.directory.left(&peer_id, &group);
                Disposition::Informational
            }
            PeerEvent::DirectMessage {
                peer_id,
                name,
                body,
            } => {
                self.directory.seen(&peer_id);
                if self.match_direct {
                    self.dispatch(&body)
                } else {
                    tracing::debug!(node = %self.node, peer = %name, bytes = body.len(), "direct message ignored");
                    Disposition::Informational
                }
            }
            PeerEvent::GroupMessage {
                peer_id,
                name,
                group,
                body,
            } => {
                self.directory.seen(&peer_id);
                tracing::trace!(node = %self.node, peer = %name, group = %group, "group message");
                self.dispatch(&body)
            }
            PeerEvent::Unrecognized { kind } => {
                tracing::warn!(node = %self.node, kind = %kind, "unrecognized transport event");
                Disposition::Discarded(DiscardReason::UnknownEvent(kind))
            }
        }
    }

    /// Decode one message body and route it by envelope type.
    pub fn dispatch(&self, body: &str) -> Disposition {
        let envelope = match Envelope::decode(body) {
            Ok(env) => env,
            Err(e) => {
                tracing::warn!(node = %self.node, error = %e, "undecodable message discarded");
                return Disposition::Discarded(DiscardReason::Undecodable);
            }
        };

        let Some(kind) = ReplyKind::from_type(&envelope.msg_type) else {
            tracing::debug!(node = %self.node, msg_type = %envelope.msg_type, "unknown message type");
            return Disposition::Discarded(DiscardReason::UnknownType(envelope.msg_type));
        };

        let Some(key) = kind.correlation_key() else {
            return self.deliver_monitor(envelope);
        };

        let document = match envelope.payload_document() {
            Ok(doc) => doc,
            Err(e) => {
                tracing::warn!(node = %self.node, msg_type = kind.as_str(), error = %e, "reply payload unreadable");
                return Disposition::Discarded(DiscardReason::BadPayload);
            }
        };

        let Some(query_id) = correlation_id(&document, key).map(str::to_owned) else {
            tracing::debug!(node = %self.node, msg_type = kind.as_str(), key, "reply without correlation id skipped");
            return Disposition::Discarded(DiscardReason::MissingCorrelation);
        };

        if self.registry.resolve(&query_id, document) {
            tracing::debug!(node = %self.node, query_id = %query_id, msg_type = kind.as_str(), "reply matched");
            Disposition::Resolved { query_id, kind }
        } else {
            tracing::debug!(node = %self.node, query_id = %query_id, msg_type = kind.as_str(), "reply has no pending request");
            Disposition::Unmatched { query_id, kind }
        }
    }

    fn deliver_monitor(&self, envelope: Envelope) -> Disposition {
        let payload = match envelope.payload_document() {
            Ok(doc) => doc,
            Err(e) => {
                tracing::warn!(node = %self.node, error = %e, "monitor payload unreadable");
                return Disposition::Discarded(DiscardReason::BadPayload);
            }
        };
        if self.monitor.publish(payload) {
            Disposition::MonitorDelivered
        } else {
            tracing::debug!(node = %self.node, "monitor message without subscriber dropped");
            Disposition::MonitorDropped
        }
    }
}
