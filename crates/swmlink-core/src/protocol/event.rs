//! Group transport events (multi-frame) and their typed form.
//!
//! The pub/sub layer delivers each event as a kind string plus ordered frames.
//! Parsing rules:
//! - Frame count must match the kind exactly; otherwise the event is rejected.
//! - Text frames must be UTF-8; the ENTER headers frame is a JSON object of strings.
//! - Unknown kinds are not an error: they decode to `PeerEvent::Unrecognized`.

use std::collections::BTreeMap;

use bytes::Bytes;

use crate::error::{Result, SwmError};

/// Event kind strings as emitted by the group transport.
pub mod kind {
    pub const ENTER: &str = "ENTER";
    pub const EXIT: &str = "EXIT";
    pub const JOIN: &str = "JOIN";
    pub const LEAVE: &str = "LEAVE";
    pub const EVASIVE: &str = "EVASIVE";
    pub const WHISPER: &str = "WHISPER";
    pub const SHOUT: &str = "SHOUT";
}

/// Undecoded transport event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub kind: String,
    pub frames: Vec<Bytes>,
}

impl RawEvent {
    pub fn new(kind: impl Into<String>, frames: Vec<Bytes>) -> Self {
        Self {
            kind: kind.into(),
            frames,
        }
    }

    pub fn enter(
        peer_id: &str,
        name: &str,
        headers: &BTreeMap<String, String>,
        address: &str,
    ) -> Self {
        let packed = serde_json::to_vec(headers).unwrap_or_else(|_| b"{}".to_vec());
        Self::new(
            kind::ENTER,
            vec![text(peer_id), text(name), Bytes::from(packed), text(address)],
        )
    }

    pub fn exit(peer_id: &str, name: &str) -> Self {
        Self::new(kind::EXIT, vec![text(peer_id), text(name)])
    }

    pub fn join(peer_id: &str, name: &str, group: &str) -> Self {
        Self::new(kind::JOIN, vec![text(peer_id), text(name), text(group)])
    }

    pub fn leave(peer_id: &str, name: &str, group: &str) -> Self {
        Self::new(kind::LEAVE, vec![text(peer_id), text(name), text(group)])
    }

    pub fn evasive(peer_id: &str, name: &str) -> Self {
        Self::new(kind::EVASIVE, vec![text(peer_id), text(name)])
    }

    pub fn whisper(peer_id: &str, name: &str, body: &str) -> Self {
        Self::new(kind::WHISPER, vec![text(peer_id), text(name), text(body)])
    }

    pub fn shout(peer_id: &str, name: &str, group: &str, body: &str) -> Self {
        Self::new(
            kind::SHOUT,
            vec![text(peer_id), text(name), text(group), text(body)],
        )
    }
}

fn text(s: &str) -> Bytes {
    Bytes::copy_from_slice(s.as_bytes())
}

/// Classified transport event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerEvent {
    /// A peer appeared on the network (ENTER).
    PeerJoined {
        peer_id: String,
        name: String,
        headers: BTreeMap<String, String>,
        address: String,
    },
    /// A peer disappeared (EXIT).
    PeerLeft { peer_id: String, name: String },
    /// A peer stopped answering heartbeats (EVASIVE).
    PeerUnresponsive { peer_id: String, name: String },
    /// A peer joined a group (JOIN).
    GroupJoined {
        peer_id: String,
        name: String,
        group: String,
    },
    /// A peer left a group (LEAVE).
    GroupLeft {
        peer_id: String,
        name: String,
        group: String,
    },
    /// Point-to-point message (WHISPER).
    DirectMessage {
        peer_id: String,
        name: String,
        body: String,
    },
    /// Group broadcast (SHOUT).
    GroupMessage {
        peer_id: String,
        name: String,
        group: String,
        body: String,
    },
    /// Any other event kind.
    Unrecognized { kind: String },
}

impl PeerEvent {
    /// Decode a raw event into its typed form.
    pub fn decode(raw: &RawEvent) -> Result<Self> {
        let ev = match raw.kind.as_str() {
            kind::ENTER => {
                expect_frames(raw, 4)?;
                PeerEvent::PeerJoined {
                    peer_id: frame_text(raw, 0)?,
                    name: frame_text(raw, 1)?,
                    headers: frame_headers(raw, 2)?,
                    address: frame_text(raw, 3)?,
                }
            }
            kind::EXIT => {
                expect_frames(raw, 2)?;
                PeerEvent::PeerLeft {
                    peer_id: frame_text(raw, 0)?,
                    name: frame_text(raw, 1)?,
                }
            }
            kind::EVASIVE => {
                expect_frames(raw, 2)?;
                PeerEvent::PeerUnresponsive {
                    peer_id: frame_text(raw, 0)?,
                    name: frame_text(raw, 1)?,
                }
            }
            kind::JOIN => {
                expect_frames(raw, 3)?;
                PeerEvent::GroupJoined {
                    peer_id: frame_text(raw, 0)?,
                    name: frame_text(raw, 1)?,
                    group: frame_text(raw, 2)?,
                }
            }
            kind::LEAVE => {
                expect_frames(raw, 3)?;
                PeerEvent::GroupLeft {
                    peer_id: frame_text(raw, 0)?,
                    name: frame_text(raw, 1)?,
                    group: frame_text(raw, 2)?,
                }
            }
            kind::WHISPER => {
                expect_frames(raw, 3)?;
                PeerEvent::DirectMessage {
                    peer_id: frame_text(raw, 0)?,
                    name: frame_text(raw, 1)?,
                    body: frame_text(raw, 2)?,
                }
            }
            kind::SHOUT => {
                expect_frames(raw, 4)?;
                PeerEvent::GroupMessage {
                    peer_id: frame_text(raw, 0)?,
                    name: frame_text(raw, 1)?,
                    group: frame_text(raw, 2)?,
                    body: frame_text(raw, 3)?,
                }
            }
            other => PeerEvent::Unrecognized {
                kind: other.to_owned(),
            },
        };
        Ok(ev)
    }

    /// Sending/affected peer, when the event names one.
    pub fn peer_id(&self) -> Option<&str> {
        match self {
            PeerEvent::PeerJoined { peer_id, .. }
            | PeerEvent::PeerLeft { peer_id, .. }
            | PeerEvent::PeerUnresponsive { peer_id, .. }
            | PeerEvent::GroupJoined { peer_id, .. }
            | PeerEvent::GroupLeft { peer_id, .. }
            | PeerEvent::DirectMessage { peer_id, .. }
            | PeerEvent::GroupMessage { peer_id, .. } => Some(peer_id),
            PeerEvent::Unrecognized { .. } => None,
        }
    }
}

fn expect_frames(raw: &RawEvent, n: usize) -> Result<()> {
    if raw.frames.len() != n {
        return Err(SwmError::Decode(format!(
            "{} event expects {n} frames, got {}",
            raw.kind,
            raw.frames.len()
        )));
    }
    Ok(())
}

fn frame_text(raw: &RawEvent, idx: usize) -> Result<String> {
    let frame = raw
        .frames
        .get(idx)
        .ok_or_else(|| SwmError::Decode(format!("{} event missing frame {idx}", raw.kind)))?;
    std::str::from_utf8(frame)
        .map(str::to_owned)
        .map_err(|e| SwmError::Decode(format!("{} frame {idx} is not utf-8: {e}", raw.kind)))
}

fn frame_headers(raw: &RawEvent, idx: usize) -> Result<BTreeMap<String, String>> {
    let frame = raw
        .frames
        .get(idx)
        .ok_or_else(|| SwmError::Decode(format!("{} event missing frame {idx}", raw.kind)))?;
    if frame.is_empty() {
        return Ok(BTreeMap::new());
    }
    serde_json::from_slice(frame)
        .map_err(|e| SwmError::Decode(format!("{} headers frame invalid: {e}", raw.kind)))
}
