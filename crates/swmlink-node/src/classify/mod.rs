//! Peer-event classification and reply matching.

pub mod classifier;
pub mod directory;

pub use classifier::{Classifier, DiscardReason, Disposition};
pub use directory::{PeerDirectory, PeerInfo};
