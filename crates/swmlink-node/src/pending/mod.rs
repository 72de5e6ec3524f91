//! In-flight request bookkeeping.
//!
//! The registry is the only structure shared between senders and the event
//! loop. Every entry is removed exactly once: by `resolve` (reply matched), by
//! `cancel` (timeout / caller gave up), or by `drain_all` (teardown).

pub mod registry;

pub use registry::{PendingHandle, PendingRegistry, PendingRequest};
