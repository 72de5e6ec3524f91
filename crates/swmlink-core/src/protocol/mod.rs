//! Protocol modules (wire envelope + transport events).
//!
//! - `envelope`: the four-field JSON envelope, message families, reply types,
//!   and correlation-id injection.
//! - `event`: multi-frame group transport events and their typed decoding.
//!
//! All parsers are panic-free: malformed input is reported as `SwmError`
//! instead of being partially interpreted.

pub mod envelope;
pub mod event;

pub use envelope::{correlation_id, encode, Encoded, Envelope, MessageFamily, ReplyKind};
pub use event::{PeerEvent, RawEvent};
