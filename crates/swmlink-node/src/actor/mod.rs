//! Event loop actor.
//!
//! One task per Component owns the transport. It multiplexes:
//! - the command channel (shout / whisper / terminate from senders)
//! - transport events, polled with a fixed quantum
//!
//! State (`Running` / `Stopped`) is published on a watch channel.

pub mod event_loop;

pub use event_loop::{Command, EventLoop, LoopState};
