//! swmlink node runtime.
//!
//! Wires configuration, the group transport, the pending-request registry,
//! the classifier and the event loop into a `Component`. Consumed by the demo
//! binary (`main.rs`) and by integration tests.

pub mod actor;
pub mod api;
pub mod classify;
pub mod component;
pub mod config;
pub mod monitor;
pub mod pending;
pub mod stub;
pub mod transport;

pub use component::Component;
