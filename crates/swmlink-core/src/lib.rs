//! swmlink core: wire envelope, correlation ids and transport event shapes.
//!
//! Everything a world model client needs to read or write messages without
//! pulling in a runtime or a transport.
//!
//! # Panic policy
//! `panic!`, `unwrap` and `expect` are denied by clippy in this crate. Bad
//! peer traffic comes back as `SwmError::Decode`.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod protocol;

pub use error::{ErrorCode, Result, SwmError};
