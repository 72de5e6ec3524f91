//! Top-level facade crate for swmlink.
//!
//! Re-exports the protocol core and the node runtime so users can depend on a single crate.

pub mod core {
    pub use swmlink_core::*;
}

pub mod node {
    pub use swmlink_node::*;
}
