//! Group transport layer.
//!
//! A transport is one node on a group pub/sub network: it announces itself
//! with headers, joins named groups, broadcasts to a group (shout), sends
//! point-to-point (whisper), and yields raw peer events. The event loop owns
//! its transport exclusively; everything else talks to it through commands.

pub mod memory;

use async_trait::async_trait;

use swmlink_core::error::Result;
use swmlink_core::protocol::RawEvent;

pub use memory::{LocalBus, MemoryTransport};

#[async_trait]
pub trait GroupTransport: Send {
    /// Unique node id on the network.
    fn uuid(&self) -> &str;
    fn name(&self) -> &str;
    /// Header announced to peers on ENTER. Only effective before `start`.
    fn set_header(&mut self, key: &str, value: &str);
    async fn start(&mut self) -> Result<()>;
    async fn join(&mut self, group: &str) -> Result<()>;
    async fn leave(&mut self, group: &str) -> Result<()>;
    async fn shout(&mut self, group: &str, body: &str) -> Result<()>;
    async fn whisper(&mut self, peer: &str, body: &str) -> Result<()>;
    /// Next event. Must be cancel-safe; `None` means the transport is closed.
    async fn recv(&mut self) -> Option<RawEvent>;
    async fn stop(&mut self);
}
