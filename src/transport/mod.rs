//! Transport seam between the realtime core and whatever carries the bytes.
//!
//! The core only needs an ordered, bidirectional stream of frames that can be
//! split so the inbound and outbound pumps own one half each. The axum
//! WebSocket adapter lives in [`crate::ws`]; [`memory`] is an in-process
//! pair for tests and embedding.

pub mod memory;

use async_trait::async_trait;

use crate::errors::Result;
use crate::realtime::message::Frame;

/// An established (already upgraded) connection.
pub trait Transport: Send + 'static {
    type Reader: TransportReader;
    type Writer: TransportWriter;

    fn split(self) -> (Self::Reader, Self::Writer);
}

#[async_trait]
pub trait TransportReader: Send + 'static {
    /// Next frame from the peer. `Ok(None)` means the peer closed cleanly.
    async fn recv(&mut self) -> Result<Option<Frame>>;
}

#[async_trait]
pub trait TransportWriter: Send + 'static {
    async fn send(&mut self, frame: Frame) -> Result<()>;

    /// Close the connection. Errors are swallowed; the peer is going away anyway.
    async fn close(&mut self);
}

pub use memory::{MemoryPeer, MemoryTransport};
