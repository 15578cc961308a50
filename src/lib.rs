//! Socket.IO-style namespaces, rooms and named events over bidirectional
//! connections.
//!
//! The core ([`realtime`]) only sees an ordered stream of frames
//! ([`transport`]) and an injectable codec; [`ws`] plugs it into axum.

pub mod config;
pub mod errors;
pub mod logging;
pub mod realtime;
pub mod transport;
pub mod ws;

pub use config::SocketConfig;
pub use errors::{Result, SocketError};
pub use realtime::{
    Client, ClientId, EventHandler, Frame, JsonCodec, Message, MessageCodec, Namespace, Room,
    Server, ServerStats,
};
pub use transport::{Transport, TransportReader, TransportWriter};
pub use ws::websocket_route;
