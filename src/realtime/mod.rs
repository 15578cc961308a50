//! Namespaces, rooms and clients.
//!
//! A [`Server`] owns namespaces; a [`Namespace`] owns its rooms and handler
//! table; clients are shared handles that disappear from every collection
//! when their connection ends.

pub mod client;
pub mod message;
pub mod namespace;
pub mod room;
pub mod server;

pub use client::{Client, ClientId};
pub use message::{Frame, JsonCodec, Message, MessageCodec};
pub use namespace::{EventHandler, Namespace};
pub use room::Room;
pub use server::{Server, ServerStats};
