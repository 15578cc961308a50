//! axum WebSocket front for the realtime core.

pub mod websocket;

pub use websocket::{websocket_route, WebSocketTransport};
