use std::fmt;

/// Failures surfaced by the transport and codec collaborators.
///
/// None of these ever reach the application: each one ends the affected
/// client's connection and nothing else.
#[derive(Debug, thiserror::Error)]
pub enum SocketError {
    /// Upgrade/handshake rejected; the connection never enters the registry.
    #[error("handshake failed: {0}")]
    Handshake(String),
    /// An inbound frame could not be turned into a message.
    #[error("decode error: {0}")]
    Decode(String),
    /// An outbound message could not be serialized.
    #[error("encode error: {0}")]
    Encode(String),
    /// The peer went away.
    #[error("connection closed")]
    Closed,
    /// Any other I/O level failure reported by the transport.
    #[error("transport error: {0}")]
    Transport(String),
}

impl SocketError {
    pub fn decode(err: impl fmt::Display) -> Self {
        Self::Decode(err.to_string())
    }

    pub fn encode(err: impl fmt::Display) -> Self {
        Self::Encode(err.to_string())
    }

    pub fn transport(err: impl fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }

    /// Short name used in connection logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Handshake(_) => "handshake",
            Self::Decode(_) => "decode",
            Self::Encode(_) => "encode",
            Self::Closed => "closed",
            Self::Transport(_) => "transport",
        }
    }
}

impl From<serde_json::Error> for SocketError {
    fn from(err: serde_json::Error) -> Self {
        Self::decode(err)
    }
}

pub type Result<T> = std::result::Result<T, SocketError>;
