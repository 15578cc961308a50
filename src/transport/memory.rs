use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{Transport, TransportReader, TransportWriter};
use crate::errors::{Result, SocketError};
use crate::realtime::message::{Frame, JsonCodec, Message, MessageCodec};

/// Server side of an in-process connection.
pub struct MemoryTransport {
    incoming: mpsc::Receiver<Frame>,
    outgoing: mpsc::Sender<Frame>,
}

/// Peer side of an in-process connection, driven by tests or an embedder.
pub struct MemoryPeer {
    tx: Option<mpsc::Sender<Frame>>,
    rx: mpsc::Receiver<Frame>,
}

/// Create a connected transport/peer pair. `capacity` bounds each direction.
pub fn pair(capacity: usize) -> (MemoryTransport, MemoryPeer) {
    let (to_server, incoming) = mpsc::channel(capacity.max(1));
    let (outgoing, from_server) = mpsc::channel(capacity.max(1));
    (
        MemoryTransport { incoming, outgoing },
        MemoryPeer {
            tx: Some(to_server),
            rx: from_server,
        },
    )
}

pub struct MemoryReader {
    rx: mpsc::Receiver<Frame>,
}

pub struct MemoryWriter {
    tx: Option<mpsc::Sender<Frame>>,
}

impl Transport for MemoryTransport {
    type Reader = MemoryReader;
    type Writer = MemoryWriter;

    fn split(self) -> (MemoryReader, MemoryWriter) {
        (
            MemoryReader { rx: self.incoming },
            MemoryWriter {
                tx: Some(self.outgoing),
            },
        )
    }
}

#[async_trait]
impl TransportReader for MemoryReader {
    async fn recv(&mut self) -> Result<Option<Frame>> {
        Ok(self.rx.recv().await)
    }
}

#[async_trait]
impl TransportWriter for MemoryWriter {
    async fn send(&mut self, frame: Frame) -> Result<()> {
        match self.tx {
            Some(ref tx) => tx.send(frame).await.map_err(|_| SocketError::Closed),
            None => Err(SocketError::Closed),
        }
    }

    async fn close(&mut self) {
        self.tx = None;
    }
}

impl MemoryPeer {
    pub async fn send(&self, frame: Frame) -> Result<()> {
        match self.tx {
            Some(ref tx) => tx.send(frame).await.map_err(|_| SocketError::Closed),
            None => Err(SocketError::Closed),
        }
    }

    /// Send a message encoded with the default JSON codec.
    pub async fn send_message(&self, message: &Message) -> Result<()> {
        self.send(JsonCodec.encode(message)?).await
    }

    /// Next frame written by the server; `None` once the server closed.
    pub async fn recv(&mut self) -> Option<Frame> {
        self.rx.recv().await
    }

    /// Next frame decoded with the default JSON codec.
    pub async fn recv_message(&mut self) -> Option<Result<Message>> {
        let frame = self.recv().await?;
        Some(JsonCodec.decode(frame))
    }

    /// Non-blocking variant of [`MemoryPeer::recv`].
    pub fn try_recv(&mut self) -> Option<Frame> {
        self.rx.try_recv().ok()
    }

    /// Hang up. The server sees a clean close on its next read.
    pub fn close(&mut self) {
        self.tx = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn frames_flow_both_ways() {
        let (transport, mut peer) = pair(4);
        let (mut reader, mut writer) = transport.split();

        peer.send_message(&Message::new("ping", json!(null))).await.unwrap();
        let frame = reader.recv().await.unwrap().unwrap();
        assert_eq!(JsonCodec.decode(frame).unwrap().event, "ping");

        writer.send(Frame::Text("hello".into())).await.unwrap();
        assert_eq!(peer.recv().await, Some(Frame::Text("hello".into())));
    }

    #[tokio::test]
    async fn closing_either_side_ends_the_stream() {
        let (transport, mut peer) = pair(4);
        let (mut reader, mut writer) = transport.split();

        peer.close();
        assert_eq!(reader.recv().await.unwrap(), None);
        assert!(peer.send(Frame::Text("late".into())).await.is_err());

        writer.close().await;
        assert_eq!(peer.recv().await, None);
        assert!(matches!(
            writer.send(Frame::Text("late".into())).await,
            Err(SocketError::Closed)
        ));
    }
}
