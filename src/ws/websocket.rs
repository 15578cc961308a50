use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, MethodRouter};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};

use crate::errors::{Result, SocketError};
use crate::hlog_debug;
use crate::realtime::message::Frame;
use crate::realtime::Server;
use crate::transport::{Transport, TransportReader, TransportWriter};

/// An upgraded axum WebSocket seen as a core transport.
pub struct WebSocketTransport {
    socket: WebSocket,
}

impl WebSocketTransport {
    pub fn new(socket: WebSocket) -> Self {
        Self { socket }
    }
}

pub struct WebSocketReader {
    stream: SplitStream<WebSocket>,
}

pub struct WebSocketWriter {
    sink: SplitSink<WebSocket, WsMessage>,
}

impl Transport for WebSocketTransport {
    type Reader = WebSocketReader;
    type Writer = WebSocketWriter;

    fn split(self) -> (WebSocketReader, WebSocketWriter) {
        let (sink, stream) = self.socket.split();
        (WebSocketReader { stream }, WebSocketWriter { sink })
    }
}

#[async_trait]
impl TransportReader for WebSocketReader {
    async fn recv(&mut self) -> Result<Option<Frame>> {
        loop {
            match self.stream.next().await {
                None | Some(Ok(WsMessage::Close(_))) => return Ok(None),
                Some(Ok(WsMessage::Text(text))) => {
                    return Ok(Some(Frame::Text(text.as_str().to_owned())));
                }
                Some(Ok(WsMessage::Binary(bytes))) => return Ok(Some(Frame::Binary(bytes))),
                // axum answers pings itself
                Some(Ok(WsMessage::Ping(_))) | Some(Ok(WsMessage::Pong(_))) => continue,
                Some(Err(err)) => return Err(SocketError::transport(err)),
            }
        }
    }
}

#[async_trait]
impl TransportWriter for WebSocketWriter {
    async fn send(&mut self, frame: Frame) -> Result<()> {
        let message = match frame {
            Frame::Text(text) => WsMessage::Text(text.into()),
            Frame::Binary(bytes) => WsMessage::Binary(bytes),
        };
        self.sink.send(message).await.map_err(SocketError::transport)
    }

    async fn close(&mut self) {
        let _ = self.sink.send(WsMessage::Close(None)).await;
        let _ = self.sink.close().await;
    }
}

/// GET route that upgrades to a WebSocket and binds it to `namespace`.
///
/// Mount it like any other route:
/// `Router::new().route("/ws", websocket_route(server, "/"))`.
pub fn websocket_route<S>(server: Arc<Server>, namespace: &str) -> MethodRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    let namespace: Arc<str> = Arc::from(namespace);
    get(move |ws: WebSocketUpgrade, headers: HeaderMap| {
        let server = Arc::clone(&server);
        let namespace = Arc::clone(&namespace);
        async move { upgrade(server, namespace, ws, headers) }
    })
}

/// Handshake: origin policy, optional size limit, then hand over to the registry.
/// A rejected or failed upgrade never reaches the core.
fn upgrade(
    server: Arc<Server>,
    namespace: Arc<str>,
    ws: WebSocketUpgrade,
    headers: HeaderMap,
) -> Response {
    let origin = headers
        .get(header::ORIGIN)
        .and_then(|value| value.to_str().ok());
    if !server.config().origin_allowed(origin) {
        let err = SocketError::Handshake(format!("origin {:?} not allowed", origin));
        hlog_debug!("rejecting upgrade on {}: {}", namespace, err);
        return (StatusCode::FORBIDDEN, "origin not allowed").into_response();
    }

    let ws = match server.config().max_frame_size {
        Some(limit) => ws.max_message_size(limit).max_frame_size(limit),
        None => ws,
    };
    ws.on_failed_upgrade(|err| hlog_debug!("websocket upgrade failed: {}", err))
        .on_upgrade(move |socket| async move {
            server.accept_connection(&namespace, WebSocketTransport::new(socket));
        })
}
