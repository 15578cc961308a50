//! Minimal chat server: `cargo run --example chat`, then open http://localhost:8080.

use std::sync::Arc;

use axum::response::Html;
use axum::routing::get;
use axum::Router;
use hypern_socket::logging::install_log_bridge;
use hypern_socket::{hlog_info, websocket_route, Server, SocketConfig};
use serde_json::json;

const PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>hypern-socket chat</title></head>
<body>
  <div id="messages" style="height:300px;overflow-y:scroll;border:1px solid #ccc"></div>
  <input id="text" placeholder="Message"><button onclick="say()">Send</button>
  <input id="room" placeholder="Room"><button onclick="join()">Join</button>
  <button onclick="sayRoom()">Send to room</button>
  <script>
    const ws = new WebSocket(`ws://${location.host}/ws`);
    const log = (t) => { const d = document.createElement('div'); d.textContent = t; messages.appendChild(d); };
    ws.onmessage = (e) => { const m = JSON.parse(e.data); log(m.event + ': ' + JSON.stringify(m.data)); };
    const send = (event, data) => ws.send(JSON.stringify({ event, data }));
    const say = () => send('message', text.value);
    const join = () => send('join-room', room.value);
    const sayRoom = () => send('room-message', { room: room.value, text: text.value });
  </script>
</body>
</html>"#;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let config = SocketConfig::from_env();
    config.init_logging();
    install_log_bridge();

    let server = Arc::new(Server::new(config));
    let ns = server.namespace("/");

    ns.on("message", |client, data| {
        hlog_info!("{} said {}", client.id(), data);
        if let Some(chat) = client.namespace() {
            chat.emit("message", json!({ "from": client.id().as_str(), "text": data }));
        }
    });

    ns.on("join-room", |client, data| {
        let (Some(room), Some(chat)) = (data.as_str(), client.namespace()) else {
            return;
        };
        client.join(room);
        chat.room(room)
            .emit("user-joined", json!({ "user": client.id().as_str(), "room": room }));
    });

    ns.on("room-message", |client, data| {
        let room = data.get("room").and_then(|r| r.as_str());
        let (Some(room), Some(chat)) = (room, client.namespace()) else {
            return;
        };
        chat.room(room).emit(
            "room-message",
            json!({ "from": client.id().as_str(), "text": data.get("text"), "room": room }),
        );
    });

    let app: Router = Router::new()
        .route("/", get(|| async { Html(PAGE) }))
        .route("/ws", websocket_route(Arc::clone(&server), "/"));

    let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
    hlog_info!("chat listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await
}
