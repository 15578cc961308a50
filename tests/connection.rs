use std::sync::{mpsc as std_mpsc, Arc, Mutex};
use std::time::Duration;

use hypern_socket::transport::memory::{self, MemoryPeer};
use hypern_socket::{Frame, Message, Server, SocketConfig};
use serde_json::{json, Value};
use tokio::time::{sleep, timeout};

const WAIT: Duration = Duration::from_secs(2);

async fn wait_until(mut condition: impl FnMut() -> bool) {
    timeout(WAIT, async {
        while !condition() {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

async fn next_message(peer: &mut MemoryPeer) -> Message {
    timeout(WAIT, peer.recv_message())
        .await
        .expect("timed out waiting for a message")
        .expect("connection closed")
        .expect("undecodable frame")
}

async fn assert_silent(peer: &mut MemoryPeer) {
    assert!(
        timeout(Duration::from_millis(100), peer.recv()).await.is_err(),
        "peer received an unexpected frame"
    );
}

#[tokio::test]
async fn ping_gets_exactly_one_pong() {
    let server = Server::default();
    server
        .namespace("/")
        .on("ping", |client, _| client.emit("pong", Value::Null));

    let (transport, mut peer) = memory::pair(16);
    server.accept_connection("/", transport);

    peer.send_message(&Message::new("ping", Value::Null)).await.unwrap();

    let reply = next_message(&mut peer).await;
    assert_eq!(reply.event, "pong");
    assert_eq!(reply.data, Value::Null);
    assert_silent(&mut peer).await;
}

#[tokio::test]
async fn room_emit_reaches_members_only() {
    let server = Server::default();
    let (ta, mut a) = memory::pair(16);
    let (tb, mut b) = memory::pair(16);
    let client_a = server.accept_connection("/", ta);
    server.accept_connection("/", tb);

    client_a.join("r1");
    server.namespace("/").room("r1").emit("x", json!(42));

    let msg = next_message(&mut a).await;
    assert_eq!(msg.event, "x");
    assert_eq!(msg.data, json!(42));
    assert_eq!(msg.room.as_deref(), Some("r1"));
    assert_silent(&mut b).await;
}

#[tokio::test]
async fn namespace_emit_survives_a_stalled_consumer() {
    let server = Server::new(SocketConfig::new().with_queue_capacity(4));
    let chat = server.namespace("/chat");

    // capacity 1 and never read: this peer's outbound pump stalls
    let (stalled_transport, _stalled) = memory::pair(1);
    server.accept_connection("/chat", stalled_transport);
    let (t1, mut p1) = memory::pair(16);
    let (t2, mut p2) = memory::pair(16);
    server.accept_connection("/chat", t1);
    server.accept_connection("/chat", t2);
    assert_eq!(chat.client_count(), 3);

    for i in 0..10 {
        chat.emit("tick", json!(i));
    }

    for peer in [&mut p1, &mut p2] {
        for i in 0..4 {
            let msg = next_message(peer).await;
            assert_eq!(msg.event, "tick");
            assert_eq!(msg.namespace.as_deref(), Some("/chat"));
            assert_eq!(msg.data, json!(i));
        }
    }
}

#[tokio::test]
async fn closing_the_transport_tears_the_client_down() {
    let server = Server::default();
    let ns = server.namespace("/");
    let (transport, mut peer) = memory::pair(16);
    let client = server.accept_connection("/", transport);
    client.join("a");
    client.join("b");

    peer.close();

    wait_until(|| ns.client_count() == 0).await;
    assert!(!client.is_connected());
    assert!(client.rooms().is_empty());
    assert!(ns.room("a").is_empty());
    assert!(ns.room("b").is_empty());
    assert_eq!(timeout(WAIT, peer.recv()).await.unwrap(), None);
}

#[tokio::test]
async fn malformed_frame_is_treated_as_disconnect() {
    let server = Server::default();
    let ns = server.namespace("/");
    let (transport, mut peer) = memory::pair(16);
    let client = server.accept_connection("/", transport);
    client.join("room");

    peer.send(Frame::Text("{not json".into())).await.unwrap();

    wait_until(|| ns.client_count() == 0).await;
    assert!(ns.room("room").is_empty());
    assert_eq!(timeout(WAIT, peer.recv()).await.unwrap(), None);
}

#[tokio::test]
async fn panicking_handler_still_tears_the_client_down() {
    let server = Server::default();
    let ns = server.namespace("/");
    ns.on("boom", |_, _| panic!("handler failed"));
    let (transport, mut peer) = memory::pair(16);
    let client = server.accept_connection("/", transport);
    client.join("r");

    peer.send_message(&Message::new("boom", Value::Null)).await.unwrap();

    wait_until(|| ns.client_count() == 0).await;
    assert!(!client.is_connected());
    assert!(client.rooms().is_empty());
    assert!(ns.room("r").is_empty());

    ns.emit("still", json!(1));
    assert_eq!(timeout(WAIT, peer.recv()).await.unwrap(), None);
}

#[tokio::test]
async fn unknown_events_are_ignored() {
    let server = Server::default();
    server
        .namespace("/")
        .on("ping", |client, _| client.emit("pong", Value::Null));
    let (transport, mut peer) = memory::pair(16);
    let client = server.accept_connection("/", transport);

    peer.send_message(&Message::new("mystery", json!({"x": 1}))).await.unwrap();
    peer.send_message(&Message::new("ping", Value::Null)).await.unwrap();

    assert_eq!(next_message(&mut peer).await.event, "pong");
    assert!(client.is_connected());
}

#[tokio::test]
async fn inbound_namespace_field_does_not_reroute() {
    let server = Server::default();
    server
        .namespace("/")
        .on("who", |client, _| client.emit("you", json!(client.namespace_name())));
    server
        .namespace("/other")
        .on("who", |client, _| client.emit("wrong", Value::Null));
    let (transport, mut peer) = memory::pair(16);
    server.accept_connection("/", transport);

    peer.send_message(&Message::new("who", Value::Null).with_namespace("/other"))
        .await
        .unwrap();

    let msg = next_message(&mut peer).await;
    assert_eq!(msg.event, "you");
    assert_eq!(msg.data, json!("/"));
}

#[tokio::test]
async fn handlers_can_join_rooms_and_broadcast() {
    let server = Arc::new(Server::default());
    server.namespace("/").on("join-room", |client, data| {
        let (Some(room), Some(ns)) = (data.as_str(), client.namespace()) else {
            return;
        };
        client.join(room);
        ns.room(room)
            .emit("user-joined", json!({ "user": client.id().as_str(), "room": room }));
    });

    let (ta, mut a) = memory::pair(16);
    let (tb, mut b) = memory::pair(16);
    let client_a = server.accept_connection("/", ta);
    server.accept_connection("/", tb);

    a.send_message(&Message::new("join-room", json!("lobby"))).await.unwrap();

    let msg = next_message(&mut a).await;
    assert_eq!(msg.event, "user-joined");
    assert_eq!(msg.data["user"], json!(client_a.id().as_str()));
    assert_eq!(client_a.rooms(), vec!["lobby".to_string()]);
    assert_silent(&mut b).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn blocked_handler_only_stalls_its_own_client() {
    let server = Server::default();
    let ns = server.namespace("/");
    let (release_tx, release_rx) = std_mpsc::channel::<()>();
    let release_rx = Mutex::new(release_rx);
    ns.on("block", move |_, _| {
        let _ = release_rx.lock().unwrap().recv_timeout(Duration::from_secs(5));
    });
    ns.on("ping", |client, _| client.emit("pong", Value::Null));

    let (ta, a) = memory::pair(16);
    let (tb, mut b) = memory::pair(16);
    server.accept_connection("/", ta);
    server.accept_connection("/", tb);

    a.send_message(&Message::new("block", Value::Null)).await.unwrap();
    sleep(Duration::from_millis(50)).await;
    b.send_message(&Message::new("ping", Value::Null)).await.unwrap();

    assert_eq!(next_message(&mut b).await.event, "pong");
    release_tx.send(()).unwrap();
}

#[tokio::test]
async fn client_emit_reaches_only_that_client() {
    let server = Server::default();
    let (ta, mut a) = memory::pair(16);
    let (tb, mut b) = memory::pair(16);
    let client_a = server.accept_connection("/", ta);
    server.accept_connection("/", tb);

    client_a.emit("direct", json!("hi"));

    let msg = next_message(&mut a).await;
    assert_eq!(msg.event, "direct");
    assert_eq!(msg.data, json!("hi"));
    assert_silent(&mut b).await;
}
