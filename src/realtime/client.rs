use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use ahash::AHashSet;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::message::{Message, MessageCodec};
use super::namespace::Namespace;
use crate::logging;
use crate::transport::{Transport, TransportReader, TransportWriter};
use crate::{hlog_debug, hlog_trace};

/// Unique client identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(String);

impl ClientId {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }
}

impl From<&str> for ClientId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One connected peer.
///
/// Owned by its two pump tasks; namespaces and rooms only hold `Arc` handles
/// that are removed at teardown. The namespace back-reference is weak so a
/// client can never keep its namespace alive.
pub struct Client {
    id: ClientId,
    namespace: Weak<Namespace>,
    namespace_name: Arc<str>,
    /// Mirror of the rooms this client sits in. The room's own member set is
    /// authoritative; this lock also serializes join/leave/teardown.
    rooms: Mutex<AHashSet<String>>,
    /// Outbound queue. Taken (closed) at teardown.
    sender: RwLock<Option<mpsc::Sender<Message>>>,
    connected: AtomicBool,
    dropped: AtomicU64,
}

impl Client {
    pub(crate) fn new(
        namespace: &Arc<Namespace>,
        capacity: usize,
    ) -> (Arc<Client>, mpsc::Receiver<Message>) {
        Self::with_id(ClientId::new(), namespace, capacity)
    }

    pub(crate) fn with_id(
        id: ClientId,
        namespace: &Arc<Namespace>,
        capacity: usize,
    ) -> (Arc<Client>, mpsc::Receiver<Message>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let client = Arc::new(Client {
            id,
            namespace: Arc::downgrade(namespace),
            namespace_name: Arc::from(namespace.name()),
            rooms: Mutex::new(AHashSet::new()),
            sender: RwLock::new(Some(tx)),
            connected: AtomicBool::new(true),
            dropped: AtomicU64::new(0),
        });
        (client, rx)
    }

    pub fn id(&self) -> &ClientId {
        &self.id
    }

    pub fn namespace_name(&self) -> &str {
        &self.namespace_name
    }

    pub fn namespace(&self) -> Option<Arc<Namespace>> {
        self.namespace.upgrade()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Rooms this client has joined, sorted by name.
    pub fn rooms(&self) -> Vec<String> {
        let mut rooms: Vec<String> = self.rooms.lock().iter().cloned().collect();
        rooms.sort();
        rooms
    }

    pub fn in_room(&self, room: &str) -> bool {
        self.rooms.lock().contains(room)
    }

    /// Messages discarded because the outbound queue was full.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Join a room, creating it if needed. Joining twice is a no-op, as is
    /// joining after the connection has been torn down.
    pub fn join(self: &Arc<Self>, room_name: &str) {
        let mut rooms = self.rooms.lock();
        if !self.is_connected() || rooms.contains(room_name) {
            return;
        }
        let Some(namespace) = self.namespace() else {
            return;
        };

        namespace.room(room_name).add_member(Arc::clone(self));
        rooms.insert(room_name.to_string());
        hlog_trace!("{} joined {}:{}", self.id, self.namespace_name, room_name);
    }

    /// Leave a room. Leaving a room never joined is a no-op.
    pub fn leave(&self, room_name: &str) {
        let mut rooms = self.rooms.lock();
        rooms.remove(room_name);
        if let Some(room) = self.namespace().and_then(|ns| ns.existing_room(room_name)) {
            room.remove_member(&self.id);
        }
    }

    /// Send an event to this client only.
    pub fn emit(&self, event: &str, data: Value) {
        self.push(Message::new(event, data).with_namespace(self.namespace_name.as_ref()));
    }

    /// Best-effort enqueue. A full queue drops the message.
    pub(crate) fn push(&self, message: Message) {
        let guard = self.sender.read();
        let Some(ref tx) = *guard else {
            return;
        };
        match tx.try_send(message) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(message)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                hlog_debug!(
                    "outbound queue full for {}, dropping {:?}",
                    self.id,
                    message.event
                );
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }

    /// Teardown step run under the mirror lock: mark disconnected, leave the
    /// namespace and every joined room.
    pub(crate) fn detach(&self, namespace: &Namespace) {
        let mut rooms = self.rooms.lock();
        self.connected.store(false, Ordering::Release);
        namespace.forget_member(&self.id);
        for room_name in rooms.drain() {
            if let Some(room) = namespace.existing_room(&room_name) {
                room.remove_member(&self.id);
            }
        }
    }

    /// Close the outbound queue. The outbound pump drains what is left, then exits.
    pub(crate) fn close_queue(&self) {
        self.sender.write().take();
    }

    fn disconnect(&self) {
        match self.namespace() {
            Some(namespace) => namespace.remove_member(self),
            None => {
                self.connected.store(false, Ordering::Release);
                self.rooms.lock().clear();
            }
        }
        self.close_queue();
        logging::log_connection("disconnect", self.id.as_str(), &self.namespace_name);
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("id", &self.id)
            .field("namespace", &self.namespace_name)
            .field("rooms", &self.rooms())
            .field("connected", &self.is_connected())
            .field("dropped", &self.dropped_count())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Pumps
// ---------------------------------------------------------------------------

/// Split the transport and spawn the inbound and outbound pumps.
pub(crate) fn spawn_pumps<T: Transport>(
    client: Arc<Client>,
    transport: T,
    outbox: mpsc::Receiver<Message>,
    codec: Arc<dyn MessageCodec>,
) {
    let (reader, writer) = transport.split();

    tokio::spawn(outbound_pump(
        client.id().clone(),
        writer,
        outbox,
        Arc::clone(&codec),
    ));
    tokio::spawn(inbound_pump(client, reader, codec));
}

/// Tears the client down when the inbound pump ends, including by unwinding
/// out of a panicking handler.
struct Teardown(Arc<Client>);

impl Drop for Teardown {
    fn drop(&mut self) {
        self.0.disconnect();
    }
}

/// reading -> dispatching -> reading until the peer closes or sends garbage.
///
/// Handlers run inline, so a slow handler only delays this client's reads.
async fn inbound_pump<R: TransportReader>(
    client: Arc<Client>,
    mut reader: R,
    codec: Arc<dyn MessageCodec>,
) {
    let teardown = Teardown(client);
    let client = &teardown.0;

    loop {
        let frame = match reader.recv().await {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(err) => {
                hlog_debug!("read failed for {}: {}", client.id(), err);
                break;
            }
        };

        let message = match codec.decode(frame) {
            Ok(message) => message,
            Err(err) => {
                hlog_debug!("closing {} after {} error: {}", client.id(), err.kind(), err);
                break;
            }
        };

        match client.namespace() {
            Some(namespace) => namespace.dispatch(client, message),
            None => break,
        }
    }
}

/// draining -> writing -> draining until the queue closes or a write fails.
async fn outbound_pump<W: TransportWriter>(
    client_id: ClientId,
    mut writer: W,
    mut outbox: mpsc::Receiver<Message>,
    codec: Arc<dyn MessageCodec>,
) {
    while let Some(message) = outbox.recv().await {
        let written = match codec.encode(&message) {
            Ok(frame) => writer.send(frame).await,
            Err(err) => Err(err),
        };
        if let Err(err) = written {
            hlog_debug!("write failed for {}: {}", client_id, err);
            break;
        }
    }

    writer.close().await;
}
