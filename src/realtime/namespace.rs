use std::fmt;
use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::RwLock;
use serde_json::Value;

use super::client::{Client, ClientId};
use super::message::Message;
use super::room::Room;
use crate::hlog_trace;
use crate::logging;

/// Handler invoked for an inbound event, on the sending client's inbound pump.
pub type EventHandler = Arc<dyn Fn(&Arc<Client>, Value) + Send + Sync>;

/// A named channel grouping clients, rooms and event handlers.
///
/// Each collection has its own lock so an emit only ever contends with
/// membership changes of the same namespace.
pub struct Namespace {
    name: String,
    clients: RwLock<AHashMap<ClientId, Arc<Client>>>,
    rooms: RwLock<AHashMap<String, Arc<Room>>>,
    handlers: RwLock<AHashMap<String, EventHandler>>,
}

impl Namespace {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            clients: RwLock::new(AHashMap::new()),
            rooms: RwLock::new(AHashMap::new()),
            handlers: RwLock::new(AHashMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register the handler for `event`, replacing any previous one.
    ///
    /// Events that arrived before registration are not replayed.
    pub fn on<F>(&self, event: &str, handler: F)
    where
        F: Fn(&Arc<Client>, Value) + Send + Sync + 'static,
    {
        self.handlers
            .write()
            .insert(event.to_string(), Arc::new(handler));
    }

    /// Remove the handler for `event`. Returns whether one was registered.
    pub fn off(&self, event: &str) -> bool {
        self.handlers.write().remove(event).is_some()
    }

    pub fn has_handler(&self, event: &str) -> bool {
        self.handlers.read().contains_key(event)
    }

    /// Broadcast to every client currently in the namespace.
    pub fn emit(&self, event: &str, data: Value) {
        let message = Message::new(event, data).with_namespace(self.name.as_str());
        for client in self.clients() {
            client.push(message.clone());
        }
    }

    /// Get or create a room.
    pub fn room(&self, name: &str) -> Arc<Room> {
        if let Some(room) = self.rooms.read().get(name) {
            return Arc::clone(room);
        }

        let mut rooms = self.rooms.write();
        Arc::clone(
            rooms
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(Room::new(name, self.name.as_str()))),
        )
    }

    /// Look up a room without creating it.
    pub fn existing_room(&self, name: &str) -> Option<Arc<Room>> {
        self.rooms.read().get(name).cloned()
    }

    pub fn room_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.rooms.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn room_count(&self) -> usize {
        self.rooms.read().len()
    }

    /// Point-in-time snapshot of the connected clients.
    pub fn clients(&self) -> Vec<Arc<Client>> {
        self.clients.read().values().cloned().collect()
    }

    pub fn client(&self, id: &ClientId) -> Option<Arc<Client>> {
        self.clients.read().get(id).cloned()
    }

    pub fn client_ids(&self) -> Vec<ClientId> {
        self.clients.read().keys().cloned().collect()
    }

    pub fn client_count(&self) -> usize {
        self.clients.read().len()
    }

    pub(crate) fn add_member(&self, client: Arc<Client>) {
        self.clients.write().insert(client.id().clone(), client);
    }

    /// Drop the client from the namespace and from every room it joined.
    /// Safe to call more than once.
    pub(crate) fn remove_member(&self, client: &Client) {
        client.detach(self);
    }

    /// Erase from the client set only; the room cascade is driven by
    /// [`Client::detach`].
    pub(crate) fn forget_member(&self, id: &ClientId) {
        self.clients.write().remove(id);
    }

    /// Run the handler registered for `message.event`, if any.
    ///
    /// The handler is cloned out of the table so it runs with no lock held and
    /// may itself register handlers or emit.
    pub(crate) fn dispatch(&self, client: &Arc<Client>, message: Message) {
        let handler = self.handlers.read().get(&message.event).cloned();
        match handler {
            Some(handler) => {
                logging::log_event(&message.event, client.id().as_str(), &self.name);
                handler(client, message.data);
            }
            None => hlog_trace!("no handler for {:?} in {}", message.event, self.name),
        }
    }
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Namespace")
            .field("name", &self.name)
            .field("clients", &self.client_count())
            .field("rooms", &self.room_count())
            .field("handlers", &self.handlers.read().len())
            .finish()
    }
}
