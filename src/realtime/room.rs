use std::fmt;
use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::RwLock;
use serde_json::Value;

use super::client::{Client, ClientId};
use super::message::Message;

/// A named subset of a namespace's clients.
///
/// Rooms are created on first lookup and live as long as their namespace.
/// Membership has its own lock, independent of the namespace's.
pub struct Room {
    name: String,
    namespace: String,
    clients: RwLock<AHashMap<ClientId, Arc<Client>>>,
}

impl Room {
    pub(crate) fn new(name: &str, namespace: &str) -> Self {
        Self {
            name: name.to_string(),
            namespace: namespace.to_string(),
            clients: RwLock::new(AHashMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the owning namespace.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Broadcast to the room's current members; the message carries the room name.
    pub fn emit(&self, event: &str, data: Value) {
        let message = Message::new(event, data)
            .with_namespace(self.namespace.as_str())
            .with_room(self.name.as_str());
        let members: Vec<Arc<Client>> = self.clients.read().values().cloned().collect();
        for client in members {
            client.push(message.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.clients.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.read().is_empty()
    }

    pub fn contains(&self, id: &ClientId) -> bool {
        self.clients.read().contains_key(id)
    }

    pub fn client_ids(&self) -> Vec<ClientId> {
        self.clients.read().keys().cloned().collect()
    }

    pub(crate) fn add_member(&self, client: Arc<Client>) {
        self.clients.write().insert(client.id().clone(), client);
    }

    pub(crate) fn remove_member(&self, id: &ClientId) {
        self.clients.write().remove(id);
    }
}

impl fmt::Debug for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Room")
            .field("name", &self.name)
            .field("namespace", &self.namespace)
            .field("clients", &self.len())
            .finish()
    }
}
