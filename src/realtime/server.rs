use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;

use super::client::{spawn_pumps, Client};
use super::message::{JsonCodec, MessageCodec};
use super::namespace::Namespace;
use crate::config::SocketConfig;
use crate::logging;
use crate::transport::Transport;

/// Counters across the whole registry.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ServerStats {
    pub namespaces: usize,
    pub clients: usize,
    pub rooms: usize,
}

/// Registry of namespaces and the entry point for new connections.
///
/// One per process is the usual shape, but nothing global is involved: share
/// it as an `Arc<Server>` with whatever accepts connections. Namespaces are
/// created lazily and live as long as the server.
///
/// ```
/// use std::sync::Arc;
/// use hypern_socket::{Server, SocketConfig};
///
/// let server = Arc::new(Server::new(SocketConfig::default()));
/// let chat = server.namespace("/chat");
/// chat.on("message", |client, data| client.emit("echo", data));
/// ```
pub struct Server {
    namespaces: DashMap<String, Arc<Namespace>>,
    config: SocketConfig,
    codec: Arc<dyn MessageCodec>,
}

impl Server {
    pub fn new(config: SocketConfig) -> Self {
        Self::with_codec(config, JsonCodec)
    }

    pub fn with_codec<C: MessageCodec>(config: SocketConfig, codec: C) -> Self {
        Self {
            namespaces: DashMap::new(),
            config,
            codec: Arc::new(codec),
        }
    }

    pub fn config(&self) -> &SocketConfig {
        &self.config
    }

    pub fn codec(&self) -> Arc<dyn MessageCodec> {
        Arc::clone(&self.codec)
    }

    /// Get or create a namespace. Concurrent first lookups of the same name
    /// all observe the same instance.
    pub fn namespace(&self, name: &str) -> Arc<Namespace> {
        if let Some(namespace) = self.namespaces.get(name) {
            return Arc::clone(namespace.value());
        }

        Arc::clone(
            self.namespaces
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(Namespace::new(name)))
                .value(),
        )
    }

    pub fn has_namespace(&self, name: &str) -> bool {
        self.namespaces.contains_key(name)
    }

    pub fn namespace_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.namespaces.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Bind an established connection to `namespace` and start its pumps.
    ///
    /// Must be called from within a tokio runtime. The returned handle is for
    /// callers that want it; the connection runs on its own either way.
    pub fn accept_connection<T: Transport>(&self, namespace: &str, transport: T) -> Arc<Client> {
        let namespace = self.namespace(namespace);
        let (client, outbox) = Client::new(&namespace, self.config.effective_queue_capacity());
        namespace.add_member(Arc::clone(&client));

        logging::log_connection("connect", client.id().as_str(), namespace.name());
        spawn_pumps(Arc::clone(&client), transport, outbox, self.codec());
        client
    }

    pub fn stats(&self) -> ServerStats {
        let mut stats = ServerStats {
            namespaces: self.namespaces.len(),
            ..ServerStats::default()
        };
        for entry in self.namespaces.iter() {
            stats.clients += entry.client_count();
            stats.rooms += entry.room_count();
        }
        stats
    }
}

impl Default for Server {
    fn default() -> Self {
        Self::new(SocketConfig::default())
    }
}

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("namespaces", &self.namespaces.len())
            .field("config", &self.config)
            .finish()
    }
}
