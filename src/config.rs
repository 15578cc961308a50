use std::env;

use crate::logging::{LogConfig, LogLevel};

pub const ENV_QUEUE_CAPACITY: &str = "HYPERN_SOCKET_QUEUE_CAPACITY";
pub const ENV_ALLOWED_ORIGINS: &str = "HYPERN_SOCKET_ALLOWED_ORIGINS";
pub const ENV_MAX_FRAME_SIZE: &str = "HYPERN_SOCKET_MAX_FRAME_SIZE";
pub const ENV_LOG_LEVEL: &str = "HYPERN_SOCKET_LOG_LEVEL";

/// Tunables for a socket server.
#[derive(Debug, Clone)]
pub struct SocketConfig {
    /// Capacity of every client's outbound queue. Emits beyond it are dropped.
    pub queue_capacity: usize,
    /// Origins accepted during the upgrade. Empty means any origin.
    pub allowed_origins: Vec<String>,
    /// Largest inbound message the WebSocket front accepts, in bytes.
    /// `None` keeps axum's own limits.
    pub max_frame_size: Option<usize>,
    /// Logging setup applied by [`SocketConfig::init_logging`].
    pub log: LogConfig,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            allowed_origins: Vec::new(),
            max_frame_size: None,
            log: LogConfig::default(),
        }
    }
}

impl SocketConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `HYPERN_SOCKET_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(capacity) = parse_usize(ENV_QUEUE_CAPACITY, lookup(ENV_QUEUE_CAPACITY)) {
            config.queue_capacity = capacity;
        }
        if let Some(size) = parse_usize(ENV_MAX_FRAME_SIZE, lookup(ENV_MAX_FRAME_SIZE)) {
            config.max_frame_size = Some(size);
        }
        if let Some(origins) = lookup(ENV_ALLOWED_ORIGINS) {
            config.allowed_origins = parse_origins(&origins);
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            config.log.level = LogLevel::parse(level.trim());
        }

        config
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_allowed_origins<I, S>(mut self, origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_origins = origins.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = Some(size);
        self
    }

    pub fn with_log(mut self, log: LogConfig) -> Self {
        self.log = log;
        self
    }

    /// Queue capacity clamped to what `tokio::sync::mpsc` accepts.
    pub fn effective_queue_capacity(&self) -> usize {
        self.queue_capacity.max(1)
    }

    /// Origin policy check. A missing Origin header passes (non-browser peers).
    pub fn origin_allowed(&self, origin: Option<&str>) -> bool {
        if self.allowed_origins.is_empty() {
            return true;
        }
        match origin {
            Some(origin) => self
                .allowed_origins
                .iter()
                .any(|allowed| allowed == "*" || allowed.eq_ignore_ascii_case(origin)),
            None => true,
        }
    }

    /// Start the log queue with this config's log settings.
    pub fn init_logging(&self) {
        crate::logging::LogQueue::init(self.log.clone());
    }
}

fn parse_usize(key: &str, raw: Option<String>) -> Option<usize> {
    let raw = raw?;
    match raw.trim().parse::<usize>() {
        Ok(0) | Err(_) => {
            crate::hlog_warn!("ignoring invalid {}={:?}", key, raw);
            None
        }
        Ok(value) => Some(value),
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
