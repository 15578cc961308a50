use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

// ---------------------------------------------------------------------------
// Log Level
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
    Off = 5,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "TRACE",
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
            Self::Off => "OFF",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "trace" => Self::Trace,
            "debug" => Self::Debug,
            "info" => Self::Info,
            "warn" | "warning" => Self::Warn,
            "error" => Self::Error,
            "off" | "none" | "disabled" => Self::Off,
            _ => Self::Info,
        }
    }

    fn color_code(&self) -> &'static str {
        match self {
            Self::Trace => "\x1b[90m", // gray
            Self::Debug => "\x1b[36m", // cyan
            Self::Info => "\x1b[32m",  // green
            Self::Warn => "\x1b[33m",  // yellow
            Self::Error => "\x1b[31m", // red
            Self::Off => "",
        }
    }

    fn to_filter(self) -> log::LevelFilter {
        match self {
            Self::Trace => log::LevelFilter::Trace,
            Self::Debug => log::LevelFilter::Debug,
            Self::Info => log::LevelFilter::Info,
            Self::Warn => log::LevelFilter::Warn,
            Self::Error => log::LevelFilter::Error,
            Self::Off => log::LevelFilter::Off,
        }
    }
}

impl From<log::Level> for LogLevel {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Trace => Self::Trace,
            log::Level::Debug => Self::Debug,
            log::Level::Info => Self::Info,
            log::Level::Warn => Self::Warn,
            log::Level::Error => Self::Error,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Log Entry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: f64,
    pub level: LogLevel,
    pub message: String,
    pub target: Option<String>,
    /// For connection logs
    pub client_id: Option<String>,
    pub namespace: Option<String>,
    pub event: Option<String>,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: now_secs(),
            level,
            message: message.into(),
            target: None,
            client_id: None,
            namespace: None,
            event: None,
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Connection lifecycle entry (`connect`, `disconnect`, ...).
    pub fn connection(level: LogLevel, action: &str, client_id: &str, namespace: &str) -> Self {
        Self {
            timestamp: now_secs(),
            level,
            message: action.to_string(),
            target: Some("connection".into()),
            client_id: Some(client_id.to_string()),
            namespace: Some(namespace.to_string()),
            event: None,
        }
    }

    pub fn with_event(mut self, event: impl Into<String>) -> Self {
        self.event = Some(event.into());
        self
    }

    /// Format the log entry as a colored string for terminal output.
    fn format_colored(&self) -> String {
        let reset = "\x1b[0m";
        let dim = "\x1b[2m";
        let color = self.level.color_code();

        let ts = format_timestamp(self.timestamp);

        if self.target.as_deref() == Some("connection") {
            let cid = self.client_id.as_deref().unwrap_or("-");
            let ns = self.namespace.as_deref().unwrap_or("?");
            let event = self
                .event
                .as_deref()
                .map(|e| format!(" \x1b[35m{e}{reset}"))
                .unwrap_or_default();
            return format!(
                "{dim}{ts}{reset} {color}{:<5}{reset} {ns} {}{event} {dim}[{cid}]{reset}",
                self.level.as_str(),
                self.message,
            );
        }

        let target = self
            .target
            .as_deref()
            .map(|t| format!(" {dim}{t}{reset}"))
            .unwrap_or_default();

        format!(
            "{dim}{ts}{reset} {color}{:<5}{reset}{target} {}",
            self.level.as_str(),
            self.message,
        )
    }
}

fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

fn format_timestamp(ts: f64) -> String {
    use chrono::{DateTime, TimeZone, Utc};
    let secs = ts as i64;
    let micros = ((ts - secs as f64) * 1_000_000.0) as u32;
    let dt: DateTime<Utc> = Utc
        .timestamp_opt(secs, micros * 1_000)
        .single()
        .unwrap_or_else(Utc::now);
    dt.format("%Y-%m-%dT%H:%M:%S%.6f+00:00").to_string()
}

// ---------------------------------------------------------------------------
// Log Config
// ---------------------------------------------------------------------------

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum log level to output.
    pub level: LogLevel,
    /// Log connect/disconnect of every client.
    pub log_connections: bool,
    /// Log every dispatched inbound event (debug level).
    pub log_events: bool,
    /// Queue capacity.
    pub queue_size: usize,
    /// Event names never logged (e.g. chatty heartbeats).
    pub skip_events: Vec<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            log_connections: true,
            log_events: false,
            queue_size: 10_000,
            skip_events: vec!["ping".to_string(), "pong".to_string()],
        }
    }
}

impl LogConfig {
    pub fn should_skip_event(&self, event: &str) -> bool {
        self.skip_events.iter().any(|e| e == event)
    }

    /// Disable all logging.
    pub fn disabled() -> Self {
        Self {
            level: LogLevel::Off,
            log_connections: false,
            log_events: false,
            queue_size: 1,
            skip_events: vec![],
        }
    }

    /// Debug level with connection and event logs.
    pub fn verbose() -> Self {
        Self {
            level: LogLevel::Debug,
            log_connections: true,
            log_events: true,
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Log Queue (global, re-initializable)
// ---------------------------------------------------------------------------

static LOG_QUEUE: RwLock<Option<LogQueueInner>> = RwLock::new(None);

struct LogQueueInner {
    sender: Sender<LogEntry>,
    config: Arc<RwLock<LogConfig>>,
    running: Arc<AtomicBool>,
}

pub struct LogQueue;

impl LogQueue {
    /// Initialize (or re-initialize) the global log queue.
    pub fn init(config: LogConfig) {
        Self::shutdown();

        let queue_size = config.queue_size.max(1);
        let (sender, receiver) = bounded::<LogEntry>(queue_size);
        let running = Arc::new(AtomicBool::new(true));
        let cfg = Arc::new(RwLock::new(config));

        let inner = LogQueueInner {
            sender,
            config: cfg.clone(),
            running: running.clone(),
        };

        *LOG_QUEUE.write() = Some(inner);

        std::thread::Builder::new()
            .name("hypern-socket-logger".into())
            .spawn(move || {
                log_consumer(receiver, cfg, running);
            })
            .expect("Failed to spawn logger thread");
    }

    /// Shut down the log queue, flushing remaining entries.
    pub fn shutdown() {
        let guard = LOG_QUEUE.read();
        if let Some(ref inner) = *guard {
            inner.running.store(false, Ordering::SeqCst);
        }
        drop(guard);
        // Dropping the sender lets the consumer thread exit
        *LOG_QUEUE.write() = None;
    }

    /// Get a copy of the current log config.
    pub fn config() -> Option<LogConfig> {
        let guard = LOG_QUEUE.read();
        guard.as_ref().map(|inner| inner.config.read().clone())
    }
}

/// Whether an entry at `level` would be kept. Lets callers skip formatting.
#[inline]
pub fn enabled(level: LogLevel) -> bool {
    let guard = LOG_QUEUE.read();
    match *guard {
        Some(ref inner) => level >= inner.config.read().level,
        None => false,
    }
}

/// Send a log entry to the queue (non-blocking, drops if full).
#[inline]
pub fn log_entry(entry: LogEntry) {
    let guard = LOG_QUEUE.read();
    if let Some(ref inner) = *guard {
        let cfg = inner.config.read();
        if entry.level < cfg.level {
            return;
        }
        drop(cfg);
        let _ = inner.sender.try_send(entry);
    }
}

/// Convenience: log a message at the given level.
#[inline]
pub fn log(level: LogLevel, message: impl Into<String>) {
    log_entry(LogEntry::new(level, message));
}

/// Convenience: log a client connecting or disconnecting.
#[inline]
pub fn log_connection(action: &str, client_id: &str, namespace: &str) {
    {
        let guard = LOG_QUEUE.read();
        match *guard {
            Some(ref inner) if inner.config.read().log_connections => {}
            _ => return,
        }
    }
    log_entry(LogEntry::connection(LogLevel::Info, action, client_id, namespace));
}

/// Convenience: log an inbound event about to be dispatched.
#[inline]
pub fn log_event(event: &str, client_id: &str, namespace: &str) {
    {
        let guard = LOG_QUEUE.read();
        if let Some(ref inner) = *guard {
            let cfg = inner.config.read();
            if !cfg.log_events || cfg.should_skip_event(event) {
                return;
            }
        } else {
            return;
        }
    }
    log_entry(
        LogEntry::connection(LogLevel::Debug, "event", client_id, namespace).with_event(event),
    );
}

/// Consumer thread: drains the queue and writes to stderr.
fn log_consumer(
    receiver: Receiver<LogEntry>,
    config: Arc<RwLock<LogConfig>>,
    running: Arc<AtomicBool>,
) {
    use std::io::Write;

    let stderr = std::io::stderr();

    while running.load(Ordering::SeqCst) {
        match receiver.recv_timeout(std::time::Duration::from_millis(100)) {
            Ok(entry) => {
                let cfg = config.read();
                if entry.level >= cfg.level {
                    let line = entry.format_colored();
                    let mut handle = stderr.lock();
                    let _ = writeln!(handle, "{}", line);
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => continue,
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
        }
    }

    // Flush remaining entries
    for entry in receiver.try_iter() {
        let cfg = config.read();
        if entry.level >= cfg.level {
            eprintln!("{}", entry.format_colored());
        }
    }
}

// ---------------------------------------------------------------------------
// `log` facade bridge
// ---------------------------------------------------------------------------

struct QueueLogger;

static QUEUE_LOGGER: QueueLogger = QueueLogger;

impl log::Log for QueueLogger {
    fn enabled(&self, metadata: &log::Metadata<'_>) -> bool {
        LogQueue::config()
            .map(|cfg| LogLevel::from(metadata.level()) >= cfg.level)
            .unwrap_or(false)
    }

    fn log(&self, record: &log::Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        log_entry(
            LogEntry::new(record.level().into(), record.args().to_string())
                .with_target(record.target()),
        );
    }

    fn flush(&self) {}
}

/// Route records emitted through the `log` facade (by dependencies) into the
/// queue. Returns false if another logger is already installed.
pub fn install_log_bridge() -> bool {
    let level = LogQueue::config()
        .map(|cfg| cfg.level)
        .unwrap_or(LogLevel::Info);
    match log::set_logger(&QUEUE_LOGGER) {
        Ok(()) => {
            log::set_max_level(level.to_filter());
            true
        }
        Err(_) => false,
    }
}

// ---------------------------------------------------------------------------
// Convenience macros (internal use)
// ---------------------------------------------------------------------------

/// Log at trace level.
#[macro_export]
macro_rules! hlog_trace {
    ($($arg:tt)*) => {
        if $crate::logging::enabled($crate::logging::LogLevel::Trace) {
            $crate::logging::log($crate::logging::LogLevel::Trace, format!($($arg)*))
        }
    };
}

/// Log at debug level.
#[macro_export]
macro_rules! hlog_debug {
    ($($arg:tt)*) => {
        if $crate::logging::enabled($crate::logging::LogLevel::Debug) {
            $crate::logging::log($crate::logging::LogLevel::Debug, format!($($arg)*))
        }
    };
}

/// Log at info level.
#[macro_export]
macro_rules! hlog_info {
    ($($arg:tt)*) => {
        if $crate::logging::enabled($crate::logging::LogLevel::Info) {
            $crate::logging::log($crate::logging::LogLevel::Info, format!($($arg)*))
        }
    };
}

/// Log at warn level.
#[macro_export]
macro_rules! hlog_warn {
    ($($arg:tt)*) => {
        if $crate::logging::enabled($crate::logging::LogLevel::Warn) {
            $crate::logging::log($crate::logging::LogLevel::Warn, format!($($arg)*))
        }
    };
}

/// Log at error level.
#[macro_export]
macro_rules! hlog_error {
    ($($arg:tt)*) => {
        if $crate::logging::enabled($crate::logging::LogLevel::Error) {
            $crate::logging::log($crate::logging::LogLevel::Error, format!($($arg)*))
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn level_parsing_falls_back_to_info() {
        assert_eq!(LogLevel::parse("WARNING"), LogLevel::Warn);
        assert_eq!(LogLevel::parse("none"), LogLevel::Off);
        assert_eq!(LogLevel::parse("loud"), LogLevel::Info);
        assert!(LogLevel::Debug < LogLevel::Error);
    }

    #[test]
    fn connection_entry_format() {
        let line = LogEntry::connection(LogLevel::Info, "connect", "abc", "/chat")
            .with_event("message")
            .format_colored();
        assert!(line.contains("/chat"));
        assert!(line.contains("connect"));
        assert!(line.contains("[abc]"));
        assert!(line.contains("message"));
    }

    #[test]
    fn filtered_levels_skip_formatting() {
        struct Counted<'a>(&'a AtomicUsize);

        impl fmt::Display for Counted<'_> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fetch_add(1, Ordering::SeqCst);
                f.write_str("counted")
            }
        }

        let formatted = AtomicUsize::new(0);
        LogQueue::init(LogConfig {
            level: LogLevel::Warn,
            ..LogConfig::default()
        });

        crate::hlog_trace!("{}", Counted(&formatted));
        crate::hlog_debug!("{}", Counted(&formatted));
        assert_eq!(formatted.load(Ordering::SeqCst), 0);
        assert!(!enabled(LogLevel::Info));

        crate::hlog_warn!("{}", Counted(&formatted));
        assert_eq!(formatted.load(Ordering::SeqCst), 1);

        LogQueue::shutdown();
        assert!(!enabled(LogLevel::Error));
    }

    #[test]
    fn skip_events() {
        let cfg = LogConfig::default();
        assert!(cfg.should_skip_event("ping"));
        assert!(!cfg.should_skip_event("message"));
        assert_eq!(LogConfig::disabled().level, LogLevel::Off);
    }
}
