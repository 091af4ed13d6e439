use std::env;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use super::Backend::Backend;
use super::EventSink::{EventSink, LogSink};
use super::Frontend::Frontend;
use super::Manager::Manager;
use super::WorkerThread::WorkerThread;

/// Rows batched into one write message by default.
pub const WRITER_BUFFER_SIZE: usize = 1000;

/// Process-wide threading settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ThreadingConfig {
    /// Manager beat period, and how long an idle worker waits before beating.
    pub heartbeat_interval: Duration,
    /// How long shutdown waits for a stopping thread before abandoning it.
    pub join_grace: Duration,
    pub write_buffer_size: usize,
    /// Inbound depth above which a frontend warns that its backend is behind.
    pub queue_warn_depth: usize,
}

impl Default for ThreadingConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(1),
            join_grace: Duration::from_secs(5),
            write_buffer_size: WRITER_BUFFER_SIZE,
            queue_warn_depth: 100_000,
        }
    }
}

impl ThreadingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults, overridden by `MSGTHREAD_HEARTBEAT_MS`, `MSGTHREAD_JOIN_GRACE_MS`,
    /// `MSGTHREAD_WRITE_BUFFER` and `MSGTHREAD_QUEUE_WARN` when set and valid.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(ms) = env_number("MSGTHREAD_HEARTBEAT_MS") {
            config.heartbeat_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = env_number("MSGTHREAD_JOIN_GRACE_MS") {
            config.join_grace = Duration::from_millis(ms);
        }
        if let Some(rows) = env_number("MSGTHREAD_WRITE_BUFFER") {
            config.write_buffer_size = rows as usize;
        }
        if let Some(depth) = env_number("MSGTHREAD_QUEUE_WARN") {
            config.queue_warn_depth = depth as usize;
        }
        config
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub fn with_join_grace(mut self, grace: Duration) -> Self {
        self.join_grace = grace;
        self
    }

    pub fn with_write_buffer_size(mut self, rows: usize) -> Self {
        self.write_buffer_size = rows;
        self
    }

    pub fn with_queue_warn_depth(mut self, depth: usize) -> Self {
        self.queue_warn_depth = depth;
        self
    }
}

fn env_number(key: &str) -> Option<u64> {
    let raw = env::var(key).ok()?;
    match raw.trim().parse::<u64>() {
        Ok(n) if n > 0 => Some(n),
        _ => {
            tracing::warn!(key, value = %raw, "ignoring invalid threading setting");
            None
        }
    }
}

/// Creates a frontend and, for local pairs, its worker thread.
pub struct FrontendBuilder {
    type_name: String,
    buffer_size: Option<usize>,
    sink: Arc<dyn EventSink>,
}

impl FrontendBuilder {
    /// `type_name` names the backend kind, e.g. `Ascii`; the frontend's full
    /// name becomes `type_name/path` once initialized.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            buffer_size: None,
            sink: Arc::new(LogSink),
        }
    }

    /// Rows per write batch; defaults to the manager's `write_buffer_size`.
    pub fn with_buffer_size(mut self, rows: usize) -> Self {
        self.buffer_size = Some(rows.max(1));
        self
    }

    /// Where this pair's reports go.
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Spawn a worker thread for `backend`, register it with `manager`, and
    /// return the frontend that feeds it.
    pub fn build(self, manager: &mut Manager, backend: Box<dyn Backend>) -> io::Result<Frontend> {
        let config = manager.config().clone();
        let mut thread = WorkerThread::new(self.type_name.clone(), backend, config.heartbeat_interval);
        thread.start()?;

        let handle = thread.handle();
        manager.add_thread(thread, self.sink.clone());

        Ok(Frontend::new(
            self.type_name,
            Some(handle),
            self.sink,
            self.buffer_size.unwrap_or(config.write_buffer_size),
            config.queue_warn_depth,
        ))
    }

    /// A frontend with no backend: writes are dropped and rotations are
    /// answered immediately with a null-writer report.
    pub fn build_detached(self) -> Frontend {
        Frontend::new(
            self.type_name,
            None,
            self.sink,
            self.buffer_size.unwrap_or(WRITER_BUFFER_SIZE),
            usize::MAX,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn env_overrides_defaults() {
        env::set_var("MSGTHREAD_HEARTBEAT_MS", "250");
        env::set_var("MSGTHREAD_WRITE_BUFFER", "not-a-number");
        let config = ThreadingConfig::from_env();
        env::remove_var("MSGTHREAD_HEARTBEAT_MS");
        env::remove_var("MSGTHREAD_WRITE_BUFFER");

        assert_eq!(config.heartbeat_interval, Duration::from_millis(250));
        assert_eq!(config.write_buffer_size, WRITER_BUFFER_SIZE);
        assert_eq!(config.join_grace, Duration::from_secs(5));
    }
}
