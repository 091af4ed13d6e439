// Engine-thread side of a frontend/backend pair.
//
// Every call here returns without waiting on the worker: it either finishes
// locally or turns into one message on the inbound channel. All state in this
// struct belongs to the engine thread.

use std::mem;
use std::sync::Arc;

use crate::error::FrontendError;
use crate::Structs::Message_Structs::{InputMessage, RotationReport};
use crate::Structs::Value_Structs::{BackendInfo, Record, Schema};

use super::EventSink::EventSink;
use super::WorkerThread::ThreadHandle;

pub struct Frontend {
    type_name: String,
    info: BackendInfo,
    schema: Schema,
    thread: Option<ThreadHandle>,
    sink: Arc<dyn EventSink>,
    initialized: bool,
    disabled: bool,
    buffering: bool,
    terminating: bool,
    write_buffer: Vec<Record>,
    buffer_size: usize,
    queue_warn_depth: usize,
    over_warn_depth: bool,
}

impl Frontend {
    pub(crate) fn new(
        type_name: String,
        thread: Option<ThreadHandle>,
        sink: Arc<dyn EventSink>,
        buffer_size: usize,
        queue_warn_depth: usize,
    ) -> Self {
        Self {
            type_name,
            info: BackendInfo::default(),
            schema: Schema::new(),
            thread,
            sink,
            initialized: false,
            disabled: false,
            buffering: true,
            terminating: false,
            write_buffer: Vec::new(),
            buffer_size: buffer_size.max(1),
            queue_warn_depth,
            over_warn_depth: false,
        }
    }

    /// `type_name/path` once initialized, the bare type name before.
    pub fn name(&self) -> String {
        if self.info.path.is_empty() {
            self.type_name.clone()
        } else {
            format!("{}/{}", self.type_name, self.info.path)
        }
    }

    pub fn info(&self) -> &BackendInfo {
        &self.info
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// True when the pair has a backend running on its own thread.
    pub fn is_local(&self) -> bool {
        self.thread.is_some()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Disabled pairs accept calls but never talk to their worker again.
    /// A worker that stopped on its own (fatal error) disables the pair too.
    pub fn is_disabled(&self) -> bool {
        self.disabled || self.worker_gone()
    }

    fn worker_gone(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_accepting())
    }

    /// Latch the disabled flag once the worker stopped accepting work.
    fn refresh_disabled(&mut self) -> bool {
        if !self.disabled && self.worker_gone() {
            tracing::debug!(frontend = %self.name(), "worker no longer accepting, disabling");
            self.disabled = true;
        }
        self.disabled
    }

    pub fn is_buffering(&self) -> bool {
        self.buffering
    }

    /// Rows waiting for the next batch.
    pub fn buffered_rows(&self) -> usize {
        self.write_buffer.len()
    }

    /// Messages queued for the worker and not yet picked up.
    pub fn pending_in(&self) -> usize {
        self.thread.as_ref().map_or(0, ThreadHandle::pending_in)
    }

    /// Hand the backend its configuration and schema. Allowed once.
    pub fn init(&mut self, info: BackendInfo, schema: Schema) -> Result<(), FrontendError> {
        if self.refresh_disabled() {
            tracing::warn!(frontend = %self.name(), "init on disabled frontend ignored");
            return Err(FrontendError::Disabled(self.name()));
        }

        if self.initialized {
            tracing::warn!(frontend = %self.name(), "frontend initialized twice");
            return Err(FrontendError::AlreadyInitialized(self.name()));
        }

        self.info = info;
        self.schema = schema;
        self.initialized = true;

        let message = InputMessage::Init {
            info: self.info.clone(),
            schema: self.schema.clone(),
            frontend_name: self.name(),
        };
        self.send(message);

        // Rows written before init were held back until now; only whole
        // batches go out unless batching is off.
        if !self.buffering || self.terminating {
            self.flush_write_buffer();
        } else {
            self.send_full_batches();
        }
        Ok(())
    }

    /// Queue one row. Dropped right away when the pair is disabled or has no
    /// backend.
    pub fn write(&mut self, record: Record) {
        if self.refresh_disabled() || self.thread.is_none() {
            return;
        }

        if self.write_buffer.capacity() == 0 {
            self.write_buffer.reserve_exact(self.buffer_size);
        }
        self.write_buffer.push(record);

        if self.write_buffer.len() >= self.buffer_size || !self.buffering || self.terminating {
            self.flush_write_buffer();
        }
    }

    /// Turning buffering off sends whatever is held and makes every later
    /// write go out on its own.
    pub fn set_buffering(&mut self, enabled: bool) {
        if self.refresh_disabled() {
            return;
        }

        self.buffering = enabled;
        self.send(InputMessage::SetBuf(enabled));

        if !enabled {
            self.flush_write_buffer();
        }
    }

    /// Send buffered rows, then ask the backend to commit its output.
    pub fn flush(&mut self) {
        if self.refresh_disabled() {
            return;
        }

        self.flush_write_buffer();
        self.send(InputMessage::Flush);
    }

    /// Rotate the backend's output. Always results in exactly one
    /// rotation report: from the backend when there is a live one, or right
    /// here with no writer attached when there is not.
    pub fn rotate(&mut self, rotated_path: impl Into<String>, open: f64, close: f64, terminating: bool) {
        let rotated_path = rotated_path.into();
        if terminating {
            self.terminating = true;
        }

        if !self.refresh_disabled() {
            self.flush_write_buffer();

            let message = InputMessage::Rotate {
                rotated_path: rotated_path.clone(),
                open,
                close,
                terminating,
            };
            if self.send(message) {
                return;
            }
        }

        self.sink.rotation_finished(RotationReport {
            writer: None,
            rotated_path,
            open,
            close,
            terminating,
            success: true,
        });
    }

    /// Send buffered rows and let the backend clean up. The only sanctioned
    /// way to run backend cleanup before the thread stops.
    pub fn finish(&mut self) {
        if self.refresh_disabled() {
            return;
        }

        self.terminating = true;
        self.flush_write_buffer();
        self.send(InputMessage::Finish);
    }

    /// Send buffered rows, disable the pair for good, and stop the worker
    /// once it has worked through its queue.
    pub fn stop(&mut self) {
        if !self.refresh_disabled() {
            self.flush_write_buffer();
        }
        self.disabled = true;

        if let Some(thread) = &self.thread {
            thread.stop();
        }
    }

    fn flush_write_buffer(&mut self) {
        if self.write_buffer.is_empty() || !self.initialized {
            return;
        }

        self.send_full_batches();
        if !self.write_buffer.is_empty() {
            let batch = mem::take(&mut self.write_buffer);
            self.send(InputMessage::Write(batch));
        }
    }

    /// Send every complete batch of `buffer_size` rows, oldest first, keeping
    /// the remainder buffered.
    fn send_full_batches(&mut self) {
        while self.initialized && self.write_buffer.len() >= self.buffer_size {
            let rest = self.write_buffer.split_off(self.buffer_size);
            let batch = mem::replace(&mut self.write_buffer, rest);
            self.send(InputMessage::Write(batch));
        }
    }

    /// Returns false when there was nobody to deliver to.
    fn send(&mut self, message: InputMessage) -> bool {
        let Some(thread) = &self.thread else {
            return false;
        };

        if !thread.send_in(message) {
            self.disabled = true;
            return false;
        }

        let depth = thread.pending_in();
        if depth > self.queue_warn_depth {
            if !self.over_warn_depth {
                self.over_warn_depth = true;
                tracing::warn!(frontend = %self.name(), depth, "backend is falling behind");
            }
        } else {
            self.over_warn_depth = false;
        }
        true
    }
}

impl Drop for Frontend {
    fn drop(&mut self) {
        if !self.write_buffer.is_empty() && !self.disabled {
            self.flush_write_buffer();
        }
    }
}
