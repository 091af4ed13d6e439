use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::error::BackendResult;
use crate::Structs::Message_Structs::OutputMessage;
use crate::Structs::Value_Structs::{BackendInfo, Record, Schema};

use super::WorkerThread::ThreadShared;

/// The worker-side half of a pair.
///
/// Methods are called only from the worker thread, one at a time, in the order
/// the frontend queued them. Returning `Err` from any of them is fatal for this
/// pair: the worker reports the failure and stops. Recoverable problems should
/// go through [`BackendContext::error`] while still returning `Ok`.
///
/// Backends may block freely; they own their thread.
pub trait Backend: Send + 'static {
    /// Called once, before anything else. Validate `info.config` here.
    fn init(&mut self, ctx: &mut BackendContext, info: &BackendInfo, schema: &Schema) -> BackendResult;

    /// A batch of rows, in submission order.
    fn write(&mut self, ctx: &mut BackendContext, records: Vec<Record>) -> BackendResult;

    fn set_buffering(&mut self, ctx: &mut BackendContext, enabled: bool) -> BackendResult;

    /// Force buffered output down to the underlying sink.
    fn flush(&mut self, ctx: &mut BackendContext) -> BackendResult;

    /// Close the current output, move it to `rotated_path` and reopen. The
    /// completion report is sent by the worker once this returns.
    fn rotate(
        &mut self,
        ctx: &mut BackendContext,
        rotated_path: &str,
        open: f64,
        close: f64,
        terminating: bool,
    ) -> BackendResult;

    /// Final cleanup before the thread stops.
    fn finish(&mut self, ctx: &mut BackendContext) -> BackendResult;

    /// Periodic housekeeping. `network_time` is the engine's clock (0 when the
    /// beat came from an idle timeout), `current_time` is wall-clock seconds.
    fn heartbeat(&mut self, ctx: &mut BackendContext, network_time: f64, current_time: f64);
}

/// The backend's view of its thread: identity plus the outbound channel.
pub struct BackendContext {
    pub(crate) shared: Arc<ThreadShared>,
    frontend_name: Option<String>,
    schema: Option<Schema>,
}

impl BackendContext {
    pub(crate) fn new(shared: Arc<ThreadShared>) -> Self {
        Self {
            shared,
            frontend_name: None,
            schema: None,
        }
    }

    /// Name of the thread.
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Name of the frontend as of init, e.g. `Ascii/conn`. Falls back to the
    /// thread name before init.
    pub fn frontend_name(&self) -> &str {
        self.frontend_name.as_deref().unwrap_or(&self.shared.name)
    }

    pub(crate) fn set_frontend_name(&mut self, name: String) {
        self.frontend_name = Some(name);
    }

    /// Schema accepted at init, if init succeeded.
    pub fn schema(&self) -> Option<&Schema> {
        self.schema.as_ref()
    }

    pub(crate) fn set_schema(&mut self, schema: Schema) {
        self.schema = Some(schema);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.send(OutputMessage::Info(message.into()));
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.send(OutputMessage::Warning(message.into()));
    }

    /// Report a non-fatal error; the thread keeps running.
    pub fn error(&self, message: impl Into<String>) {
        self.send(OutputMessage::Error(message.into()));
    }

    /// Hand a record read by an input backend to the engine.
    pub fn put(&self, record: Record) {
        self.send(OutputMessage::Put(record));
    }

    pub fn end_of_data(&self) {
        self.send(OutputMessage::EndOfData);
    }

    pub(crate) fn send(&self, message: OutputMessage) {
        if message.is_error() {
            self.shared.errors.fetch_add(1, Ordering::Relaxed);
        }

        if let Err(err) = self.shared.outbound.send(message) {
            tracing::debug!(thread = %self.shared.name, "dropping output after close: {err}");
        }
    }
}
