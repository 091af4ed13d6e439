use crate::Structs::Message_Structs::RotationReport;
use crate::Structs::Value_Structs::Record;

/// The owning subsystem's view of a pair's output.
///
/// Called on the engine thread only, from [`Manager::process`](super::Manager::process)
/// and, for pairs without a live backend, directly from the frontend.
pub trait EventSink: Send + Sync {
    /// An error reported by a thread. `fatal` is set when the thread stopped.
    fn error(&self, thread: &str, message: &str, fatal: bool);

    fn rotation_finished(&self, report: RotationReport);

    fn info(&self, thread: &str, message: &str) {
        tracing::info!(thread, "{message}");
    }

    fn warning(&self, thread: &str, message: &str) {
        tracing::warn!(thread, "{message}");
    }

    /// A record produced by an input backend.
    fn put(&self, thread: &str, record: Record) {
        let _ = (thread, record);
    }

    fn end_of_data(&self, thread: &str) {
        let _ = thread;
    }
}

/// Sink that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl EventSink for LogSink {
    fn error(&self, thread: &str, message: &str, fatal: bool) {
        tracing::error!(thread, fatal, "{message}");
    }

    fn rotation_finished(&self, report: RotationReport) {
        tracing::debug!(
            writer = ?report.writer,
            path = %report.rotated_path,
            success = report.success,
            "rotation finished"
        );
    }
}
