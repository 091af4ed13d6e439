use std::fmt;
use std::sync::atomic::Ordering;

use crate::Core::Channel::Channel;
use crate::Threading::Frontend::Frontend;
use crate::Threading::Manager::Manager;
use crate::Threading::WorkerThread::{ThreadHandle, WorkerThread};

/// Debug function for Channel
///
/// Shows direction and counters only; queued messages are never inspected.
pub fn debug_channel<T>(channel: &Channel<T>, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Channel")
        .field("direction", &channel.direction())
        .field("pending", &channel.len())
        .field("sent", &channel.sent_count())
        .field("received", &channel.received_count())
        .field("closed", &channel.is_closed())
        .field("woken", &channel.woken.load(Ordering::Relaxed))
        .finish()
}

/// Debug function for WorkerThread
///
/// Shows:
/// - Thread name and lifecycle state
/// - Live counters
pub fn debug_worker_thread(thread: &WorkerThread, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("WorkerThread")
        .field("name", &thread.name())
        .field("state", &thread.state())
        .field("stats", &thread.stats())
        .finish_non_exhaustive()
}

pub fn debug_thread_handle(handle: &ThreadHandle, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ThreadHandle")
        .field("name", &handle.name())
        .field("state", &handle.state())
        .finish()
}

/// Debug function for Frontend
///
/// The buffered rows themselves are left out.
pub fn debug_frontend(frontend: &Frontend, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Frontend")
        .field("name", &frontend.name())
        .field("local", &frontend.is_local())
        .field("initialized", &frontend.is_initialized())
        .field("buffering", &frontend.is_buffering())
        .field("buffered_rows", &frontend.buffered_rows())
        .finish_non_exhaustive()
}

pub fn debug_manager(manager: &Manager, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Manager")
        .field("config", manager.config())
        .field("threads", &manager.thread_count())
        .field("live", &manager.live_threads())
        .field("terminating", &manager.is_terminating())
        .finish()
}
