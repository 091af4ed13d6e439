// Owns one OS thread and one backend.

use crossbeam_utils::CachePadded;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crate::Core::Channel::{Channel, Direction};
use crate::error::BackendError;
use crate::Structs::Message_Structs::{InputMessage, OutputMessage, RotationReport};
use crate::Structs::Value_Structs::ThreadStats;

use super::Backend::{Backend, BackendContext};

/// Lifecycle of a worker thread.
///
/// `Created -> Running -> Stopping -> Joined` is the normal path.
/// `Killed` is only reachable from a `Stopping` thread that did not exit
/// within the join grace period.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ThreadState {
    Created = 0,
    Running = 1,
    Stopping = 2,
    Joined = 3,
    Killed = 4,
}

impl ThreadState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => ThreadState::Created,
            1 => ThreadState::Running,
            2 => ThreadState::Stopping,
            3 => ThreadState::Joined,
            _ => ThreadState::Killed,
        }
    }
}

/// How a join ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JoinOutcome {
    Joined,
    /// The backend panicked; the thread is gone.
    Panicked(String),
    /// The thread missed the grace period and was abandoned.
    Killed,
}

/// State touched by both the engine thread and the worker thread.
///
/// The two channels and these atomics are the only shared state of a pair.
pub(crate) struct ThreadShared {
    pub(crate) name: String,
    pub(crate) inbound: Channel<InputMessage>,
    pub(crate) outbound: Channel<OutputMessage>,
    pub(crate) state: AtomicU8,
    pub(crate) processed: CachePadded<AtomicU64>,
    pub(crate) errors: CachePadded<AtomicU64>,
    pub(crate) heartbeat_interval: Duration,
}

impl ThreadShared {
    pub(crate) fn state(&self) -> ThreadState {
        ThreadState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn transition(&self, from: ThreadState, to: ThreadState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn set_state(&self, to: ThreadState) {
        self.state.store(to as u8, Ordering::Release);
    }

    /// Running -> Stopping, then wake the worker so it notices.
    fn request_stop(&self) {
        if self.transition(ThreadState::Running, ThreadState::Stopping) {
            tracing::debug!(thread = %self.name, "stopping");
        }
        self.inbound.wake();
    }

    /// Close the inbound channel and drop whatever is still queued. Every
    /// dropped rotation is answered with a failed, writer-less report so its
    /// owner still gets exactly one. Returns the number of dropped messages.
    fn discard_inbound(&self) -> usize {
        self.inbound.close();
        let dropped = self.inbound.drain();
        let count = dropped.len();

        for message in dropped {
            if let InputMessage::Rotate {
                rotated_path,
                open,
                close,
                terminating,
            } = message
            {
                let report = RotationReport {
                    writer: None,
                    rotated_path,
                    open,
                    close,
                    terminating,
                    success: false,
                };
                if self.outbound.send(OutputMessage::RotationFinished(report)).is_err() {
                    tracing::debug!(thread = %self.name, "outbound closed, rotation report lost");
                }
            }
        }
        count
    }
}

/// Engine-side handle used by a frontend to feed its worker.
#[derive(Clone)]
pub struct ThreadHandle {
    pub(crate) shared: Arc<ThreadShared>,
}

impl ThreadHandle {
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn state(&self) -> ThreadState {
        self.shared.state()
    }

    /// True while the worker will still execute newly queued work.
    pub fn is_accepting(&self) -> bool {
        matches!(self.state(), ThreadState::Created | ThreadState::Running)
    }

    /// Queue a message for the worker. Returns false, dropping the message,
    /// once the worker no longer accepts work.
    pub fn send_in(&self, message: InputMessage) -> bool {
        if !self.is_accepting() {
            return false;
        }
        self.shared.inbound.send(message).is_ok()
    }

    pub fn pending_in(&self) -> usize {
        self.shared.inbound.len()
    }

    /// Cooperative stop of a running worker; queued work is still executed.
    pub fn stop(&self) {
        self.shared.request_stop();
    }
}

/// A worker thread paired with its backend.
pub struct WorkerThread {
    pub(crate) shared: Arc<ThreadShared>,
    backend: Option<Box<dyn Backend>>,
    handle: Option<JoinHandle<()>>,
}

impl WorkerThread {
    pub fn new(name: impl Into<String>, backend: Box<dyn Backend>, heartbeat_interval: Duration) -> Self {
        let shared = Arc::new(ThreadShared {
            name: name.into(),
            inbound: Channel::new(Direction::Inbound),
            outbound: Channel::new(Direction::Outbound),
            state: AtomicU8::new(ThreadState::Created as u8),
            processed: CachePadded::new(AtomicU64::new(0)),
            errors: CachePadded::new(AtomicU64::new(0)),
            heartbeat_interval,
        });

        Self {
            shared,
            backend: Some(backend),
            handle: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn state(&self) -> ThreadState {
        self.shared.state()
    }

    pub fn handle(&self) -> ThreadHandle {
        ThreadHandle {
            shared: self.shared.clone(),
        }
    }

    /// Spawn the OS thread. Only valid from `Created`.
    pub fn start(&mut self) -> io::Result<()> {
        let not_startable = || {
            io::Error::new(
                io::ErrorKind::Other,
                format!("thread {} cannot start from state {:?}", self.shared.name, self.shared.state()),
            )
        };

        let backend = self.backend.take().ok_or_else(not_startable)?;
        if !self.shared.transition(ThreadState::Created, ThreadState::Running) {
            self.backend = Some(backend);
            return Err(not_startable());
        }

        let shared = self.shared.clone();
        let spawned = thread::Builder::new()
            .name(self.shared.name.clone())
            .spawn(move || run(shared, backend));

        match spawned {
            Ok(handle) => {
                tracing::debug!(thread = %self.shared.name, "started");
                self.handle = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.shared.set_state(ThreadState::Joined);
                Err(e)
            }
        }
    }

    /// Ask the thread to finish what is queued and exit. Never discards work.
    pub fn stop(&mut self) {
        match self.state() {
            ThreadState::Created => {
                // Never started; nothing will ever run the queue.
                self.shared.set_state(ThreadState::Joined);
                self.shared.discard_inbound();
                self.backend = None;
            }
            ThreadState::Running => self.shared.request_stop(),
            ThreadState::Stopping | ThreadState::Joined | ThreadState::Killed => {}
        }
    }

    /// Wait up to `grace` for the thread to exit, killing it if it does not.
    pub fn join(&mut self, grace: Duration) -> JoinOutcome {
        self.stop();

        let Some(handle) = self.handle.take() else {
            if self.state() != ThreadState::Killed {
                self.shared.set_state(ThreadState::Joined);
            }
            return JoinOutcome::Joined;
        };

        let start = Instant::now();
        while !handle.is_finished() {
            let elapsed = start.elapsed();
            if elapsed >= grace {
                self.handle = Some(handle);
                tracing::warn!(thread = %self.shared.name, ?grace, "did not exit within grace period, killing");
                self.kill();
                return JoinOutcome::Killed;
            }
            thread::sleep(std::cmp::min(grace - elapsed, Duration::from_millis(10)));
        }

        self.shared.set_state(ThreadState::Joined);
        match handle.join() {
            Ok(()) => {
                tracing::debug!(thread = %self.shared.name, "joined");
                JoinOutcome::Joined
            }
            Err(payload) => JoinOutcome::Panicked(panic_message(payload.as_ref())),
        }
    }

    /// Abandon the thread. The OS thread is detached rather than terminated;
    /// it exits at its next check and anything still queued is dropped.
    pub fn kill(&mut self) {
        self.stop();
        if self.shared.transition(ThreadState::Stopping, ThreadState::Killed) {
            tracing::warn!(thread = %self.shared.name, "killed");
        }
        let dropped = self.shared.discard_inbound();
        if dropped > 0 {
            tracing::warn!(thread = %self.shared.name, dropped, "discarded queued work");
        }
        self.handle = None;
    }

    /// Queue a heartbeat for a running thread.
    pub fn heartbeat(&self, network_time: f64) {
        if self.state() == ThreadState::Running {
            let _ = self.shared.inbound.send(InputMessage::Heartbeat {
                network_time,
                current_time: wall_clock(),
            });
        }
    }

    /// Best-effort probe for queued output.
    pub fn might_have_out(&self) -> bool {
        self.shared.outbound.has_pending()
    }

    pub fn retrieve_out(&self) -> Option<OutputMessage> {
        self.shared.outbound.try_receive()
    }

    pub fn stats(&self) -> ThreadStats {
        let shared = &self.shared;
        ThreadStats {
            queued_in: shared.inbound.sent_count(),
            queued_out: shared.outbound.sent_count(),
            pending_in: shared.inbound.len() as u64,
            pending_out: shared.outbound.len() as u64,
            processed: shared.processed.load(Ordering::Relaxed),
            errors: shared.errors.load(Ordering::Relaxed),
        }
    }
}

impl Drop for WorkerThread {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.join(Duration::from_secs(1));
        }
    }
}

/// The worker loop.
fn run(shared: Arc<ThreadShared>, mut backend: Box<dyn Backend>) {
    let interval = shared.heartbeat_interval;
    let mut ctx = BackendContext::new(shared.clone());
    let mut last_beat = Instant::now();
    let mut failed = false;

    loop {
        let message = match shared.state() {
            ThreadState::Killed | ThreadState::Joined => break,
            ThreadState::Stopping => match shared.inbound.try_receive() {
                Some(message) => message,
                None => break,
            },
            ThreadState::Created | ThreadState::Running => match shared.inbound.receive_timeout(interval) {
                Some(message) => message,
                None => {
                    if shared.state() == ThreadState::Running && last_beat.elapsed() >= interval {
                        backend.heartbeat(&mut ctx, 0.0, wall_clock());
                        last_beat = Instant::now();
                    }
                    continue;
                }
            },
        };

        let name = message.name();
        if matches!(message, InputMessage::Heartbeat { .. }) {
            last_beat = Instant::now();
        }

        let result = panic::catch_unwind(AssertUnwindSafe(|| message.process(backend.as_mut(), &mut ctx)))
            .unwrap_or_else(|payload| Err(BackendError::Failed(format!("panicked: {}", panic_message(payload.as_ref())))));
        shared.processed.fetch_add(1, Ordering::Relaxed);

        if let Err(e) = result {
            tracing::error!(thread = %shared.name, operation = name, "{name} failed, terminating thread: {e}");
            ctx.send(OutputMessage::Failed {
                operation: name,
                reason: e.to_string(),
            });
            shared.transition(ThreadState::Running, ThreadState::Stopping);
            failed = true;
            break;
        }
    }

    let dropped = shared.discard_inbound();
    if failed && dropped > 0 {
        tracing::debug!(thread = %shared.name, dropped, "discarded work queued after failure");
    }
    tracing::debug!(thread = %shared.name, "exiting");
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

pub(crate) fn wall_clock() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
