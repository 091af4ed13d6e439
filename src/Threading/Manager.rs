// Registry of all worker threads, driven from the engine's tick loop.

use std::sync::Arc;

use crate::Structs::Message_Structs::OutputMessage;
use crate::Structs::Value_Structs::ThreadStats;

use super::builder::ThreadingConfig;
use super::EventSink::EventSink;
use super::WorkerThread::{JoinOutcome, ThreadState, WorkerThread};

/// A registered thread and the sink its reports go to.
pub(crate) struct Registered {
    pub(crate) thread: WorkerThread,
    pub(crate) sink: Arc<dyn EventSink>,
}

pub struct Manager {
    config: ThreadingConfig,
    pub(crate) threads: Vec<Registered>,
    /// Whether the last `process` handled any output.
    did_process: bool,
    /// Network time of the next heartbeat; `None` until the first beat.
    next_beat: Option<f64>,
    terminating: bool,
}

impl Default for Manager {
    fn default() -> Self {
        Self::new(ThreadingConfig::default())
    }
}

impl Manager {
    pub fn new(config: ThreadingConfig) -> Self {
        tracing::debug!(heartbeat_interval = ?config.heartbeat_interval, "creating thread manager");
        Self {
            config,
            threads: Vec::new(),
            did_process: true,
            next_beat: None,
            terminating: false,
        }
    }

    pub fn config(&self) -> &ThreadingConfig {
        &self.config
    }

    pub fn add_thread(&mut self, thread: WorkerThread, sink: Arc<dyn EventSink>) {
        tracing::debug!(thread = %thread.name(), "adding thread");
        self.threads.push(Registered { thread, sink });
    }

    /// Threads that have not been joined or killed.
    pub fn live_threads(&self) -> usize {
        self.threads
            .iter()
            .filter(|r| !matches!(r.thread.state(), ThreadState::Joined | ThreadState::Killed))
            .count()
    }

    pub fn thread_count(&self) -> usize {
        self.threads.len()
    }

    pub fn is_terminating(&self) -> bool {
        self.terminating
    }

    /// When the engine should call [`process`](Self::process) next.
    ///
    /// # Returns
    /// * `Some(network_time)` if there is work now: output was just handled,
    ///   a heartbeat is due, or some thread has queued output
    /// * `None` if nothing is pending and the engine need not poll
    pub fn next_timestamp(&self, network_time: f64) -> Option<f64> {
        if network_time > 0.0 {
            let beat_due = self.next_beat.map_or(true, |beat| network_time > beat);
            if self.did_process || beat_due {
                return Some(network_time);
            }
        }

        if self.threads.iter().any(|r| r.thread.might_have_out()) {
            return Some(network_time);
        }

        None
    }

    /// One engine tick: beat if due, then drain and dispatch every thread's
    /// output. A thread reporting a failed operation is stopped; the rest are
    /// untouched.
    pub fn process(&mut self, network_time: f64) {
        let mut do_beat = false;
        if network_time > 0.0 && self.next_beat.map_or(true, |beat| network_time > beat) {
            do_beat = true;
            self.next_beat = Some(network_time + self.config.heartbeat_interval.as_secs_f64());
        }

        self.did_process = false;

        for registered in &mut self.threads {
            if do_beat {
                registered.thread.heartbeat(network_time);
            }

            while let Some(message) = registered.thread.retrieve_out() {
                self.did_process = true;
                dispatch(registered, message);
            }
        }
    }

    /// Per-thread counters, in registration order.
    pub fn stats(&self) -> Vec<(String, ThreadStats)> {
        self.threads
            .iter()
            .map(|r| (r.thread.name().to_string(), r.thread.stats()))
            .collect()
    }

    /// Drain all output, stop every thread, join them (killing any that miss
    /// the grace period) and drop them.
    pub fn terminate(&mut self) {
        tracing::debug!(threads = self.threads.len(), "terminating thread manager");
        self.terminating = true;

        loop {
            self.process(0.0);
            if !self.did_process {
                break;
            }
        }

        for registered in &mut self.threads {
            registered.thread.stop();
        }

        let grace = self.config.join_grace;
        for registered in &mut self.threads {
            match registered.thread.join(grace) {
                JoinOutcome::Joined => {}
                JoinOutcome::Panicked(reason) => {
                    let name = registered.thread.name().to_string();
                    registered.sink.error(&name, &format!("thread panicked: {reason}"), true);
                }
                JoinOutcome::Killed => {
                    tracing::warn!(thread = %registered.thread.name(), "killed during shutdown");
                }
            }

            // Whatever the thread produced while draining its queue.
            while let Some(message) = registered.thread.retrieve_out() {
                dispatch(registered, message);
            }
        }

        self.threads.clear();
        self.did_process = false;
        self.next_beat = None;
        self.terminating = false;
        tracing::debug!("thread manager terminated");
    }

    /// Abandon every thread without waiting. Emergency use only.
    pub fn kill_threads(&mut self) {
        tracing::debug!("killing threads");
        for registered in &mut self.threads {
            registered.thread.kill();
        }
    }
}

impl Drop for Manager {
    fn drop(&mut self) {
        if !self.threads.is_empty() {
            self.terminate();
        }
    }
}

fn dispatch(registered: &mut Registered, message: OutputMessage) {
    let name = registered.thread.name().to_string();
    let sink = &registered.sink;

    match message {
        OutputMessage::Info(text) => sink.info(&name, &text),
        OutputMessage::Warning(text) => sink.warning(&name, &text),
        OutputMessage::Error(text) => sink.error(&name, &text, false),
        OutputMessage::Failed { operation, reason } => {
            let text = format!("{operation} failed, terminating thread: {reason}");
            tracing::error!(thread = %name, "{text}");
            registered.thread.stop();
            sink.error(&name, &text, true);
        }
        OutputMessage::RotationFinished(report) => sink.rotation_finished(report),
        OutputMessage::Put(record) => sink.put(&name, record),
        OutputMessage::EndOfData => sink.end_of_data(&name),
    }
}
