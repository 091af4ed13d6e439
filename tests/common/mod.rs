#![allow(dead_code)]

use msgthread::error::{BackendError, BackendResult};
use msgthread::Structs::{BackendInfo, Record, RotationReport, Schema};
use msgthread::Threading::Backend::{Backend, BackendContext};
use msgthread::Threading::EventSink::EventSink;
use msgthread::Threading::Manager::Manager;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// What a recording backend saw, in order.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    Init(String),
    Write(Vec<Record>),
    SetBuf(bool),
    Flush,
    Rotate(String),
    Finish,
    Heartbeat(f64),
}

pub type EventLog = Arc<Mutex<Vec<Event>>>;

/// Backend that records every call and can be told to fail or stall.
pub struct RecordingBackend {
    pub log: EventLog,
    /// Operation name on which to return an error.
    pub fail_on: Option<&'static str>,
    /// Info messages to emit per written record.
    pub chatty: bool,
    /// Sleep inside `write`.
    pub stall: Option<Duration>,
    pub writes_started: Arc<AtomicUsize>,
}

impl RecordingBackend {
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            fail_on: None,
            chatty: false,
            stall: None,
            writes_started: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing_on(mut self, operation: &'static str) -> Self {
        self.fail_on = Some(operation);
        self
    }

    pub fn chatty(mut self) -> Self {
        self.chatty = true;
        self
    }

    pub fn stalling(mut self, stall: Duration) -> Self {
        self.stall = Some(stall);
        self
    }

    fn check(&self, operation: &'static str) -> BackendResult {
        if self.fail_on == Some(operation) {
            return Err(BackendError::Failed(format!("{operation} refused")));
        }
        Ok(())
    }
}

impl Backend for RecordingBackend {
    fn init(&mut self, _ctx: &mut BackendContext, info: &BackendInfo, _schema: &Schema) -> BackendResult {
        self.log.lock().push(Event::Init(info.path.clone()));
        self.check("Init")
    }

    fn write(&mut self, ctx: &mut BackendContext, records: Vec<Record>) -> BackendResult {
        self.writes_started.fetch_add(1, Ordering::SeqCst);
        if let Some(stall) = self.stall {
            std::thread::sleep(stall);
        }
        if self.chatty {
            for _ in &records {
                ctx.info("row written");
            }
        }
        self.log.lock().push(Event::Write(records));
        self.check("Write")
    }

    fn set_buffering(&mut self, _ctx: &mut BackendContext, enabled: bool) -> BackendResult {
        self.log.lock().push(Event::SetBuf(enabled));
        self.check("SetBuf")
    }

    fn flush(&mut self, _ctx: &mut BackendContext) -> BackendResult {
        self.log.lock().push(Event::Flush);
        self.check("Flush")
    }

    fn rotate(
        &mut self,
        _ctx: &mut BackendContext,
        rotated_path: &str,
        _open: f64,
        _close: f64,
        _terminating: bool,
    ) -> BackendResult {
        self.log.lock().push(Event::Rotate(rotated_path.to_string()));
        self.check("Rotate")
    }

    fn finish(&mut self, _ctx: &mut BackendContext) -> BackendResult {
        self.log.lock().push(Event::Finish);
        self.check("Finish")
    }

    fn heartbeat(&mut self, _ctx: &mut BackendContext, network_time: f64, _current_time: f64) {
        self.log.lock().push(Event::Heartbeat(network_time));
    }
}

/// Sink that keeps everything it is handed.
#[derive(Default)]
pub struct RecordingSink {
    pub errors: Mutex<Vec<(String, String, bool)>>,
    pub warnings: Mutex<Vec<String>>,
    pub infos: Mutex<Vec<String>>,
    pub rotations: Mutex<Vec<RotationReport>>,
    pub puts: Mutex<Vec<Record>>,
    pub end_of_data: AtomicUsize,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fatal_errors(&self) -> usize {
        self.errors.lock().iter().filter(|(_, _, fatal)| *fatal).count()
    }
}

impl EventSink for RecordingSink {
    fn error(&self, thread: &str, message: &str, fatal: bool) {
        self.errors.lock().push((thread.to_string(), message.to_string(), fatal));
    }

    fn rotation_finished(&self, report: RotationReport) {
        self.rotations.lock().push(report);
    }

    fn info(&self, _thread: &str, message: &str) {
        self.infos.lock().push(message.to_string());
    }

    fn warning(&self, _thread: &str, message: &str) {
        self.warnings.lock().push(message.to_string());
    }

    fn put(&self, _thread: &str, record: Record) {
        self.puts.lock().push(record);
    }

    fn end_of_data(&self, _thread: &str) {
        self.end_of_data.fetch_add(1, Ordering::SeqCst);
    }
}

/// Tick the manager until `done` holds or `timeout` passes.
pub fn pump_until(manager: &mut Manager, timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    let mut network_time = 1.0;
    loop {
        manager.process(network_time);
        if done() {
            return true;
        }
        if start.elapsed() >= timeout {
            return false;
        }
        network_time += 0.001;
        std::thread::sleep(Duration::from_millis(5));
    }
}

/// Wait without ticking the manager.
pub fn wait_until(timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while !done() {
        if start.elapsed() >= timeout {
            return false;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    true
}

pub fn writes(log: &EventLog) -> Vec<Vec<Record>> {
    log.lock()
        .iter()
        .filter_map(|e| match e {
            Event::Write(batch) => Some(batch.clone()),
            _ => None,
        })
        .collect()
}

/// Tick the manager for the whole of `duration`.
pub fn pump_for(manager: &mut Manager, duration: Duration) {
    pump_until(manager, duration, || false);
}
