mod common;

use common::{pump_until, wait_until, writes, Event, RecordingBackend, RecordingSink};
use msgthread::Structs::{BackendInfo, Field, TypeTag, Value};
use msgthread::Threading::Manager::Manager;
use msgthread::Threading::{FrontendBuilder, ThreadingConfig};
use parking_lot::Mutex;
use serial_test::serial;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn schema() -> Vec<Field> {
    vec![Field::new("n", TypeTag::Count)]
}

#[test]
fn idle_manager_reports_no_work() {
    let mut manager = Manager::new(ThreadingConfig::default().with_heartbeat_interval(Duration::from_secs(1)));

    // Nothing processed yet: poll right away.
    assert_eq!(manager.next_timestamp(10.0), Some(10.0));

    manager.process(10.0);
    assert_eq!(manager.next_timestamp(10.5), None);
    // The next beat is due after one interval.
    assert_eq!(manager.next_timestamp(11.5), Some(11.5));
    // Without network time there is never a beat to schedule.
    assert_eq!(manager.next_timestamp(0.0), None);
}

#[test]
fn pending_output_requests_a_tick() {
    let mut manager = Manager::default();
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = RecordingSink::new();
    let mut frontend = FrontendBuilder::new("Recording")
        .with_buffer_size(1)
        .with_sink(sink.clone())
        .build(&mut manager, Box::new(RecordingBackend::new(log.clone()).chatty()))
        .unwrap();

    manager.process(5.0);
    assert_eq!(manager.next_timestamp(5.1), None);

    frontend.init(BackendInfo::new("conn"), schema()).unwrap();
    frontend.write(vec![Value::count(1)]);
    assert!(wait_until(Duration::from_secs(5), || {
        manager.stats()[0].1.pending_out > 0
    }));
    assert_eq!(manager.next_timestamp(5.1), Some(5.1));

    manager.process(5.1);
    assert_eq!(sink.infos.lock().len(), 1);
    manager.terminate();
}

#[test]
fn terminate_drains_queued_output_before_join() {
    const PAIRS: usize = 3;
    const ROWS: u64 = 25;

    let mut manager = Manager::default();
    let mut sinks = Vec::new();
    let mut frontends = Vec::new();

    for i in 0..PAIRS {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = RecordingSink::new();
        let mut backend = RecordingBackend::new(log);
        if i == 0 {
            backend = backend.chatty();
        }
        let mut frontend = FrontendBuilder::new(format!("Recording{i}"))
            .with_buffer_size(5)
            .with_sink(sink.clone())
            .build(&mut manager, Box::new(backend))
            .unwrap();
        frontend.init(BackendInfo::new(format!("log{i}")), schema()).unwrap();
        sinks.push(sink);
        frontends.push(frontend);
    }

    for n in 0..ROWS {
        frontends[0].write(vec![Value::count(n)]);
    }

    // Let the chatty pair queue all its output without ticking the manager.
    assert!(wait_until(Duration::from_secs(5), || {
        manager.stats()[0].1.pending_out == ROWS
    }));
    assert!(sinks[0].infos.lock().is_empty());
    assert_eq!(manager.live_threads(), PAIRS);

    manager.terminate();

    assert_eq!(sinks[0].infos.lock().len(), ROWS as usize);
    assert_eq!(manager.live_threads(), 0);
    assert_eq!(manager.thread_count(), 0);
    for frontend in &mut frontends {
        assert!(frontend.is_disabled());
    }
}

#[test]
fn failing_pair_does_not_affect_others() {
    let mut manager = Manager::default();

    let bad_log = Arc::new(Mutex::new(Vec::new()));
    let bad_sink = RecordingSink::new();
    let mut bad = FrontendBuilder::new("Bad")
        .with_buffer_size(1)
        .with_sink(bad_sink.clone())
        .build(&mut manager, Box::new(RecordingBackend::new(bad_log.clone()).failing_on("Write")))
        .unwrap();

    let good_log = Arc::new(Mutex::new(Vec::new()));
    let good_sink = RecordingSink::new();
    let mut good = FrontendBuilder::new("Good")
        .with_buffer_size(1)
        .with_sink(good_sink.clone())
        .build(&mut manager, Box::new(RecordingBackend::new(good_log.clone())))
        .unwrap();

    bad.init(BackendInfo::new("bad"), schema()).unwrap();
    good.init(BackendInfo::new("good"), schema()).unwrap();

    for n in 0..10 {
        bad.write(vec![Value::count(n)]);
        good.write(vec![Value::count(n)]);
    }

    assert!(pump_until(&mut manager, Duration::from_secs(5), || {
        bad_sink.fatal_errors() == 1 && writes(&good_log).len() == 10
    }));

    let stats = manager.stats();
    assert_eq!(stats[0].0, "Bad");
    assert_eq!(stats[0].1.errors, 1);
    assert_eq!(stats[1].1.errors, 0);

    // The failing thread stopped at its first write and discarded the rest.
    assert_eq!(writes(&bad_log).len(), 1);
    assert!(bad.is_disabled());
    assert!(!good.is_disabled());

    good.write(vec![Value::count(99)]);
    assert!(pump_until(&mut manager, Duration::from_secs(5), || writes(&good_log).len() == 11));

    manager.terminate();
    assert_eq!(bad_sink.fatal_errors(), 1);
    assert!(good_sink.errors.lock().is_empty());
}

#[test]
#[serial]
fn idle_worker_beats_on_its_own() {
    let mut manager = Manager::new(ThreadingConfig::default().with_heartbeat_interval(Duration::from_millis(20)));
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut frontend = FrontendBuilder::new("Recording")
        .build(&mut manager, Box::new(RecordingBackend::new(log.clone())))
        .unwrap();
    frontend.init(BackendInfo::new("conn"), schema()).unwrap();

    assert!(wait_until(Duration::from_secs(5), || {
        log.lock().iter().filter(|e| matches!(e, Event::Heartbeat(t) if *t == 0.0)).count() >= 2
    }));
    manager.terminate();
}

#[test]
fn manager_beat_carries_network_time() {
    let mut manager = Manager::default();
    let log = Arc::new(Mutex::new(Vec::new()));
    let _frontend = FrontendBuilder::new("Recording")
        .build(&mut manager, Box::new(RecordingBackend::new(log.clone())))
        .unwrap();

    manager.process(42.0);
    // Not due again within the interval.
    manager.process(42.5);

    assert!(wait_until(Duration::from_secs(5), || log.lock().contains(&Event::Heartbeat(42.0))));
    manager.terminate();
    assert_eq!(
        log.lock().iter().filter(|e| matches!(e, Event::Heartbeat(t) if *t > 0.0)).count(),
        1
    );
}

#[test]
#[serial]
fn stuck_thread_is_killed_after_grace() {
    let config = ThreadingConfig::default().with_join_grace(Duration::from_millis(50));
    let mut manager = Manager::new(config);
    let log = Arc::new(Mutex::new(Vec::new()));
    let backend = RecordingBackend::new(log.clone()).stalling(Duration::from_secs(2));
    let started = backend.writes_started.clone();
    let sink = RecordingSink::new();

    let mut frontend = FrontendBuilder::new("Stuck")
        .with_buffer_size(1)
        .with_sink(sink.clone())
        .build(&mut manager, Box::new(backend))
        .unwrap();
    frontend.init(BackendInfo::new("conn"), schema()).unwrap();
    frontend.write(vec![Value::count(1)]);
    frontend.write(vec![Value::count(2)]);
    frontend.rotate("conn.old.log", 1.0, 2.0, false);

    assert!(wait_until(Duration::from_secs(5), || started.load(Ordering::SeqCst) == 1));

    let begin = Instant::now();
    manager.terminate();
    assert!(begin.elapsed() < Duration::from_millis(1500));
    assert_eq!(manager.thread_count(), 0);
    assert_eq!(frontend.pending_in(), 0);

    // The rotation never ran, but its owner still hears back once.
    let rotations = sink.rotations.lock();
    assert_eq!(rotations.len(), 1);
    assert_eq!(rotations[0].writer, None);
    assert!(!rotations[0].success);
}

#[test]
fn idle_thread_joins_without_waiting_for_heartbeat() {
    let config = ThreadingConfig::default()
        .with_heartbeat_interval(Duration::from_secs(30))
        .with_join_grace(Duration::from_secs(5));
    let mut manager = Manager::new(config);
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut frontend = FrontendBuilder::new("Idle")
        .build(&mut manager, Box::new(RecordingBackend::new(log.clone())))
        .unwrap();
    frontend.init(BackendInfo::new("conn"), schema()).unwrap();
    assert!(wait_until(Duration::from_secs(5), || manager.stats()[0].1.processed >= 1));

    let begin = Instant::now();
    manager.terminate();
    assert!(begin.elapsed() < Duration::from_secs(2));
    assert_eq!(log.lock().clone(), vec![Event::Init("conn".to_string())]);
}

#[test]
fn stats_track_queues_and_processing() {
    let mut manager = Manager::default();
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut frontend = FrontendBuilder::new("Recording")
        .with_buffer_size(2)
        .build(&mut manager, Box::new(RecordingBackend::new(log.clone())))
        .unwrap();
    frontend.init(BackendInfo::new("conn"), schema()).unwrap();
    for n in 0..4 {
        frontend.write(vec![Value::count(n)]);
    }
    frontend.flush();

    // Init, two writes, flush.
    assert!(wait_until(Duration::from_secs(5), || manager.stats()[0].1.processed >= 4));
    let (name, stats) = manager.stats().remove(0);
    assert_eq!(name, "Recording");
    assert_eq!(stats.queued_in, 4);
    assert_eq!(stats.pending_in, 0);
    assert_eq!(stats.queued_out, 0);
    assert_eq!(stats.errors, 0);

    frontend.stop();
    manager.terminate();
}

#[test]
fn dropping_manager_shuts_threads_down() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let handle = {
        let mut manager = Manager::default();
        let mut frontend = FrontendBuilder::new("Recording")
            .build(&mut manager, Box::new(RecordingBackend::new(log.clone())))
            .unwrap();
        frontend.init(BackendInfo::new("conn"), schema()).unwrap();
        frontend.write(vec![Value::count(1)]);
        frontend.flush();
        frontend
    };

    assert_eq!(writes(&log), vec![vec![vec![Value::count(1)]]]);
    let mut handle = handle;
    assert!(handle.is_disabled());
}
