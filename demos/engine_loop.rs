// Drives a manager from a single-threaded tick loop, writing synthetic rows
// to an ASCII log until Ctrl+C.
//
//   cargo run --example engine_loop -- <out_dir> [rows_per_tick]

use msgthread::Backends::AsciiWriter;
use msgthread::Structs::{BackendInfo, Field, TransportProto, TypeTag, Value};
use msgthread::Threading::Manager::Manager;
use msgthread::Threading::{FrontendBuilder, LogSink, ThreadingConfig};
use std::env;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

fn now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <out_dir> [rows_per_tick]", args[0]);
        std::process::exit(1);
    }
    let out_dir = &args[1];
    let rows_per_tick: u64 = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(100);

    let running = Arc::new(AtomicBool::new(true));
    let running_for_handler = Arc::clone(&running);
    ctrlc::set_handler(move || {
        running_for_handler.store(false, Ordering::SeqCst);
    })
    .expect("Error setting Ctrl+C handler");

    let mut manager = Manager::new(ThreadingConfig::from_env());
    let mut frontend = FrontendBuilder::new("Ascii")
        .with_sink(Arc::new(LogSink))
        .build(&mut manager, Box::new(AsciiWriter::new(out_dir)))?;

    let schema = vec![
        Field::new("ts", TypeTag::Time),
        Field::new("seq", TypeTag::Count),
        Field::new("port", TypeTag::Port),
    ];
    frontend
        .init(BackendInfo::new("demo").with_rotation_interval(Duration::from_secs(60)), schema)
        .expect("fresh frontend");

    let mut seq = 0u64;
    let mut opened = now();
    while running.load(Ordering::SeqCst) {
        let network_time = now();
        for _ in 0..rows_per_tick {
            frontend.write(vec![
                Value::time(network_time),
                Value::count(seq),
                Value::port((seq % 65536) as u16, TransportProto::Tcp),
            ]);
            seq += 1;
        }

        if network_time - opened >= 60.0 {
            frontend.rotate(format!("demo.{}.log", opened as u64), opened, network_time, false);
            opened = network_time;
        }

        if manager.next_timestamp(network_time).is_some() {
            manager.process(network_time);
        }
        std::thread::sleep(Duration::from_millis(10));
    }

    println!("Wrote {seq} rows, shutting down");
    frontend.finish();
    for (name, stats) in manager.stats() {
        println!("{name}: {stats:?}");
    }
    manager.terminate();
    Ok(())
}
