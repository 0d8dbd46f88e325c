use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Instant;

use tracing::error;

use kvlog::noop_sink::NoopSink;
use kvlog::tracing_logger::TracingLogger;
use kvlog::Level;

/// Plain `tracing` macros routed through the engine installed as the
/// process-wide dispatcher.
fn main() {
    let engine = TracingLogger::with_sinks(Level::Info, vec![Arc::new(NoopSink)]);
    if let Err(e) = engine.install_global() {
        eprintln!("install failed: {}", e);
        return;
    }

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        error!(iteration = i, "custom load test error");
    }

    let elapsed = start.elapsed();
    println!("global dispatcher: sent {} events in {:?} (~{:.0} ev/s), {} written",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64(),
        engine.stats().written_events.load(Ordering::Relaxed)
    );
}
