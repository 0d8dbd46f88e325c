use std::sync::Arc;
use std::time::Instant;

use kvlog::log_logger::LogCrateLogger;
use kvlog::noop_sink::NoopSink;
use kvlog::tracing_logger::TracingLogger;
use kvlog::{Level, Log, Logger};

fn run(name: &str, engine: Arc<dyn Logger>) {
    let log = Log::from_logger(engine, name);

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        log.errorw(kvlog::keyvals!["msg", "default load test error", "iteration", i]);
    }

    let elapsed = start.elapsed();
    println!("{} engine: sent {} records in {:?} (~{:.0} rec/s)",
        name,
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );
}

fn main() {
    run("tracing", Arc::new(TracingLogger::with_sinks(Level::Info, vec![Arc::new(NoopSink)])));
    run("log", Arc::new(LogCrateLogger::with_sinks(Level::Info, vec![Arc::new(NoopSink)])));
}
