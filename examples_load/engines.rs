use kvlog::{default_timestamp, errorf, keyvals, with, Config, Engine, Format, Level, Log, Logger, OutputTarget};

fn main() {
    for engine in [Engine::Tracing, Engine::Log, Engine::Std] {
        let log = Log::new(&Config::new(engine).with_level("debug"));
        log.info(format!("hello from the {} engine", engine));
        log.debugw(keyvals!["user", "alice", "attempt", 3]);
        errorf!(log, "request {} failed with {}", 42, "timeout");
    }

    let json = Log::new(
        &Config::new(Engine::Tracing)
            .with_level("info")
            .with_format(Format::Json)
            .with_output(OutputTarget::Console),
    );
    let request = json.with(keyvals!["request_id", "r-17", "at", default_timestamp()]);
    request.warn("slow upstream");
    request.fatal("logged at fatal, process keeps running");

    let bare = kvlog::build_logger(&Config::new(Engine::Std)).map(|l| with(l, keyvals!["component", "bare"]));
    if let Ok(logger) = bare {
        let _ = logger.log(Level::Warn, keyvals!["msg", "straight to the engine"]);
        let _ = logger.sync();
    }

    let _ = json.close();
}
