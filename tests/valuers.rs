use std::sync::Arc;
use std::time::Duration;

use kvlog::encoder::Encoding;
use kvlog::sink::SharedBuffer;
use kvlog::tracing_logger::TracingLogger;
use kvlog::{default_timestamp, keyvals, with, with_context, Context, Level, Logger, Valuer};

fn json_engine() -> (Arc<dyn Logger>, SharedBuffer) {
    let buffer = SharedBuffer::new();
    let engine = TracingLogger::with_sinks(Level::Debug, vec![buffer.sink(Encoding::Json)]);
    (Arc::new(engine), buffer)
}

fn field(buffer: &SharedBuffer, index: usize, key: &str) -> serde_json::Value {
    let record: serde_json::Value = serde_json::from_str(&buffer.lines()[index]).unwrap();
    record[key].clone()
}

#[test]
fn timestamp_valuer_is_fresh_and_non_decreasing() {
    let (engine, buffer) = json_engine();
    let logger = with(engine, keyvals!["at", default_timestamp()]);

    logger.log(Level::Info, keyvals!["msg", "first"]).unwrap();
    std::thread::sleep(Duration::from_millis(5));
    logger.log(Level::Info, keyvals!["msg", "second"]).unwrap();

    let first = field(&buffer, 0, "at");
    let second = field(&buffer, 1, "at");
    assert_ne!(first, second);
    assert!(first.as_str().unwrap() < second.as_str().unwrap());
}

#[test]
fn with_nothing_behaves_like_the_base_logger() {
    let (engine, buffer) = json_engine();
    let wrapped = with(Arc::clone(&engine), Vec::new());
    assert!(Arc::ptr_eq(&engine, &wrapped));

    wrapped.log(Level::Info, keyvals!["msg", "same", "k", 1]).unwrap();
    engine.log(Level::Info, keyvals!["msg", "same", "k", 1]).unwrap();
    assert_eq!(field(&buffer, 0, "k"), field(&buffer, 1, "k"));
    assert_eq!(field(&buffer, 0, "msg"), field(&buffer, 1, "msg"));
}

#[test]
fn request_context_reaches_bound_valuers() {
    let (engine, buffer) = json_engine();
    let trace_id = Valuer::new(|ctx: &Context| ctx.value("trace_id").cloned().unwrap_or_default());
    let logger = with(engine, keyvals!["trace_id", trace_id]);

    let request = with_context(Arc::clone(&logger), Context::default().with_value("trace_id", "abc-123"));
    request.log(Level::Info, keyvals!["msg", "in request"]).unwrap();
    logger.log(Level::Info, keyvals!["msg", "outside"]).unwrap();

    assert_eq!(field(&buffer, 0, "trace_id"), "abc-123");
    assert_eq!(field(&buffer, 1, "trace_id"), serde_json::Value::Null);
}
