use std::cell::RefCell;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

use crate::error::Error;
use crate::level::{AtomicLevel, Level};
use crate::record::LogRecord;
use crate::sink::{fan_out, LogSink};

/// Target of the events emitted by [`TracingLogger`](crate::tracing_logger::TracingLogger).
pub const TARGET: &str = "kvlog";

/// Event field carrying the adapter's key-value pairs, JSON encoded.
pub(crate) const KV_FIELD: &str = "kv";

/// Event field carrying the exact [`Level`]; `tracing` has no fatal level.
pub(crate) const SEVERITY_FIELD: &str = "severity";

thread_local! {
    static LAST_ERROR: RefCell<Option<Error>> = const { RefCell::new(None) };
}

/// Take the sink error left by the last adapter event on this thread.
pub(crate) fn take_last_error() -> Option<Error> {
    LAST_ERROR.with(|slot| slot.borrow_mut().take())
}

/// Counters maintained by [`RecordLayer`].
#[derive(Debug, Default)]
pub struct LayerStats {
    /// Total events seen by the layer (before filtering by level).
    pub total_events: AtomicU64,
    /// Records accepted by every sink.
    pub written_events: AtomicU64,
    /// Records at least one sink failed to write.
    pub failed_events: AtomicU64,
}

/// `tracing_subscriber` layer that turns events into [`LogRecord`]s and
/// writes them to a set of [`LogSink`]s on the emitting thread.
///
/// Events coming from the adapter carry their key-value pairs in the `kv`
/// field; any other event is recorded field by field, so plain `tracing`
/// macros land in the same sinks once the dispatcher is installed globally.
pub struct RecordLayer {
    sinks: Arc<[Arc<dyn LogSink>]>,
    threshold: Arc<AtomicLevel>,
    stats: Arc<LayerStats>,
}

impl RecordLayer {
    pub fn new(sinks: Arc<[Arc<dyn LogSink>]>, threshold: Arc<AtomicLevel>) -> Self {
        RecordLayer {
            sinks,
            threshold,
            stats: Arc::new(LayerStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<LayerStats> {
        Arc::clone(&self.stats)
    }
}

pub(crate) fn from_tracing(level: tracing::Level) -> Level {
    match level {
        tracing::Level::TRACE | tracing::Level::DEBUG => Level::Debug,
        tracing::Level::INFO => Level::Info,
        tracing::Level::WARN => Level::Warn,
        tracing::Level::ERROR => Level::Error,
    }
}

impl<S> Layer<S> for RecordLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        self.stats.total_events.fetch_add(1, Ordering::Relaxed);

        let meta = event.metadata();
        let from_adapter = meta.target() == TARGET;
        let mut visitor = FieldVisitor::new(from_adapter);
        event.record(&mut visitor);

        let level = visitor.severity.unwrap_or_else(|| from_tracing(*meta.level()));
        if !self.threshold.enabled(level) {
            return;
        }

        let mut record = LogRecord::new(level, visitor.message.unwrap_or_default());
        if !from_adapter {
            record.fields.push(("target".to_string(), meta.target().into()));
        }
        record.fields.extend(visitor.fields);

        match fan_out(&self.sinks, &record) {
            Ok(()) => {
                self.stats.written_events.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.stats.failed_events.fetch_add(1, Ordering::Relaxed);
                if from_adapter {
                    LAST_ERROR.with(|slot| *slot.borrow_mut() = Some(e));
                } else {
                    eprintln!("kvlog: failed to write tracing event: {}", e);
                }
            }
        }
    }
}

pub struct FieldVisitor {
    pub fields: Vec<(String, serde_json::Value)>,
    pub message: Option<String>,
    pub severity: Option<Level>,
    from_adapter: bool,
}

impl FieldVisitor {
    pub fn new(from_adapter: bool) -> Self {
        FieldVisitor {
            fields: Vec::new(),
            message: None,
            severity: None,
            from_adapter,
        }
    }

    fn push(&mut self, field: &Field, value: serde_json::Value) {
        self.fields.push((field.name().to_string(), value));
    }
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "message" => self.message = Some(value.to_string()),
            SEVERITY_FIELD if self.from_adapter => self.severity = Some(Level::parse(value)),
            KV_FIELD if self.from_adapter => {
                match serde_json::from_str::<Vec<(String, serde_json::Value)>>(value) {
                    Ok(pairs) => self.fields.extend(pairs),
                    Err(_) => self.push(field, serde_json::Value::String(value.to_string())),
                }
            }
            _ => self.push(field, serde_json::Value::String(value.to_string())),
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.push(field, serde_json::Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.push(field, serde_json::Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.push(field, serde_json::Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.push(field, serde_json::Value::from(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{:?}", value));
        } else {
            self.push(field, serde_json::Value::String(format!("{:?}", value)));
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::Registry;

    use super::*;
    use crate::encoder::Encoding;
    use crate::sink::SharedBuffer;

    fn dispatch(buffer: &SharedBuffer, level: Level) -> (tracing::Dispatch, Arc<LayerStats>) {
        let sinks: Arc<[Arc<dyn LogSink>]> = vec![buffer.sink(Encoding::Json)].into();
        let layer = RecordLayer::new(sinks, Arc::new(AtomicLevel::new(level)));
        let stats = layer.stats();
        (tracing::Dispatch::new(Registry::default().with(layer)), stats)
    }

    #[test]
    fn foreign_events_are_recorded_field_by_field() {
        let buffer = SharedBuffer::new();
        let (dispatch, stats) = dispatch(&buffer, Level::Info);

        tracing::dispatcher::with_default(&dispatch, || {
            tracing::warn!(user_id = 42, ok = true, "authentication failed");
            tracing::debug!("filtered out");
        });

        let lines = buffer.lines();
        assert_eq!(lines.len(), 1);
        let value: serde_json::Value = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(value["msg"], json!("authentication failed"));
        assert_eq!(value["level"], json!("warn"));
        assert_eq!(value["user_id"], json!(42));
        assert_eq!(value["ok"], json!(true));
        assert!(value["target"].is_string());
        assert_eq!(stats.total_events.load(Ordering::Relaxed), 2);
        assert_eq!(stats.written_events.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn adapter_fields_are_decoded() {
        let buffer = SharedBuffer::new();
        let (dispatch, _) = dispatch(&buffer, Level::Debug);
        let kv = serde_json::to_string(&vec![("a".to_string(), json!(1)), ("b".to_string(), json!("x"))]).unwrap();
        let kv = kv.as_str();
        let severity = "fatal";

        tracing::dispatcher::with_default(&dispatch, || {
            tracing::event!(target: TARGET, tracing::Level::ERROR, severity, kv, "{}", "down");
        });

        let value: serde_json::Value = serde_json::from_str(&buffer.lines()[0]).unwrap();
        assert_eq!(value["level"], json!("fatal"));
        assert_eq!(value["msg"], json!("down"));
        assert_eq!(value["a"], json!(1));
        assert_eq!(value["b"], json!("x"));
        assert!(value.get("target").is_none());
    }
}
