use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::kv::{self, Key, Source, VisitSource};
use log::{LevelFilter, Metadata, Record};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::level::{AtomicLevel, Level};
use crate::logger::Logger;
use crate::record::LogRecord;
use crate::sink::{build_sinks, fan_out, flush_all, LogSink};
use crate::value::{Context, Value};

/// Target of the records emitted by [`LogCrateLogger`].
pub const TARGET: &str = "kvlog";

/// Key-value pair carrying the exact [`Level`]; `log` has no fatal level.
const SEVERITY_KEY: &str = "severity";

/// Hook-style engine built on the `log` crate.
///
/// Every record is turned into a [`log::Record`] whose key-value source
/// carries the fields, and handed to a [`HookLogger`] that writes it to the
/// sinks. The same hook can serve the `log` facade process-wide through
/// [`install_global`](LogCrateLogger::install_global).
pub struct LogCrateLogger {
    hook: HookLogger,
    closed: AtomicBool,
}

impl LogCrateLogger {
    /// **Returns**
    /// - `Err(..)` if a log file or its directory cannot be opened.
    pub fn new(config: &Config) -> Result<Self> {
        Ok(LogCrateLogger::with_sinks(config.level, build_sinks(config)?))
    }

    pub fn with_sinks(level: Level, sinks: Vec<Arc<dyn LogSink>>) -> Self {
        LogCrateLogger {
            hook: HookLogger {
                sinks: sinks.into(),
                threshold: Arc::new(AtomicLevel::new(level)),
            },
            closed: AtomicBool::new(false),
        }
    }

    pub fn hook(&self) -> &HookLogger {
        &self.hook
    }

    /// Route the `log` facade (`log::info!` and friends) to this engine's
    /// sinks for the rest of the process. Level changes made through
    /// [`Logger::set_level`] keep applying to those records.
    pub fn install_global(&self) -> Result<()> {
        log::set_boxed_logger(Box::new(self.hook.clone()))?;
        log::set_max_level(LevelFilter::Trace);
        Ok(())
    }

    pub fn level(&self) -> Level {
        self.hook.threshold.load()
    }
}

impl Logger for LogCrateLogger {
    fn log_context(&self, ctx: &Context, level: Level, keyvals: Vec<Value>) -> Result<()> {
        if !self.hook.threshold.enabled(level) || keyvals.is_empty() {
            return Ok(());
        }
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::Closed);
        }

        let record = LogRecord::from_keyvals(ctx, level, keyvals);
        let source = Fields {
            severity: level.as_str(),
            fields: &record.fields,
        };
        let location = ctx.location();
        self.hook.dispatch(
            &Record::builder()
                .args(format_args!("{}", record.message))
                .level(to_log(level))
                .target(TARGET)
                .file(location.map(|l| l.file()))
                .line(location.map(|l| l.line()))
                .key_values(&source)
                .build(),
        )
    }

    fn enabled(&self, level: Level) -> bool {
        self.hook.threshold.enabled(level)
    }

    fn set_level(&self, level: &str) {
        self.hook.threshold.set_str(level);
    }

    fn sync(&self) -> Result<()> {
        flush_all(&self.hook.sinks)
    }

    fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        self.sync()
    }
}

/// [`log::Log`] implementation writing records to a set of sinks.
///
/// Records from other targets keep their target as a `target` field.
#[derive(Clone)]
pub struct HookLogger {
    sinks: Arc<[Arc<dyn LogSink>]>,
    threshold: Arc<AtomicLevel>,
}

impl HookLogger {
    /// Write `record` to every sink accepting its level.
    ///
    /// **Returns**
    /// - `Ok(())` when written or below the threshold.
    /// - `Err(..)` with the first sink failure.
    pub fn dispatch(&self, record: &Record<'_>) -> Result<()> {
        let mut collect = Collect::default();
        // Collect never fails, so the source cannot either.
        let _ = record.key_values().visit(&mut collect);

        let level = collect.severity.unwrap_or_else(|| from_log(record.level()));
        if !self.threshold.enabled(level) {
            return Ok(());
        }

        let mut out = LogRecord::new(level, record.args().to_string());
        if record.target() != TARGET {
            out.fields.push(("target".to_string(), record.target().into()));
        }
        out.fields.extend(collect.fields);
        fan_out(&self.sinks, &out)
    }
}

impl log::Log for HookLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        self.threshold.enabled(from_log(metadata.level()))
    }

    fn log(&self, record: &Record<'_>) {
        if let Err(e) = self.dispatch(record) {
            eprintln!("kvlog: failed to write log record: {}", e);
        }
    }

    fn flush(&self) {
        let _ = flush_all(&self.sinks);
    }
}

fn to_log(level: Level) -> log::Level {
    match level {
        Level::Debug => log::Level::Debug,
        Level::Info => log::Level::Info,
        Level::Warn => log::Level::Warn,
        Level::Error | Level::Fatal => log::Level::Error,
    }
}

fn from_log(level: log::Level) -> Level {
    match level {
        log::Level::Trace | log::Level::Debug => Level::Debug,
        log::Level::Info => Level::Info,
        log::Level::Warn => Level::Warn,
        log::Level::Error => Level::Error,
    }
}

struct Fields<'a> {
    severity: &'a str,
    fields: &'a [(String, serde_json::Value)],
}

impl Source for Fields<'_> {
    fn visit<'kvs>(&'kvs self, visitor: &mut dyn VisitSource<'kvs>) -> Result<(), kv::Error> {
        visitor.visit_pair(Key::from_str(SEVERITY_KEY), kv::Value::from(self.severity))?;
        for (key, value) in self.fields {
            visitor.visit_pair(Key::from_str(key), kv::Value::from_serde(value))?;
        }
        Ok(())
    }

    fn count(&self) -> usize {
        self.fields.len() + 1
    }
}

#[derive(Default)]
struct Collect {
    severity: Option<Level>,
    fields: Vec<(String, serde_json::Value)>,
}

impl<'kvs> VisitSource<'kvs> for Collect {
    fn visit_pair(&mut self, key: Key<'kvs>, value: kv::Value<'kvs>) -> Result<(), kv::Error> {
        if key.as_str() == SEVERITY_KEY && self.severity.is_none() {
            self.severity = Some(Level::parse(&value.to_string()));
            return Ok(());
        }
        let json = serde_json::to_value(&value).unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
        self.fields.push((key.as_str().to_string(), json));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::encoder::Encoding;
    use crate::keyvals;
    use crate::sink::SharedBuffer;

    fn logger(level: Level) -> (LogCrateLogger, SharedBuffer) {
        let buffer = SharedBuffer::new();
        (LogCrateLogger::with_sinks(level, vec![buffer.sink(Encoding::Json)]), buffer)
    }

    fn parse(line: &str) -> serde_json::Value {
        serde_json::from_str(line).unwrap()
    }

    #[test]
    fn emits_structured_record() {
        let (logger, buffer) = logger(Level::Info);
        logger
            .log(Level::Error, keyvals!["msg", "db down", "retries", 3, "ok", false, "nested", json!({"a": [1, 2]})])
            .unwrap();

        let value = parse(&buffer.lines()[0]);
        assert_eq!(value["msg"], json!("db down"));
        assert_eq!(value["level"], json!("error"));
        assert_eq!(value["retries"], json!(3));
        assert_eq!(value["ok"], json!(false));
        assert_eq!(value["nested"], json!({"a": [1, 2]}));
        assert!(value.get("severity").is_none());
        assert!(value.get("target").is_none());
    }

    #[test]
    fn fatal_survives_the_log_crate() {
        let (logger, buffer) = logger(Level::Info);
        logger.log(Level::Fatal, keyvals!["msg", "bye"]).unwrap();
        assert_eq!(parse(&buffer.lines()[0])["level"], json!("fatal"));
    }

    #[test]
    fn threshold_and_set_level() {
        let (logger, buffer) = logger(Level::Warn);
        logger.log(Level::Info, keyvals!["msg", "quiet"]).unwrap();
        assert!(buffer.contents().is_empty());

        logger.set_level("debug");
        logger.log(Level::Debug, keyvals!["msg", "loud"]).unwrap();
        assert_eq!(buffer.lines().len(), 1);

        logger.set_level("???");
        assert_eq!(logger.level(), Level::Warn);
    }

    #[test]
    fn foreign_records_keep_their_target() {
        let (logger, buffer) = logger(Level::Debug);
        logger
            .hook()
            .dispatch(
                &Record::builder()
                    .args(format_args!("from {}", "elsewhere"))
                    .level(log::Level::Trace)
                    .target("other::module")
                    .build(),
            )
            .unwrap();

        let value = parse(&buffer.lines()[0]);
        assert_eq!(value["msg"], json!("from elsewhere"));
        assert_eq!(value["level"], json!("debug"));
        assert_eq!(value["target"], json!("other::module"));
    }

    #[test]
    fn closed_logger_rejects_records() {
        let (logger, buffer) = logger(Level::Debug);
        logger.close().unwrap();
        assert!(matches!(logger.log(Level::Warn, keyvals!["msg", "x"]), Err(Error::Closed)));
        assert!(buffer.contents().is_empty());
    }

    #[test]
    fn global_facade_is_routed_to_sinks() {
        let (logger, buffer) = logger(Level::Info);
        logger.install_global().unwrap();

        log::info!(user = "alice"; "signed in");
        log::debug!("below threshold");

        let lines = buffer.lines();
        assert_eq!(lines.len(), 1);
        let value = parse(&lines[0]);
        assert_eq!(value["msg"], json!("signed in"));
        assert_eq!(value["user"], json!("alice"));
        assert!(value["target"].is_string());
    }
}
