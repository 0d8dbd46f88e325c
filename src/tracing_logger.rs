use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::Dispatch;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::layer::{take_last_error, LayerStats, RecordLayer, TARGET};
use crate::level::{AtomicLevel, Level};
use crate::logger::Logger;
use crate::record::LogRecord;
use crate::sink::{build_sinks, flush_all, LogSink};
use crate::value::{Context, Value};

/// Default engine: a private `tracing` dispatcher with a [`RecordLayer`].
///
/// Each instance owns its own [`Dispatch`], so several loggers can coexist
/// in one process without touching the global subscriber. Records are
/// emitted as `tracing` events with target [`TARGET`]; the dynamic
/// key-value pairs travel JSON-encoded in the `kv` field and the exact level
/// in the `severity` field.
pub struct TracingLogger {
    dispatch: Dispatch,
    threshold: Arc<AtomicLevel>,
    sinks: Arc<[Arc<dyn LogSink>]>,
    stats: Arc<LayerStats>,
    closed: AtomicBool,
}

impl TracingLogger {
    /// Build the engine with the sinks selected by `config`.
    ///
    /// **Returns**
    /// - `Err(..)` if a log file or its directory cannot be opened.
    pub fn new(config: &Config) -> Result<Self> {
        Ok(TracingLogger::with_sinks(config.level, build_sinks(config)?))
    }

    pub fn with_sinks(level: Level, sinks: Vec<Arc<dyn LogSink>>) -> Self {
        let threshold = Arc::new(AtomicLevel::new(level));
        let sinks: Arc<[Arc<dyn LogSink>]> = sinks.into();
        let layer = RecordLayer::new(Arc::clone(&sinks), Arc::clone(&threshold));
        let stats = layer.stats();
        TracingLogger {
            dispatch: Dispatch::new(Registry::default().with(layer)),
            threshold,
            sinks,
            stats,
            closed: AtomicBool::new(false),
        }
    }

    pub fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    /// Make this engine the process-wide `tracing` dispatcher, so
    /// `tracing::info!` and friends anywhere in the process end up in the
    /// same sinks under the same threshold.
    pub fn install_global(&self) -> Result<()> {
        tracing::dispatcher::set_global_default(self.dispatch.clone())?;
        Ok(())
    }

    pub fn stats(&self) -> &LayerStats {
        &self.stats
    }

    pub fn level(&self) -> Level {
        self.threshold.load()
    }
}

impl Logger for TracingLogger {
    fn log_context(&self, ctx: &Context, level: Level, keyvals: Vec<Value>) -> Result<()> {
        if !self.threshold.enabled(level) || keyvals.is_empty() {
            return Ok(());
        }
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::Closed);
        }

        let record = LogRecord::from_keyvals(ctx, level, keyvals);
        let kv = serde_json::to_string(&record.fields)?;

        take_last_error();
        tracing::dispatcher::with_default(&self.dispatch, || emit(level, &record.message, &kv));
        match take_last_error() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn enabled(&self, level: Level) -> bool {
        self.threshold.enabled(level)
    }

    fn set_level(&self, level: &str) {
        self.threshold.set_str(level);
    }

    fn sync(&self) -> Result<()> {
        flush_all(&self.sinks)
    }

    fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        self.sync()
    }
}

fn emit(level: Level, message: &str, kv: &str) {
    let severity = level.as_str();
    match level {
        Level::Debug => tracing::event!(target: TARGET, tracing::Level::DEBUG, severity, kv, "{}", message),
        Level::Info => tracing::event!(target: TARGET, tracing::Level::INFO, severity, kv, "{}", message),
        Level::Warn => tracing::event!(target: TARGET, tracing::Level::WARN, severity, kv, "{}", message),
        Level::Error | Level::Fatal => {
            tracing::event!(target: TARGET, tracing::Level::ERROR, severity, kv, "{}", message)
        }
    }
}
