use std::sync::Arc;

use crate::error::Result;
use crate::level::Level;
use crate::value::{bind_values, contains_valuer, Context, Value};

/// Key under which the facade stores the human-readable message.
pub const DEFAULT_MESSAGE_KEY: &str = "msg";

/// Value appended to an odd-length key-value record.
pub const UNPAIRED_SENTINEL: &str = "KEYVALS UNPAIRED";

/// Minimal capability every engine adapter implements.
///
/// Implementations must be `Send + Sync`; one instance is shared by every
/// thread that logs through it.
pub trait Logger: Send + Sync {
    /// Emit one record, resolving deferred values against `ctx`.
    ///
    /// **Parameters**
    /// - `ctx`: resolution context of this call (call-site location and
    ///   request-scoped values).
    /// - `level`: severity of the record.
    /// - `keyvals`: flat alternating keys and values. Empty records are a
    ///   no-op; odd-length records are padded with [`UNPAIRED_SENTINEL`].
    ///
    /// **Returns**
    /// - `Ok(())` when the record was written or suppressed by the threshold.
    /// - `Err(..)` when the engine reported a sink failure, or after `close`.
    fn log_context(&self, ctx: &Context, level: Level, keyvals: Vec<Value>) -> Result<()>;

    /// Emit one record, capturing the caller's location into a fresh context.
    #[track_caller]
    fn log(&self, level: Level, keyvals: Vec<Value>) -> Result<()> {
        self.log_context(&Context::capture(), level, keyvals)
    }

    /// Cheap check of the current threshold, used by wrappers to skip work
    /// for records that would be dropped anyway.
    fn enabled(&self, _level: Level) -> bool {
        true
    }

    /// Replace the minimum level; unknown names select [`Level::Warn`].
    fn set_level(&self, level: &str);

    /// Flush buffered output. Engines without buffering keep the default.
    fn sync(&self) -> Result<()> {
        Ok(())
    }

    /// Flush and stop accepting records; later calls fail with
    /// [`Error::Closed`](crate::error::Error::Closed).
    fn close(&self) -> Result<()> {
        self.sync()
    }
}

impl<L: Logger + ?Sized> Logger for Arc<L> {
    fn log_context(&self, ctx: &Context, level: Level, keyvals: Vec<Value>) -> Result<()> {
        (**self).log_context(ctx, level, keyvals)
    }

    fn enabled(&self, level: Level) -> bool {
        (**self).enabled(level)
    }

    fn set_level(&self, level: &str) {
        (**self).set_level(level)
    }

    fn sync(&self) -> Result<()> {
        (**self).sync()
    }

    fn close(&self) -> Result<()> {
        (**self).close()
    }
}

impl<L: Logger + ?Sized> Logger for Box<L> {
    fn log_context(&self, ctx: &Context, level: Level, keyvals: Vec<Value>) -> Result<()> {
        (**self).log_context(ctx, level, keyvals)
    }

    fn enabled(&self, level: Level) -> bool {
        (**self).enabled(level)
    }

    fn set_level(&self, level: &str) {
        (**self).set_level(level)
    }

    fn sync(&self) -> Result<()> {
        (**self).sync()
    }

    fn close(&self) -> Result<()> {
        (**self).close()
    }
}

/// Pad an odd-length record so every key has a value.
pub fn normalize(keyvals: &mut Vec<Value>) {
    if keyvals.len() % 2 == 1 {
        keyvals.push(Value::from(UNPAIRED_SENTINEL));
    }
}

/// Logger that prepends a fixed set of fields to every record.
///
/// Built by [`with`] and [`with_context`]; see those for the semantics.
pub struct Decorator {
    inner: Arc<dyn Logger>,
    prefix: Vec<Value>,
    has_valuer: bool,
    ctx: Context,
}

impl Logger for Decorator {
    fn log_context(&self, ctx: &Context, level: Level, keyvals: Vec<Value>) -> Result<()> {
        if keyvals.is_empty() || !self.inner.enabled(level) {
            return Ok(());
        }

        let ctx = ctx.inherit(&self.ctx);
        let mut kvs = Vec::with_capacity(self.prefix.len() + keyvals.len() + 1);
        kvs.extend(self.prefix.iter().cloned());
        if self.has_valuer {
            bind_values(&ctx, &mut kvs);
        }
        kvs.extend(keyvals);
        self.inner.log_context(&ctx, level, kvs)
    }

    fn enabled(&self, level: Level) -> bool {
        self.inner.enabled(level)
    }

    fn set_level(&self, level: &str) {
        self.inner.set_level(level)
    }

    fn sync(&self) -> Result<()> {
        self.inner.sync()
    }

    fn close(&self) -> Result<()> {
        self.inner.close()
    }
}

/// Bind `keyvals` to `logger`, returning a logger that prepends them to
/// every record.
///
/// Deferred values among the bound fields are resolved on every emission,
/// never here. Wrapping a wrapped logger chains the layers, each resolving
/// only its own fields; the innermost layer's fields come first in the
/// emitted record. Odd-length bindings are padded now so the call-site
/// pairs never shift.
///
/// With no fields the original logger is returned as is.
pub fn with(logger: Arc<dyn Logger>, keyvals: Vec<Value>) -> Arc<dyn Logger> {
    if keyvals.is_empty() {
        return logger;
    }
    let mut prefix = keyvals;
    normalize(&mut prefix);
    let has_valuer = contains_valuer(&prefix);
    Arc::new(Decorator {
        inner: logger,
        prefix,
        has_valuer,
        ctx: Context::default(),
    })
}

/// Bind request-scoped context values to `logger`.
///
/// Every valuer resolved at or below this layer sees `ctx`'s values; values
/// supplied with the call itself take precedence.
pub fn with_context(logger: Arc<dyn Logger>, ctx: Context) -> Arc<dyn Logger> {
    Arc::new(Decorator {
        inner: logger,
        prefix: Vec::new(),
        has_valuer: false,
        ctx,
    })
}


#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::testing::Recorder;
    use super::*;
    use crate::keyvals;
    use crate::value::Valuer;

    #[test]
    fn normalize_pads_odd_records() {
        let mut kvs = keyvals!["a", 1, "b"];
        normalize(&mut kvs);
        assert_eq!(kvs.len(), 4);
        assert_eq!(kvs[3].as_str(), Some(UNPAIRED_SENTINEL));

        let mut even = keyvals!["a", 1];
        normalize(&mut even);
        assert_eq!(even.len(), 2);
    }

    #[test]
    fn with_no_fields_returns_same_logger() {
        let base: Arc<dyn Logger> = Recorder::at(Level::Debug);
        let wrapped = with(Arc::clone(&base), Vec::new());
        assert!(Arc::ptr_eq(&base, &wrapped));
    }

    #[test]
    fn bound_fields_come_first() {
        let recorder = Recorder::at(Level::Debug);
        let logger = with(recorder.clone(), keyvals!["service", "auth"]);
        logger.log(Level::Info, keyvals!["msg", "hello"]).unwrap();

        let records = recorder.take();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].1, vec![json!("service"), json!("auth"), json!("msg"), json!("hello")]);
    }

    #[test]
    fn chained_decorators_keep_inner_fields_first() {
        let recorder = Recorder::at(Level::Debug);
        let inner = with(recorder.clone(), keyvals!["a", 1]);
        let outer = with(inner, keyvals!["b", 2]);
        outer.log(Level::Warn, keyvals!["c", 3]).unwrap();

        let records = recorder.take();
        assert_eq!(
            records[0].1,
            vec![json!("a"), json!(1), json!("b"), json!(2), json!("c"), json!(3)]
        );
    }

    #[test]
    fn odd_binding_is_padded_at_bind_time() {
        let recorder = Recorder::at(Level::Debug);
        let logger = with(recorder.clone(), keyvals!["lonely"]);
        logger.log(Level::Info, keyvals!["k", "v"]).unwrap();

        let records = recorder.take();
        assert_eq!(
            records[0].1,
            vec![json!("lonely"), json!(UNPAIRED_SENTINEL), json!("k"), json!("v")]
        );
    }

    #[test]
    fn valuers_resolve_on_every_call() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let seq = Valuer::new(move |_| json!(counter.fetch_add(1, Ordering::SeqCst)));

        let recorder = Recorder::at(Level::Debug);
        let logger = with(recorder.clone(), keyvals!["seq", seq]);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        logger.log(Level::Info, keyvals!["msg", "one"]).unwrap();
        logger.log(Level::Info, keyvals!["msg", "two"]).unwrap();

        let records = recorder.take();
        assert_eq!(records[0].1[1], json!(0));
        assert_eq!(records[1].1[1], json!(1));
    }

    #[test]
    fn suppressed_records_do_not_resolve_valuers() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let seq = Valuer::new(move |_| json!(counter.fetch_add(1, Ordering::SeqCst)));

        let recorder = Recorder::at(Level::Error);
        let logger = with(recorder.clone(), keyvals!["seq", seq]);
        logger.log(Level::Info, keyvals!["msg", "dropped"]).unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(recorder.take().is_empty());
    }

    #[test]
    fn bound_context_values_reach_valuers() {
        let trace = Valuer::new(|ctx| ctx.value("trace_id").cloned().unwrap_or_default());
        let recorder = Recorder::at(Level::Debug);
        let logger = with(recorder.clone(), keyvals!["trace_id", trace]);
        let logger = with_context(logger, Context::default().with_value("trace_id", "t-1"));

        logger.log(Level::Info, keyvals!["msg", "x"]).unwrap();

        assert_eq!(recorder.take()[0].1[1], json!("t-1"));
    }

    #[test]
    fn empty_call_is_a_no_op_even_with_bound_fields() {
        let recorder = Recorder::at(Level::Debug);
        let logger = with(recorder.clone(), keyvals!["k", "v"]);
        logger.log(Level::Info, Vec::new()).unwrap();
        assert!(recorder.take().is_empty());
    }

    #[test]
    fn set_level_reaches_the_base_logger() {
        let recorder = Recorder::at(Level::Info);
        let logger = with(recorder.clone(), keyvals!["k", "v"]);
        logger.set_level("error");
        assert!(!logger.enabled(Level::Warn));
        logger.set_level("bogus");
        assert_eq!(recorder.threshold.load(), Level::Warn);
    }
}
