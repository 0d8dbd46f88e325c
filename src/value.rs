use std::collections::BTreeMap;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

use chrono::Local;

/// Format used by [`default_timestamp`] and by the record encoders.
pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d.%H:%M:%S%.6f";

/// Resolution context handed to every [`Valuer`] at emission time.
///
/// It carries the call-site location captured by the `#[track_caller]`
/// entry point of the call, plus request-scoped values bound with
/// [`with_context`](crate::logger::with_context).
#[derive(Debug, Clone, Default)]
pub struct Context {
    location: Option<&'static Location<'static>>,
    values: Arc<BTreeMap<String, serde_json::Value>>,
}

impl Context {
    /// Capture the location of the nearest caller not marked `#[track_caller]`.
    #[track_caller]
    pub fn capture() -> Self {
        Context {
            location: Some(Location::caller()),
            values: Arc::default(),
        }
    }

    /// Override the call-site location. Wrappers that cannot carry
    /// `#[track_caller]` use this to forward the location they received.
    pub fn with_location(mut self, location: &'static Location<'static>) -> Self {
        self.location = Some(location);
        self
    }

    pub fn location(&self) -> Option<&'static Location<'static>> {
        self.location
    }

    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Arc::make_mut(&mut self.values).insert(key.into(), value.into());
        self
    }

    pub fn value(&self, key: &str) -> Option<&serde_json::Value> {
        self.values.get(key)
    }

    /// Layer this call context over a bound one: the location comes from the
    /// call (or the bound context if the call has none), and call values win
    /// over bound values with the same key.
    pub(crate) fn inherit(&self, bound: &Context) -> Context {
        let values = if bound.values.is_empty() {
            Arc::clone(&self.values)
        } else if self.values.is_empty() {
            Arc::clone(&bound.values)
        } else {
            let mut merged = (*bound.values).clone();
            merged.extend(self.values.iter().map(|(k, v)| (k.clone(), v.clone())));
            Arc::new(merged)
        };
        Context {
            location: self.location.or(bound.location),
            values,
        }
    }
}

/// A value computed from the [`Context`] each time a record is emitted.
#[derive(Clone)]
pub struct Valuer(Arc<dyn Fn(&Context) -> serde_json::Value + Send + Sync>);

impl Valuer {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Context) -> serde_json::Value + Send + Sync + 'static,
    {
        Valuer(Arc::new(f))
    }

    pub fn resolve(&self, ctx: &Context) -> serde_json::Value {
        (self.0)(ctx)
    }
}

impl fmt::Debug for Valuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Valuer(..)")
    }
}

/// One entry of a key-value record: either a concrete value or one that is
/// resolved against the [`Context`] right before the record is emitted.
#[derive(Debug, Clone)]
pub enum Value {
    Concrete(serde_json::Value),
    Deferred(Valuer),
}

impl Value {
    pub fn is_valuer(&self) -> bool {
        matches!(self, Value::Deferred(_))
    }

    /// Borrow the string payload of a concrete string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Concrete(serde_json::Value::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn resolve(self, ctx: &Context) -> serde_json::Value {
        match self {
            Value::Concrete(v) => v,
            Value::Deferred(valuer) => valuer.resolve(ctx),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Concrete(serde_json::Value::String(s)) => f.write_str(s),
            Value::Concrete(v) => write!(f, "{}", v),
            Value::Deferred(_) => f.write_str("<valuer>"),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Concrete(v)
    }
}

impl From<Valuer> for Value {
    fn from(v: Valuer) -> Self {
        Value::Deferred(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Concrete(serde_json::Value::String(v.to_string()))
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::from(v.as_str())
    }
}

macro_rules! impl_from_json {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::Concrete(serde_json::Value::from(v))
                }
            }
        )*
    };
}

impl_from_json!(String, bool, i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64);

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Concrete(serde_json::Value::Null))
    }
}

/// Build a `Vec<Value>` key-value record from alternating keys and values.
///
/// ```
/// let kvs = kvlog::keyvals!["user", "alice", "attempt", 3];
/// assert_eq!(kvs.len(), 4);
/// ```
#[macro_export]
macro_rules! keyvals {
    () => { ::std::vec::Vec::<$crate::value::Value>::new() };
    ($($v:expr),+ $(,)?) => {
        ::std::vec![$($crate::value::Value::from($v)),+]
    };
}

/// Resolve a single value against `ctx`.
pub fn value(ctx: &Context, v: Value) -> serde_json::Value {
    v.resolve(ctx)
}

/// Replace every deferred value in a value position with its result.
pub fn bind_values(ctx: &Context, keyvals: &mut [Value]) {
    for slot in keyvals.iter_mut().skip(1).step_by(2) {
        if let Value::Deferred(valuer) = slot {
            *slot = Value::Concrete(valuer.resolve(ctx));
        }
    }
}

/// Whether any value position holds a deferred value.
pub fn contains_valuer(keyvals: &[Value]) -> bool {
    keyvals.iter().skip(1).step_by(2).any(Value::is_valuer)
}

/// Valuer yielding `dir/file.rs:line` of the call site held by the context.
///
/// The location is the one captured by the outermost `#[track_caller]`
/// entry point of the call. Every facade method and every helper between it
/// and [`Context::capture`] carries `#[track_caller]`; a wrapper added on top
/// must do the same, or pass the location through
/// [`Context::with_location`], for the result to keep pointing at
/// application code.
pub fn caller() -> Valuer {
    Valuer::new(|ctx| match ctx.location() {
        Some(location) => serde_json::Value::String(format!(
            "{}:{}",
            short_file(location.file()),
            location.line()
        )),
        None => serde_json::Value::String("unknown".to_string()),
    })
}

/// Keep the last two path components, e.g. `src/main.rs`.
fn short_file(file: &str) -> &str {
    let mut separators = file.rmatch_indices(['/', '\\']);
    match (separators.next(), separators.next()) {
        (Some(_), Some((idx, _))) => &file[idx + 1..],
        _ => file,
    }
}

/// Valuer returning the current local wall-clock time in `format`.
pub fn timestamp(format: &'static str) -> Valuer {
    Valuer::new(move |_| serde_json::Value::String(Local::now().format(format).to_string()))
}

pub fn default_timestamp() -> Valuer {
    timestamp(DEFAULT_TIMESTAMP_FORMAT)
}
