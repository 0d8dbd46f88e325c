use std::borrow::Cow;

use chrono::{DateTime, Local};
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::level::Level;
use crate::logger::{normalize, DEFAULT_MESSAGE_KEY};
use crate::value::{Context, Value, DEFAULT_TIMESTAMP_FORMAT};

/// One log entry as handed to sinks and encoders.
///
/// `fields` keeps call order; the text encoder renders them in that order.
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub timestamp: DateTime<Local>,
    pub level: Level,
    pub message: String,
    pub fields: Vec<(String, serde_json::Value)>,
}

impl LogRecord {
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        LogRecord {
            timestamp: Local::now(),
            level,
            message: message.into(),
            fields: Vec::new(),
        }
    }

    /// Build a record from a flat key-value sequence.
    ///
    /// Remaining deferred values are resolved against `ctx`, the
    /// [`DEFAULT_MESSAGE_KEY`] entry becomes the message and pairs whose key
    /// is not a string are skipped.
    pub fn from_keyvals(ctx: &Context, level: Level, mut keyvals: Vec<Value>) -> Self {
        normalize(&mut keyvals);
        let mut record = LogRecord::new(level, String::new());
        record.fields.reserve(keyvals.len() / 2);

        let mut iter = keyvals.into_iter();
        while let (Some(key), Some(value)) = (iter.next(), iter.next()) {
            let Value::Concrete(serde_json::Value::String(key)) = key else {
                continue;
            };
            let value = value.resolve(ctx);
            if key == DEFAULT_MESSAGE_KEY {
                record.message = match value {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                };
                continue;
            }
            record.fields.push((key, value));
        }
        record
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.fields.push((key.into(), value.into()));
        self
    }
}

impl Serialize for LogRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len() + 3))?;
        map.serialize_entry("ts", &format_args!("{}", self.timestamp.format(DEFAULT_TIMESTAMP_FORMAT)))?;
        map.serialize_entry("level", self.level.as_str())?;
        map.serialize_entry(DEFAULT_MESSAGE_KEY, &self.message)?;
        for (key, value) in &self.fields {
            map.serialize_entry(&*field_key(key), value)?;
        }
        map.end()
    }
}

/// Keys the JSON header always writes.
pub const RESERVED_KEYS: [&str; 3] = ["ts", "level", DEFAULT_MESSAGE_KEY];

/// Key a field is written under in a JSON object: header keys move to
/// `fields.<key>` so they never repeat.
pub fn field_key(key: &str) -> Cow<'_, str> {
    if RESERVED_KEYS.contains(&key) {
        Cow::Owned(format!("fields.{}", key))
    } else {
        Cow::Borrowed(key)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::keyvals;
    use crate::value::Valuer;

    #[test]
    fn message_key_is_lifted_out() {
        let record = LogRecord::from_keyvals(
            &Context::default(),
            Level::Info,
            keyvals!["user", "alice", "msg", "login", "attempt", 2],
        );
        assert_eq!(record.message, "login");
        assert_eq!(
            record.fields,
            vec![("user".to_string(), json!("alice")), ("attempt".to_string(), json!(2))]
        );
    }

    #[test]
    fn non_string_keys_are_skipped() {
        let record = LogRecord::from_keyvals(&Context::default(), Level::Warn, keyvals![42, "x", "k", "v"]);
        assert_eq!(record.fields, vec![("k".to_string(), json!("v"))]);
    }

    #[test]
    fn odd_records_are_padded() {
        let record = LogRecord::from_keyvals(&Context::default(), Level::Warn, keyvals!["a", 1, "b"]);
        assert_eq!(record.fields.len(), 2);
        assert_eq!(record.fields[1], ("b".to_string(), json!(crate::logger::UNPAIRED_SENTINEL)));
    }

    #[test]
    fn deferred_values_are_resolved() {
        let v = Valuer::new(|_| json!("late"));
        let record = LogRecord::from_keyvals(&Context::default(), Level::Info, keyvals!["k", v]);
        assert_eq!(record.fields, vec![("k".to_string(), json!("late"))]);
    }

    #[test]
    fn serializes_header_then_fields() {
        let record = LogRecord::new(Level::Error, "boom").with_field("code", 7);
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["level"], json!("error"));
        assert_eq!(value["msg"], json!("boom"));
        assert_eq!(value["code"], json!(7));
        assert!(value["ts"].is_string());
    }

    #[test]
    fn header_keys_are_not_repeated() {
        let record = LogRecord::new(Level::Info, "real").with_field("level", "debug").with_field("ts", 1);
        let line = serde_json::to_string(&record).unwrap();
        assert_eq!(line.matches("\"level\":").count(), 1);

        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["level"], json!("info"));
        assert_eq!(value["fields.level"], json!("debug"));
        assert_eq!(value["fields.ts"], json!(1));
        assert_eq!(field_key("user"), "user");
    }
}
