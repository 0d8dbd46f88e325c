use std::io::Write;

use colored::Color;

use crate::color::{
    level_color, paint, paint_with, write_json_colored, write_json_key, write_json_string, PREFIX_COLOR,
    TIMESTAMP_COLOR,
};
use crate::config::Format;
use crate::error::Result;
use crate::logger::DEFAULT_MESSAGE_KEY;
use crate::record::{field_key, LogRecord};
use crate::value::DEFAULT_TIMESTAMP_FORMAT;

/// Byte-level rendering of a [`LogRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// One JSON object per line: `ts`, `level`, `msg`, then the fields.
    Json,
    /// `[ts]  LEVEL   prefix: message key=value ...`
    Text,
}

impl From<Format> for Encoding {
    fn from(format: Format) -> Self {
        match format {
            Format::Json => Encoding::Json,
            Format::Text => Encoding::Text,
        }
    }
}

impl Encoding {
    /// Append the encoded record, newline included, to `buf`.
    ///
    /// `color` must only be set for terminal-attached sinks.
    pub fn encode(self, record: &LogRecord, color: bool, buf: &mut Vec<u8>) -> Result<()> {
        match self {
            Encoding::Json if color => encode_json_colored(record, buf),
            Encoding::Json => serde_json::to_writer(&mut *buf, record)?,
            Encoding::Text => encode_text(record, color, buf),
        }
        buf.push(b'\n');
        Ok(())
    }
}

fn encode_json_colored(record: &LogRecord, out: &mut Vec<u8>) {
    let lc = level_color(record.level);
    out.push(b'{');
    write_json_key(out, "ts");
    paint_with(out, TIMESTAMP_COLOR, true, |out| {
        let _ = write!(out, "\"{}\"", record.timestamp.format(DEFAULT_TIMESTAMP_FORMAT));
    });
    out.push(b',');
    write_json_key(out, "level");
    paint_with(out, lc, true, |out| {
        let _ = write!(out, "\"{}\"", record.level.as_str());
    });
    out.push(b',');
    write_json_key(out, DEFAULT_MESSAGE_KEY);
    write_json_string(out, &record.message, Color::Green);
    for (key, value) in &record.fields {
        out.push(b',');
        write_json_key(out, &field_key(key));
        write_json_colored(out, value);
    }
    out.push(b'}');
}

fn encode_text(record: &LogRecord, color: bool, out: &mut Vec<u8>) {
    let lc = level_color(record.level);

    paint_with(out, TIMESTAMP_COLOR, color, |out| {
        let _ = write!(out, "[{}]", record.timestamp.format(DEFAULT_TIMESTAMP_FORMAT));
    });
    paint_with(out, lc, color, |out| {
        let _ = write!(out, "{:>6}{:3}", record.level.as_upper(), "");
    });

    match extract_prefix(&record.message) {
        Some((prefix, rest)) => {
            paint_with(out, PREFIX_COLOR, color, |out| {
                out.extend_from_slice(prefix.as_bytes());
                out.push(b':');
            });
            out.push(b' ');
            out.extend_from_slice(rest.as_bytes());
        }
        None => out.extend_from_slice(record.message.as_bytes()),
    }

    for (key, value) in &record.fields {
        out.push(b' ');
        paint(out, key, lc, color);
        out.push(b'=');
        write_text_value(out, value);
    }
}

/// Strings escaped and unquoted, everything else as compact JSON.
pub fn write_text_value(out: &mut Vec<u8>, value: &serde_json::Value) {
    match value {
        serde_json::Value::String(s) => escape_into(out, s),
        other => {
            let _ = serde_json::to_writer(&mut *out, other);
        }
    }
}

/// Split a leading `[prefix]` off a message.
fn extract_prefix(msg: &str) -> Option<(&str, &str)> {
    let rest = msg.strip_prefix('[')?;
    let end = rest.find(']')?;
    Some((&rest[..end], rest[end + 1..].trim()))
}

/// Escape control characters, quotes and backslashes so a value never
/// breaks the one-record-per-line layout.
fn escape_into(out: &mut Vec<u8>, s: &str) {
    for c in s.chars() {
        match c {
            '\\' => out.extend_from_slice(b"\\\\"),
            '"' => out.extend_from_slice(b"\\\""),
            '\n' => out.extend_from_slice(b"\\n"),
            '\r' => out.extend_from_slice(b"\\r"),
            '\t' => out.extend_from_slice(b"\\t"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => {
                let mut utf8 = [0; 4];
                out.extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
            }
        }
    }
}
