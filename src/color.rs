//! Console coloring helpers.
//!
//! Colors are only ever requested for sinks attached to an interactive
//! terminal; files and pipes always get plain bytes.

use std::io::{IsTerminal, Write};

use colored::Color;

use crate::level::Level;

pub const PREFIX_COLOR: Color = Color::Cyan;
pub const TIMESTAMP_COLOR: Color = Color::BrightBlack;

const RESET: &[u8] = b"\x1b[0m";

pub fn level_color(level: Level) -> Color {
    match level {
        Level::Debug => Color::Blue,
        Level::Info => Color::Green,
        Level::Warn => Color::Yellow,
        Level::Error | Level::Fatal => Color::Red,
    }
}

pub fn stdout_is_terminal() -> bool {
    std::io::stdout().is_terminal()
}

/// Run `body` against `out`, wrapped in the `color` escape sequence when
/// `enabled` and coloring is not globally switched off.
pub fn paint_with(out: &mut Vec<u8>, color: Color, enabled: bool, body: impl FnOnce(&mut Vec<u8>)) {
    let enabled = enabled && colored::control::SHOULD_COLORIZE.should_colorize();
    if enabled {
        let _ = write!(out, "\x1b[{}m", color.to_fg_str());
    }
    body(out);
    if enabled {
        out.extend_from_slice(RESET);
    }
}

/// Append `s` to `out`, wrapped in `color` when `enabled`.
pub fn paint(out: &mut Vec<u8>, s: &str, color: Color, enabled: bool) {
    paint_with(out, color, enabled, |out| out.extend_from_slice(s.as_bytes()));
}

/// Render `value` as single-line JSON with colored keys and scalars.
pub fn write_json_colored(out: &mut Vec<u8>, value: &serde_json::Value) {
    match value {
        serde_json::Value::Null => paint(out, "null", Color::BrightBlack, true),
        serde_json::Value::Bool(b) => paint(out, if *b { "true" } else { "false" }, Color::Yellow, true),
        serde_json::Value::Number(n) => paint_with(out, Color::Cyan, true, |out| {
            let _ = write!(out, "{}", n);
        }),
        serde_json::Value::String(s) => write_json_string(out, s, Color::Green),
        serde_json::Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_json_colored(out, item);
            }
            out.push(b']');
        }
        serde_json::Value::Object(map) => {
            out.push(b'{');
            for (i, (key, item)) in map.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_json_key(out, key);
                write_json_colored(out, item);
            }
            out.push(b'}');
        }
    }
}

/// `"key":` with the key colored.
pub fn write_json_key(out: &mut Vec<u8>, key: &str) {
    write_json_string(out, key, Color::Blue);
    out.push(b':');
}

pub fn write_json_string(out: &mut Vec<u8>, s: &str, color: Color) {
    paint_with(out, color, true, |out| {
        let _ = serde_json::to_writer(&mut *out, s);
    });
}
