use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::color::{
    level_color, paint_with, stdout_is_terminal, write_json_colored, write_json_key, TIMESTAMP_COLOR,
};
use crate::config::{Config, Format};
use crate::encoder::write_text_value;
use crate::error::{Error, Result};
use crate::level::{AtomicLevel, Level};
use crate::logger::{normalize, Logger, DEFAULT_MESSAGE_KEY};
use crate::pool::{BufferPool, PooledBuffer};
use crate::rotate::open_writer;
use crate::sink::{Route, ERROR_FILE, INFO_FILE};
use crate::value::{bind_values, Context, Value};

/// Key lifted into the line header as the timestamp.
const TIMESTAMP_KEY: &str = "ts";
const LEVEL_KEY: &str = "level";
/// A record's own `level` pair in JSON lines, next to the header one.
const LEVEL_FIELD_KEY: &str = "fields.level";

/// One destination of a [`StdLogger`].
struct Output {
    writer: Mutex<Box<dyn Write + Send>>,
    route: Route,
    color: bool,
}

impl Output {
    fn new(writer: Box<dyn Write + Send>, route: Route, color: bool) -> Self {
        Output {
            writer: Mutex::new(writer),
            route,
            color,
        }
    }
}

/// Plain line logger over stdout, rotating files or any [`Write`] target.
///
/// Text lines look like `[ts] INFO     message key=value`. The `ts` and `msg`
/// entries of a record are lifted into the header; every other pair is
/// appended as `key=value` in call order. With [`Format::Json`] a line is a
/// JSON object holding `level` and then the pairs in call order.
///
/// Each record is assembled in a pooled scratch buffer and written with one
/// `write_all` per output under that output's lock.
pub struct StdLogger {
    outputs: Vec<Output>,
    format: Format,
    pool: BufferPool,
    threshold: AtomicLevel,
    closed: AtomicBool,
}

impl StdLogger {
    /// Uncolored text lines on `writer`.
    pub fn new(writer: Box<dyn Write + Send>, level: Level) -> Self {
        StdLogger::with_outputs(vec![Output::new(writer, Route::All, false)], Format::Text, level)
    }

    /// Standard output, colored when it is a terminal.
    pub fn stdout(level: Level) -> Self {
        StdLogger::with_outputs(vec![stdout_output()], Format::Text, level)
    }

    /// Outputs, format and rotation taken from `config`: `info.log` and
    /// `error.log` for files, stdout for the console.
    ///
    /// **Returns**
    /// - `Err(..)` if the log directory or files cannot be opened.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut outputs = Vec::with_capacity(3);
        if config.output.file() {
            outputs.push(Output::new(open_writer(INFO_FILE, &config.file)?, Route::BelowError, false));
            outputs.push(Output::new(open_writer(ERROR_FILE, &config.file)?, Route::ErrorAndAbove, false));
        }
        if config.output.console() {
            outputs.push(stdout_output());
        }
        Ok(StdLogger::with_outputs(outputs, config.format, config.level))
    }

    fn with_outputs(outputs: Vec<Output>, format: Format, level: Level) -> Self {
        StdLogger {
            outputs,
            format,
            pool: BufferPool::new(),
            threshold: AtomicLevel::new(level),
            closed: AtomicBool::new(false),
        }
    }

    pub fn with_format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    pub fn level(&self) -> Level {
        self.threshold.load()
    }

    fn render(&self, level: Level, keyvals: &[Value], color: bool) -> PooledBuffer<'_> {
        let mut buf = self.pool.acquire();
        match self.format {
            Format::Text => render_text(&mut buf, level, keyvals, color),
            Format::Json => render_json(&mut buf, level, keyvals, color),
        }
        buf.push(b'\n');
        buf
    }
}

fn stdout_output() -> Output {
    Output::new(Box::new(io::stdout()), Route::All, stdout_is_terminal())
}

fn render_text(out: &mut Vec<u8>, level: Level, keyvals: &[Value], color: bool) {
    let lc = level_color(level);
    let mut ts = None;
    let mut msg = None;
    for pair in keyvals.chunks_exact(2) {
        match pair[0].as_str() {
            Some(TIMESTAMP_KEY) => ts = Some(&pair[1]),
            Some(DEFAULT_MESSAGE_KEY) => msg = Some(&pair[1]),
            _ => {}
        }
    }

    if let Some(ts) = ts {
        paint_with(out, TIMESTAMP_COLOR, color, |out| {
            out.push(b'[');
            write_plain(out, ts);
            out.extend_from_slice(b"] ");
        });
    }
    paint_with(out, lc, color, |out| {
        let _ = write!(out, "{:<8}", level.as_upper());
    });
    match msg {
        Some(msg) => {
            out.push(b' ');
            let start = out.len();
            write_plain(out, msg);
            let width = String::from_utf8_lossy(&out[start..]).chars().count();
            out.resize(out.len() + 3usize.saturating_sub(width), b' ');
        }
        None => out.extend_from_slice(b"    "),
    }

    for pair in keyvals.chunks_exact(2) {
        if matches!(pair[0].as_str(), Some(TIMESTAMP_KEY | DEFAULT_MESSAGE_KEY)) {
            continue;
        }
        out.push(b' ');
        paint_with(out, lc, color, |out| write_plain(out, &pair[0]));
        out.push(b'=');
        write_plain(out, &pair[1]);
    }
}

fn render_json(out: &mut Vec<u8>, level: Level, keyvals: &[Value], color: bool) {
    out.push(b'{');
    write_key(out, LEVEL_KEY, color);
    if color {
        paint_with(out, level_color(level), true, |out| {
            let _ = write!(out, "\"{}\"", level.as_str());
        });
    } else {
        let _ = write!(out, "\"{}\"", level.as_str());
    }
    for pair in keyvals.chunks_exact(2) {
        let (Some(key), Value::Concrete(value)) = (pair[0].as_str(), &pair[1]) else {
            continue;
        };
        out.push(b',');
        write_key(out, if key == LEVEL_KEY { LEVEL_FIELD_KEY } else { key }, color);
        if color {
            write_json_colored(out, value);
        } else {
            let _ = serde_json::to_writer(&mut *out, value);
        }
    }
    out.push(b'}');
}

fn write_key(out: &mut Vec<u8>, key: &str, color: bool) {
    if color {
        write_json_key(out, key);
    } else {
        let _ = serde_json::to_writer(&mut *out, key);
        out.push(b':');
    }
}

/// Strings without their JSON quotes, everything else as JSON.
fn write_plain(out: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Concrete(serde_json::Value::String(s)) => out.extend_from_slice(s.as_bytes()),
        Value::Concrete(other) => write_text_value(out, other),
        Value::Deferred(_) => out.extend_from_slice(b"<valuer>"),
    }
}

impl Logger for StdLogger {
    fn log_context(&self, ctx: &Context, level: Level, mut keyvals: Vec<Value>) -> Result<()> {
        if !self.threshold.enabled(level) || keyvals.is_empty() {
            return Ok(());
        }
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::Closed);
        }
        normalize(&mut keyvals);
        bind_values(ctx, &mut keyvals);

        let mut plain = None;
        let mut painted = None;
        let mut first_err = None;
        for output in self.outputs.iter().filter(|o| o.route.accepts(level)) {
            let slot = if output.color { &mut painted } else { &mut plain };
            let line = slot.get_or_insert_with(|| self.render(level, &keyvals, output.color));
            if let Err(e) = output.writer.lock().write_all(line.as_slice()) {
                first_err.get_or_insert(Error::from(e));
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    fn enabled(&self, level: Level) -> bool {
        self.threshold.enabled(level)
    }

    fn set_level(&self, level: &str) {
        self.threshold.set_str(level);
    }

    fn sync(&self) -> Result<()> {
        let mut first_err = None;
        for output in &self.outputs {
            if let Err(e) = output.writer.lock().flush() {
                first_err.get_or_insert(Error::from(e));
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        self.sync()
    }
}
