use std::io::{self, Write};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::color::stdout_is_terminal;
use crate::config::{Config, FileConfig};
use crate::encoder::Encoding;
use crate::error::Result;
use crate::level::Level;
use crate::pool::BufferPool;
use crate::record::LogRecord;
use crate::rotate::open_writer;

/// File receiving records below [`Level::Error`].
pub const INFO_FILE: &str = "info.log";
/// File receiving [`Level::Error`] and above.
pub const ERROR_FILE: &str = "error.log";

/// Destination for [`LogRecord`]s produced by an engine.
///
/// Implementations are responsible for encoding records and transporting
/// them to a concrete output (terminal, rotating file, memory). Engines call
/// `send` synchronously on the logging thread, possibly from many threads
/// at once.
pub trait LogSink: Send + Sync {
    /// Whether this sink wants records of `level` at all.
    fn accepts(&self, _level: Level) -> bool {
        true
    }

    /// Write a single record.
    ///
    /// **Returns**
    /// - `Ok(())` if the record was handed to the output.
    /// - `Err(..)` on encoding or I/O failure. The engine surfaces it to the
    ///   caller of `log`; the record is not retried.
    fn send(&self, record: &LogRecord) -> Result<()>;

    /// Flush any buffered output. Default implementation is a no-op.
    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// Level range a sink accepts; splits file output into `info.log` and
/// `error.log`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    All,
    BelowError,
    ErrorAndAbove,
}

impl Route {
    pub fn accepts(self, level: Level) -> bool {
        match self {
            Route::All => true,
            Route::BelowError => level < Level::Error,
            Route::ErrorAndAbove => level >= Level::Error,
        }
    }
}

/// Sink encoding records onto any [`Write`] target.
///
/// A record is encoded into a pooled scratch buffer first and written with a
/// single `write_all` under the writer lock, so concurrent records never
/// interleave.
pub struct WriterSink {
    encoding: Encoding,
    color: bool,
    route: Route,
    writer: Mutex<Box<dyn Write + Send>>,
    pool: BufferPool,
}

impl WriterSink {
    pub fn new(writer: Box<dyn Write + Send>, encoding: Encoding) -> Self {
        WriterSink {
            encoding,
            color: false,
            route: Route::All,
            writer: Mutex::new(writer),
            pool: BufferPool::new(),
        }
    }

    /// Standard output, colored when it is a terminal.
    pub fn stdout(encoding: Encoding) -> Self {
        WriterSink::new(Box::new(io::stdout()), encoding).with_color(stdout_is_terminal())
    }

    /// Rotating file `file_name` under `cfg`'s directory. Never colored.
    pub fn file(file_name: &str, cfg: &FileConfig, encoding: Encoding, route: Route) -> Result<Self> {
        Ok(WriterSink::new(open_writer(file_name, cfg)?, encoding).with_route(route))
    }

    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    pub fn with_route(mut self, route: Route) -> Self {
        self.route = route;
        self
    }
}

impl LogSink for WriterSink {
    fn accepts(&self, level: Level) -> bool {
        self.route.accepts(level)
    }

    fn send(&self, record: &LogRecord) -> Result<()> {
        let mut buf = self.pool.acquire();
        self.encoding.encode(record, self.color, &mut buf)?;
        self.writer.lock().write_all(&buf)?;
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        self.writer.lock().flush()?;
        Ok(())
    }
}

/// Build the sinks selected by `config.output`: stdout for the console,
/// `info.log` (below error) and `error.log` (error and above) for files.
pub fn build_sinks(config: &Config) -> Result<Vec<Arc<dyn LogSink>>> {
    let encoding = Encoding::from(config.format);
    let mut sinks: Vec<Arc<dyn LogSink>> = Vec::new();
    if config.output.file() {
        sinks.push(Arc::new(WriterSink::file(INFO_FILE, &config.file, encoding, Route::BelowError)?));
        sinks.push(Arc::new(WriterSink::file(ERROR_FILE, &config.file, encoding, Route::ErrorAndAbove)?));
    }
    if config.output.console() {
        sinks.push(Arc::new(WriterSink::stdout(encoding)));
    }
    Ok(sinks)
}

/// Send `record` to every sink accepting its level.
///
/// All sinks are attempted; the first error is returned.
pub fn fan_out(sinks: &[Arc<dyn LogSink>], record: &LogRecord) -> Result<()> {
    let mut first_err = None;
    for sink in sinks.iter().filter(|s| s.accepts(record.level)) {
        if let Err(e) = sink.send(record) {
            first_err.get_or_insert(e);
        }
    }
    first_err.map_or(Ok(()), Err)
}

pub fn flush_all(sinks: &[Arc<dyn LogSink>]) -> Result<()> {
    let mut first_err = None;
    for sink in sinks {
        if let Err(e) = sink.flush() {
            first_err.get_or_insert(e);
        }
    }
    first_err.map_or(Ok(()), Err)
}

/// Cloneable in-memory [`Write`] target.
///
/// Useful for tests and for embedding the log output elsewhere.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn new() -> Self {
        SharedBuffer::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }

    pub fn clear(&self) {
        self.0.lock().clear();
    }

    /// A sink writing into this buffer, never colored.
    pub fn sink(&self, encoding: Encoding) -> Arc<dyn LogSink> {
        Arc::new(WriterSink::new(Box::new(self.clone()), encoding))
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
