use std::fmt;
use std::io::Write;
use std::sync::Arc;

use serde::Deserialize;

use crate::config::Config;
use crate::encoder::Encoding;
use crate::error::Result;
use crate::log_logger::LogCrateLogger;
use crate::logger::Logger;
use crate::sink::WriterSink;
use crate::std_logger::StdLogger;
use crate::tracing_logger::TracingLogger;

/// Engine kinds that can be selected via config or `KVLOG_ENGINE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(from = "String")]
pub enum Engine {
    /// Structured engine on a private `tracing` dispatcher.
    #[default]
    Tracing,
    /// Hook-style engine on the `log` crate.
    Log,
    /// Plain line writer on standard output.
    Std,
}

impl Engine {
    /// Infer the engine from its configured name.
    ///
    /// Examples:
    /// - "tracing", "zap" -> [`Engine::Tracing`]
    /// - "log", "logrus" -> [`Engine::Log`]
    /// - "std" -> [`Engine::Std`]
    ///
    /// Anything else, the empty string included, selects the default
    /// [`Engine::Tracing`].
    pub fn parse(s: &str) -> Engine {
        match s.trim().to_ascii_lowercase().as_str() {
            "log" | "logrus" => Engine::Log,
            "std" => Engine::Std,
            _ => Engine::Tracing,
        }
    }

    /// Value of the `type` field the facade binds to every record.
    pub fn as_str(self) -> &'static str {
        match self {
            Engine::Tracing => "tracing",
            Engine::Log => "log",
            Engine::Std => "std",
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Engine {
    fn from(s: String) -> Self {
        Engine::parse(&s)
    }
}

/// Create the engine selected by `config.engine`.
///
/// This is the main entry point for code that wants a bare [`Logger`]
/// without the facade's bound provenance fields.
///
/// **Returns**
/// - `Err(..)` if the configured log directory or files cannot be opened.
pub fn build_logger(config: &Config) -> Result<Arc<dyn Logger>> {
    let logger: Arc<dyn Logger> = match config.engine {
        Engine::Tracing => Arc::new(TracingLogger::new(config)?),
        Engine::Log => Arc::new(LogCrateLogger::new(config)?),
        Engine::Std => Arc::new(StdLogger::from_config(config)?),
    };
    Ok(logger)
}

/// Create the engine selected by `config.engine`, writing every record to
/// `writer` instead of the configured output target. Never colored.
pub fn build_writer_logger(config: &Config, writer: Box<dyn Write + Send>) -> Arc<dyn Logger> {
    let encoding = Encoding::from(config.format);
    match config.engine {
        Engine::Tracing => Arc::new(TracingLogger::with_sinks(
            config.level,
            vec![Arc::new(WriterSink::new(writer, encoding))],
        )),
        Engine::Log => Arc::new(LogCrateLogger::with_sinks(
            config.level,
            vec![Arc::new(WriterSink::new(writer, encoding))],
        )),
        Engine::Std => Arc::new(StdLogger::new(writer, config.level).with_format(config.format)),
    }
}
