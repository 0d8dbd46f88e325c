use std::io;

/// Error type returned by the lower-level logging operations.
///
/// The facade convenience methods discard these; only callers of
/// [`Logger::log`](crate::logger::Logger::log) and friends observe them.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("write to log sink failed: {0}")]
    Io(#[from] io::Error),

    #[error("failed to encode log record: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to initialize rolling file appender: {0}")]
    Rotation(#[from] tracing_appender::rolling::InitError),

    #[error("logger is closed")]
    Closed,

    #[error("global logger already initialized")]
    GlobalAlreadySet,

    #[error("a `log` crate logger is already installed: {0}")]
    SetLogger(#[from] log::SetLoggerError),

    #[error("a global tracing dispatcher is already installed: {0}")]
    SetGlobalDefault(#[from] tracing::dispatcher::SetGlobalDefaultError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
