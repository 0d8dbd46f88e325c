//! The `Log` facade applications call.

use std::fmt;
use std::io::Write;
use std::sync::Arc;

use crate::backend::{build_logger, build_writer_logger, Engine};
use crate::config::{Config, OutputTarget};
use crate::error::Result;
use crate::keyvals;
use crate::level::Level;
use crate::logger::{with, Logger, DEFAULT_MESSAGE_KEY};
use crate::std_logger::StdLogger;
use crate::value::{caller, default_timestamp, Context, Value};

/// Leveled logging facade over one decorated [`Logger`].
///
/// Every record carries a `caller` field pointing at the application call
/// site and a `type` field naming the engine; the std engine also gets a
/// `ts` field. Convenience methods never fail: sink errors are dropped, as
/// logging must not add failure paths to application code. Use
/// [`Logger::log`] on a `Log` to observe them.
///
/// `fatal` and friends only log at [`Level::Fatal`]; they never terminate
/// the process.
#[derive(Clone)]
pub struct Log {
    logger: Arc<dyn Logger>,
    msg_key: String,
}

macro_rules! level_methods {
    ($($level:ident => $plain:ident, $formatted:ident, $keyed:ident;)*) => {
        $(
            #[doc = concat!("Log `msg` at ", stringify!($level), " level.")]
            #[track_caller]
            pub fn $plain(&self, msg: impl fmt::Display) {
                self.message(Level::$level, msg);
            }

            #[doc = concat!("Log preformatted arguments at ", stringify!($level), " level; see [`", stringify!($formatted), "!`](crate::", stringify!($formatted), ").")]
            #[track_caller]
            pub fn $formatted(&self, args: fmt::Arguments<'_>) {
                self.message(Level::$level, args);
            }

            #[doc = concat!("Log key-value pairs at ", stringify!($level), " level, without an implicit message.")]
            #[track_caller]
            pub fn $keyed(&self, keyvals: Vec<Value>) {
                let _ = self.emit(Level::$level, keyvals);
            }
        )*
    };
}

impl Log {
    /// Build the facade for `config`.
    ///
    /// Never fails: if the configured engine cannot be built (an unwritable
    /// log directory, say) the problem is reported on stderr and the same
    /// engine is built with console output only.
    pub fn new(config: &Config) -> Log {
        match Log::try_new(config) {
            Ok(log) => log,
            Err(e) => {
                eprintln!(
                    "kvlog: failed to build {} engine ({}); falling back to console output",
                    config.engine, e
                );
                let console = config.clone().with_output(OutputTarget::Console);
                match build_logger(&console) {
                    Ok(logger) => Log::bind(logger, config.engine),
                    Err(_) => Log::bind(Arc::new(StdLogger::stdout(config.level)), Engine::Std),
                }
            }
        }
    }

    /// Like [`Log::new`], but surfaces engine build errors.
    pub fn try_new(config: &Config) -> Result<Log> {
        Ok(Log::bind(build_logger(config)?, config.engine))
    }

    /// Build the engine selected by `config` over `writer` instead of the
    /// configured output target.
    pub fn to_writer(config: &Config, writer: Box<dyn Write + Send>) -> Log {
        Log::bind(build_writer_logger(config, writer), config.engine)
    }

    /// Wrap a custom engine, tagging its records with `type = tag`.
    pub fn from_logger(logger: Arc<dyn Logger>, tag: &str) -> Log {
        Log {
            logger: with(logger, keyvals!["caller", caller(), "type", tag]),
            msg_key: DEFAULT_MESSAGE_KEY.to_string(),
        }
    }

    fn bind(logger: Arc<dyn Logger>, engine: Engine) -> Log {
        let mut provenance = Vec::with_capacity(6);
        if engine == Engine::Std {
            provenance.extend(keyvals!["ts", default_timestamp()]);
        }
        provenance.extend(keyvals!["caller", caller(), "type", engine.as_str()]);
        Log {
            logger: with(logger, provenance),
            msg_key: DEFAULT_MESSAGE_KEY.to_string(),
        }
    }

    /// Store the message of the convenience methods under `key`. Engines
    /// only lift `msg` into the message slot; other keys stay plain fields.
    pub fn with_message_key(mut self, key: impl Into<String>) -> Log {
        self.msg_key = key.into();
        self
    }

    /// A child facade whose records also carry `keyvals`.
    pub fn with(&self, keyvals: Vec<Value>) -> Log {
        Log {
            logger: with(Arc::clone(&self.logger), keyvals),
            msg_key: self.msg_key.clone(),
        }
    }

    /// The decorated logger behind this facade.
    pub fn logger(&self) -> &Arc<dyn Logger> {
        &self.logger
    }

    pub fn message_key(&self) -> &str {
        &self.msg_key
    }

    level_methods! {
        Debug => debug, debugf, debugw;
        Info => info, infof, infow;
        Warn => warn, warnf, warnw;
        Error => error, errorf, errorw;
        Fatal => fatal, fatalf, fatalw;
    }

    #[track_caller]
    pub fn print(&self, msg: impl fmt::Display) {
        self.message(Level::Info, msg);
    }

    #[track_caller]
    pub fn println(&self, msg: impl fmt::Display) {
        self.message(Level::Info, msg);
    }

    #[track_caller]
    pub fn fatalln(&self, msg: impl fmt::Display) {
        self.message(Level::Fatal, msg);
    }

    #[track_caller]
    fn message(&self, level: Level, msg: impl fmt::Display) {
        if !self.logger.enabled(level) {
            return;
        }
        let _ = self.emit(level, keyvals![self.msg_key.as_str(), msg.to_string()]);
    }

    #[track_caller]
    fn emit(&self, level: Level, keyvals: Vec<Value>) -> Result<()> {
        self.logger.log_context(&Context::capture(), level, keyvals)
    }
}

impl Logger for Log {
    fn log_context(&self, ctx: &Context, level: Level, keyvals: Vec<Value>) -> Result<()> {
        self.logger.log_context(ctx, level, keyvals)
    }

    fn enabled(&self, level: Level) -> bool {
        self.logger.enabled(level)
    }

    fn set_level(&self, level: &str) {
        self.logger.set_level(level)
    }

    fn sync(&self) -> Result<()> {
        self.logger.sync()
    }

    fn close(&self) -> Result<()> {
        self.logger.close()
    }
}

/// `debugf!(log, "fmt", args..)` logs at debug level through [`Log::debugf`].
#[macro_export]
macro_rules! debugf {
    ($log:expr, $($arg:tt)+) => {
        $log.debugf(::std::format_args!($($arg)+))
    };
}

/// `infof!(log, "fmt", args..)` logs at info level through [`Log::infof`].
#[macro_export]
macro_rules! infof {
    ($log:expr, $($arg:tt)+) => {
        $log.infof(::std::format_args!($($arg)+))
    };
}

/// `warnf!(log, "fmt", args..)` logs at warn level through [`Log::warnf`].
#[macro_export]
macro_rules! warnf {
    ($log:expr, $($arg:tt)+) => {
        $log.warnf(::std::format_args!($($arg)+))
    };
}

/// `errorf!(log, "fmt", args..)` logs at error level through [`Log::errorf`].
#[macro_export]
macro_rules! errorf {
    ($log:expr, $($arg:tt)+) => {
        $log.errorf(::std::format_args!($($arg)+))
    };
}

/// `fatalf!(log, "fmt", args..)` logs at fatal level through [`Log::fatalf`].
#[macro_export]
macro_rules! fatalf {
    ($log:expr, $($arg:tt)+) => {
        $log.fatalf(::std::format_args!($($arg)+))
    };
}
