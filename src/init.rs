use std::sync::OnceLock;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::facade::Log;

static GLOBAL: OnceLock<Log> = OnceLock::new();

/// Install `log` as the process-wide facade returned by [`global`].
///
/// **Returns**
/// - `Err(Error::GlobalAlreadySet)` if a facade was installed before, or
///   [`global`] already fell back to the default one.
///
/// **Effects**
///
/// Only affects [`global`]. Instances built with [`Log::new`] stay fully
/// independent, so tests can keep constructing isolated loggers.
pub fn init_global(log: Log) -> Result<()> {
    GLOBAL.set(log).map_err(|_| Error::GlobalAlreadySet)
}

/// Build the facade from `config` and install it globally.
pub fn init_from_config(config: &Config) -> Result<()> {
    init_global(Log::new(config))
}

/// Build the facade from the `KVLOG_*` environment variables and install it
/// globally. See [`Config::from_env`].
pub fn init_from_env() -> Result<()> {
    init_from_config(&Config::from_env())
}

/// The process-wide facade.
///
/// Falls back to `Log::new(&Config::default())` (tracing engine, console,
/// warn level) when nothing was installed before the first call.
pub fn global() -> &'static Log {
    GLOBAL.get_or_init(|| Log::new(&Config::default()))
}
