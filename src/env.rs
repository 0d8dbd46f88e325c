//! Environment variable names used by this crate for configuring the
//! facade from a service's environment.
//!
//! Names and lookups live here so the `config` module itself never touches
//! the process environment.

use crate::backend::Engine;
use crate::config::{Config, FileConfig, FileMode, Format, OutputTarget};
use crate::level::Level;

/// Engine name: `tracing`, `log` or `std`.
pub const KVLOG_ENGINE_ENV: &str = "KVLOG_ENGINE";

/// Minimum level, e.g. `info`.
pub const KVLOG_LEVEL_ENV: &str = "KVLOG_LEVEL";

/// Output target: `all`, `file` or `console`.
pub const KVLOG_OUTPUT_ENV: &str = "KVLOG_OUTPUT";

/// Record format: `json` or `text`.
pub const KVLOG_FORMAT_ENV: &str = "KVLOG_FORMAT";

/// File rotation mode: `size` or `date`.
pub const KVLOG_FILE_MODE_ENV: &str = "KVLOG_FILE_MODE";

/// Directory for `info.log` / `error.log`.
pub const KVLOG_FILE_PATH_ENV: &str = "KVLOG_FILE_PATH";

/// Days to keep rotated files.
pub const KVLOG_FILE_MAX_AGE_ENV: &str = "KVLOG_FILE_MAX_AGE";

/// Size bound of a single file in MB.
pub const KVLOG_FILE_SIZE_ENV: &str = "KVLOG_FILE_SIZE";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_i64(key: &str, default: i64) -> i64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Build a configuration from the `KVLOG_*` variables.
    ///
    /// Missing or malformed variables resolve exactly as they would in a
    /// configuration file: to the documented defaults.
    pub fn from_env() -> Config {
        let file_defaults = FileConfig::default();
        Config {
            engine: Engine::parse(&env_or(KVLOG_ENGINE_ENV, "")),
            output: OutputTarget::parse(&env_or(KVLOG_OUTPUT_ENV, "")),
            level: Level::parse(&env_or(KVLOG_LEVEL_ENV, "")),
            format: Format::parse(&env_or(KVLOG_FORMAT_ENV, "")),
            file: FileConfig {
                mode: FileMode::parse(&env_or(KVLOG_FILE_MODE_ENV, "")),
                path: env_or(KVLOG_FILE_PATH_ENV, &file_defaults.path),
                max_age: env_i64(KVLOG_FILE_MAX_AGE_ENV, file_defaults.max_age),
                size: env_i64(KVLOG_FILE_SIZE_ENV, file_defaults.size),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_or_falls_back() {
        assert_eq!(env_or("KVLOG_TEST_SURELY_UNSET_VARIABLE", "fallback"), "fallback");
    }

    #[test]
    fn env_i64_ignores_garbage() {
        assert_eq!(env_i64("KVLOG_TEST_SURELY_UNSET_NUMBER", 7), 7);
    }
}
