use std::path::PathBuf;

use serde::Deserialize;

use crate::backend::Engine;
use crate::level::Level;

pub const DEFAULT_FILE_PATH: &str = "./logs";
pub const DEFAULT_MAX_AGE_DAYS: i64 = 90;
pub const DEFAULT_SIZE_MB: i64 = 30;

/// Facade configuration.
///
/// Every field deserializes leniently: unknown names resolve to the
/// documented default instead of failing, so a bad logging section never
/// stops the host from starting.
///
/// ```yaml
/// log:
///   engine: tracing   # tracing (default), log, std
///   output: all       # all, file, console (default)
///   level: info       # debug, info, warn (default), error, fatal, panic
///   format: json      # json, text (default)
///   file:
///     mode: date      # size (default), date
///     path: ./logs
///     max_age: 90     # days
///     size: 30        # MB
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub engine: Engine,
    #[serde(alias = "both", alias = "output_target")]
    pub output: OutputTarget,
    pub level: Level,
    pub format: Format,
    pub file: FileConfig,
}

impl Config {
    pub fn new(engine: Engine) -> Self {
        Config {
            engine,
            ..Config::default()
        }
    }

    pub fn with_level(mut self, level: &str) -> Self {
        self.level = Level::parse(level);
        self
    }

    pub fn with_output(mut self, output: OutputTarget) -> Self {
        self.output = output;
        self
    }

    pub fn with_format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    pub fn with_file(mut self, file: FileConfig) -> Self {
        self.file = file;
        self
    }
}

/// Where records go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(from = "String")]
pub enum OutputTarget {
    /// Console and files.
    All,
    File,
    #[default]
    Console,
}

impl OutputTarget {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" | "both" => OutputTarget::All,
            "file" => OutputTarget::File,
            _ => OutputTarget::Console,
        }
    }

    pub fn console(self) -> bool {
        matches!(self, OutputTarget::All | OutputTarget::Console)
    }

    pub fn file(self) -> bool {
        matches!(self, OutputTarget::All | OutputTarget::File)
    }
}

impl From<String> for OutputTarget {
    fn from(s: String) -> Self {
        OutputTarget::parse(&s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(from = "String")]
pub enum Format {
    Json,
    #[default]
    Text,
}

impl Format {
    pub fn parse(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("json") {
            Format::Json
        } else {
            Format::Text
        }
    }
}

impl From<String> for Format {
    fn from(s: String) -> Self {
        Format::parse(&s)
    }
}

/// File rotation policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(from = "String")]
pub enum FileMode {
    /// Rotate when the file reaches `size` MB.
    #[default]
    Size,
    /// Rotate once per calendar day.
    Date,
}

impl FileMode {
    pub fn parse(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("date") {
            FileMode::Date
        } else {
            FileMode::Size
        }
    }
}

impl From<String> for FileMode {
    fn from(s: String) -> Self {
        FileMode::parse(&s)
    }
}

/// Rotation bounds for file output. Non-positive numbers and an empty path
/// fall back to the defaults (`./logs`, 90 days, 30 MB).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub mode: FileMode,
    pub path: String,
    pub max_age: i64,
    pub size: i64,
}

impl Default for FileConfig {
    fn default() -> Self {
        FileConfig {
            mode: FileMode::Size,
            path: DEFAULT_FILE_PATH.to_string(),
            max_age: DEFAULT_MAX_AGE_DAYS,
            size: DEFAULT_SIZE_MB,
        }
    }
}

impl FileConfig {
    pub fn dir(&self) -> PathBuf {
        if self.path.trim().is_empty() {
            PathBuf::from(DEFAULT_FILE_PATH)
        } else {
            PathBuf::from(&self.path)
        }
    }

    pub fn max_age_days(&self) -> u64 {
        positive_or(self.max_age, DEFAULT_MAX_AGE_DAYS)
    }

    pub fn size_mb(&self) -> u64 {
        positive_or(self.size, DEFAULT_SIZE_MB)
    }

    pub fn max_bytes(&self) -> u64 {
        self.size_mb() * 1024 * 1024
    }
}

fn positive_or(v: i64, default: i64) -> u64 {
    if v > 0 {
        v as u64
    } else {
        default as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.engine, Engine::Tracing);
        assert_eq!(cfg.output, OutputTarget::Console);
        assert_eq!(cfg.level, Level::Warn);
        assert_eq!(cfg.format, Format::Text);
        assert_eq!(cfg.file.mode, FileMode::Size);
    }

    #[test]
    fn non_positive_bounds_fall_back() {
        let file = FileConfig {
            mode: FileMode::Date,
            path: String::new(),
            max_age: 0,
            size: -5,
        };
        assert_eq!(file.dir(), PathBuf::from("./logs"));
        assert_eq!(file.max_age_days(), 90);
        assert_eq!(file.size_mb(), 30);
        assert_eq!(file.max_bytes(), 30 * 1024 * 1024);
    }

    #[test]
    fn deserializes_leniently() {
        let cfg: Config = serde_json::from_str(
            r#"{"engine":"mystery","both":"all","level":"INFO","format":"JSON","file":{"mode":"date","size":5}}"#,
        )
        .unwrap();
        assert_eq!(cfg.engine, Engine::Tracing);
        assert_eq!(cfg.output, OutputTarget::All);
        assert_eq!(cfg.level, Level::Info);
        assert_eq!(cfg.format, Format::Json);
        assert_eq!(cfg.file.mode, FileMode::Date);
        assert_eq!(cfg.file.size_mb(), 5);
        assert_eq!(cfg.file.max_age_days(), 90);
    }

    #[test]
    fn output_target_routing() {
        assert!(OutputTarget::All.console() && OutputTarget::All.file());
        assert!(!OutputTarget::File.console());
        assert!(!OutputTarget::Console.file());
        assert_eq!(OutputTarget::parse("weird"), OutputTarget::Console);
    }
}
