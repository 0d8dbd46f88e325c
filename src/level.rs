use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Deserializer};

/// Severity of a log record, ordered from least to most severe.
///
/// Every engine maps this onto its own native severity, but filtering is
/// always decided on this type so the ordering holds for all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(u8)]
pub enum Level {
    Debug = 0,
    Info = 1,
    /// Safe default for unset or unparseable levels.
    #[default]
    Warn = 2,
    Error = 3,
    Fatal = 4,
}

impl Level {
    pub const ALL: [Level; 5] = [Level::Debug, Level::Info, Level::Warn, Level::Error, Level::Fatal];

    /// Parse a configured level, falling back to [`Level::Warn`].
    ///
    /// Matching is case-insensitive. `"panic"` is accepted and treated as
    /// [`Level::Fatal`], the most severe level modelled here.
    pub fn parse(s: &str) -> Level {
        s.parse().unwrap_or_default()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Fatal => "fatal",
        }
    }

    /// Upper-case marker used by the text renderers.
    pub fn as_upper(self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Fatal => "FATAL",
        }
    }

    fn from_u8(v: u8) -> Level {
        match v {
            0 => Level::Debug,
            1 => Level::Info,
            2 => Level::Warn,
            3 => Level::Error,
            _ => Level::Fatal,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Error returned by the strict [`FromStr`] implementation of [`Level`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown log level {0:?}")]
pub struct ParseLevelError(pub String);

impl FromStr for Level {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(Level::Debug),
            "info" => Ok(Level::Info),
            "warn" | "warning" => Ok(Level::Warn),
            "error" => Ok(Level::Error),
            "fatal" | "panic" => Ok(Level::Fatal),
            _ => Err(ParseLevelError(s.to_string())),
        }
    }
}

impl<'de> Deserialize<'de> for Level {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Level::parse(&raw))
    }
}

impl serde::Serialize for Level {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Minimum-level threshold shared between an adapter and its pipeline.
///
/// Loads and stores are relaxed: a concurrent `store` may or may not be
/// observed by calls already in flight.
#[derive(Debug)]
pub struct AtomicLevel(AtomicU8);

impl AtomicLevel {
    pub fn new(level: Level) -> Self {
        AtomicLevel(AtomicU8::new(level as u8))
    }

    pub fn load(&self) -> Level {
        Level::from_u8(self.0.load(Ordering::Relaxed))
    }

    pub fn store(&self, level: Level) {
        self.0.store(level as u8, Ordering::Relaxed);
    }

    /// Store a level given by name; unknown names store [`Level::Warn`].
    pub fn set_str(&self, level: &str) {
        self.store(Level::parse(level));
    }

    pub fn enabled(&self, level: Level) -> bool {
        level >= self.load()
    }
}

impl Default for AtomicLevel {
    fn default() -> Self {
        AtomicLevel::new(Level::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_are_ordered_by_severity() {
        assert!(Level::Debug < Level::Info);
        assert!(Level::Info < Level::Warn);
        assert!(Level::Warn < Level::Error);
        assert!(Level::Error < Level::Fatal);
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(Level::parse("DEBUG"), Level::Debug);
        assert_eq!(Level::parse(" Info "), Level::Info);
        assert_eq!(Level::parse("Error"), Level::Error);
        assert_eq!(Level::parse("panic"), Level::Fatal);
    }

    #[test]
    fn unknown_level_falls_back_to_warn() {
        assert_eq!(Level::parse("verbose"), Level::Warn);
        assert_eq!(Level::parse(""), Level::Warn);
        assert!("verbose".parse::<Level>().is_err());
    }

    #[test]
    fn names_round_trip() {
        for level in Level::ALL {
            assert_eq!(Level::parse(level.as_str()), level);
            assert_eq!(Level::parse(level.as_upper()), level);
        }
    }

    #[test]
    fn atomic_level_filters() {
        let threshold = AtomicLevel::new(Level::Info);
        assert!(!threshold.enabled(Level::Debug));
        assert!(threshold.enabled(Level::Info));
        assert!(threshold.enabled(Level::Fatal));

        threshold.set_str("invalid");
        assert_eq!(threshold.load(), Level::Warn);
        assert!(!threshold.enabled(Level::Info));
    }

    #[test]
    fn deserializes_leniently() {
        let level: Level = serde_json::from_str("\"INFO\"").unwrap();
        assert_eq!(level, Level::Info);
        let level: Level = serde_json::from_str("\"nonsense\"").unwrap();
        assert_eq!(level, Level::Warn);
    }
}
