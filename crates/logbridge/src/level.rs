//! Front-end severity levels
//!
//! Levels are plain integers so that records can carry severities between
//! the four named ones. Only the named levels map onto a sink.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::sink::SinkLevel;

/// Severity of a log record
///
/// The default is [`Level::INFO`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Level(pub i32);

impl Level {
    pub const DEBUG: Level = Level(-4);
    pub const INFO: Level = Level(0);
    pub const WARN: Level = Level(4);
    pub const ERROR: Level = Level(8);

    /// Map onto one of the four sink severities.
    ///
    /// Returns `None` for any level that is not exactly one of the named
    /// levels.
    pub fn to_sink_level(self) -> Option<SinkLevel> {
        match self {
            Level::DEBUG => Some(SinkLevel::Debug),
            Level::INFO => Some(SinkLevel::Info),
            Level::WARN => Some(SinkLevel::Warn),
            Level::ERROR => Some(SinkLevel::Error),
            _ => None,
        }
    }
}

impl From<SinkLevel> for Level {
    fn from(level: SinkLevel) -> Self {
        match level {
            SinkLevel::Debug => Level::DEBUG,
            SinkLevel::Info => Level::INFO,
            SinkLevel::Warn => Level::WARN,
            SinkLevel::Error => Level::ERROR,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (name, base) = if self.0 < Level::INFO.0 {
            ("DEBUG", Level::DEBUG.0)
        } else if self.0 < Level::WARN.0 {
            ("INFO", Level::INFO.0)
        } else if self.0 < Level::ERROR.0 {
            ("WARN", Level::WARN.0)
        } else {
            ("ERROR", Level::ERROR.0)
        };

        let offset = self.0 - base;
        if offset == 0 {
            write!(f, "{}", name)
        } else {
            write!(f, "{}{:+}", name, offset)
        }
    }
}

/// Error returned when a level name cannot be parsed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown level name: {0}")]
pub struct ParseLevelError(pub String);

impl FromStr for Level {
    type Err = ParseLevelError;

    /// Accepts `debug`, `info`, `warn`/`warning` and `error` in any case,
    /// optionally followed by a signed offset such as `info+2`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        let (name, offset) = match lower.find(['+', '-']) {
            Some(idx) => {
                let offset = lower[idx..]
                    .parse::<i32>()
                    .map_err(|_| ParseLevelError(s.to_string()))?;
                (&lower[..idx], offset)
            }
            None => (lower.as_str(), 0),
        };

        let base = match name {
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" | "warning" => Level::WARN,
            "error" => Level::ERROR,
            _ => return Err(ParseLevelError(s.to_string())),
        };

        base.0
            .checked_add(offset)
            .map(Level)
            .ok_or_else(|| ParseLevelError(s.to_string()))
    }
}

impl Serialize for Level {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Level {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}
