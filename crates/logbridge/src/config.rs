//! Configuration types for the bridge and its JSON sink

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::level::Level;

/// Options fixed when a handler chain is created
///
/// Every handler derived from the root inherits these unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandlerOptions {
    /// Do not emit the record timestamp even when one is present
    pub skip_time: bool,
}

/// Key names used by the JSON sink for its built-in fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldNames {
    pub level: String,
    pub time: String,
    pub message: String,
    pub caller: String,
}

impl Default for FieldNames {
    fn default() -> Self {
        Self {
            level: "level".to_string(),
            time: "time".to_string(),
            message: "message".to_string(),
            caller: "caller".to_string(),
        }
    }
}

/// Main logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Minimum level written by the sink
    pub level: Level,

    /// Handler options
    pub handler: HandlerOptions,

    /// Where JSON lines go
    pub output: OutputConfig,

    /// Names of the sink's built-in fields
    pub field_names: FieldNames,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            handler: HandlerOptions::default(),
            output: OutputConfig::Stdout,
            field_names: FieldNames::default(),
        }
    }
}

impl LogConfig {
    /// Create a config for development (verbose, on stderr)
    pub fn development() -> Self {
        Self {
            level: Level::DEBUG,
            output: OutputConfig::Stderr,
            ..Default::default()
        }
    }

    /// Create a config for production (daily rotated files)
    pub fn production(log_dir: PathBuf) -> Self {
        Self {
            level: Level::INFO,
            output: OutputConfig::File(FileConfig {
                directory: log_dir,
                ..FileConfig::default()
            }),
            ..Default::default()
        }
    }

    /// Create a config for testing (warnings only, no timestamps)
    pub fn testing() -> Self {
        Self {
            level: Level::WARN,
            handler: HandlerOptions { skip_time: true },
            ..Default::default()
        }
    }
}

/// Output destination
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputConfig {
    #[default]
    Stdout,
    Stderr,
    File(FileConfig),
}

/// File output configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Directory for log files
    pub directory: PathBuf,
    /// File name prefix
    pub prefix: String,
    /// Rotation strategy
    pub rotation: RotationStrategy,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./logs"),
            prefix: "logbridge".to_string(),
            rotation: RotationStrategy::Daily,
        }
    }
}

/// File rotation strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RotationStrategy {
    /// Rotate daily
    #[default]
    Daily,
    /// Rotate hourly
    Hourly,
    /// Never rotate (single file)
    Never,
}
