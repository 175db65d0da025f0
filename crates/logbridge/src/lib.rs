//! Structured logging bridge with nested groups and ambient fields
//!
//! This crate translates a generic structured-logging front end (records with
//! a message and typed attributes, organized into nested groups) into a
//! key-value event sink.
//!
//! # Features
//!
//! - **Immutable handlers**: `with_attrs`/`with_group` derive new handlers
//!   without touching their ancestors, safe to share across threads
//! - **Nested groups**: open groups become nested dictionaries; empty groups
//!   are left out and unnamed groups are inlined
//! - **Ambient fields**: attributes carried by a [`Context`] are injected into
//!   every record logged with it
//! - **Sinks**: JSON lines ([`JsonSink`]) or the `tracing` dispatcher
//!   ([`TracingSink`])
//!
//! # Quick Start
//!
//! ```ignore
//! use logbridge::{Attr, LoggerBuilder, LogConfig};
//!
//! let (log, _guard) = LoggerBuilder::new()
//!     .with_config(LogConfig::development())
//!     .build();
//!
//! log.with([Attr::int("id", 1)])
//!     .with_group("bro")
//!     .with([Attr::int("bro_id", 2)])
//!     .warn("run", [Attr::string("who", "forest")]);
//! // {"level":"warn","time":"...","caller":"...","id":1,"bro":{"bro_id":2,"who":"forest"},"message":"run"}
//! ```
//!
//! # Ambient Fields
//!
//! ```ignore
//! use logbridge::{Attr, Context, with_fields};
//!
//! let ctx = with_fields(&Context::background(), [Attr::string("request_id", "r-1")]);
//! log.info_ctx(&ctx, "accepted", Vec::<Attr>::new());
//!
//! // or enter the context for the current thread
//! ctx.scope(|| log.info("accepted", Vec::<Attr>::new()));
//! ```

pub mod attr;
pub mod config;
pub mod context;
pub mod error;
pub mod fields;
pub mod handler;
pub mod level;
pub mod logger;
pub mod record;
pub mod sink;

pub use attr::{AnyValue, Attr, Kind, LogValuer, Value};
pub use config::{FieldNames, FileConfig, HandlerOptions, LogConfig, OutputConfig, RotationStrategy};
pub use context::{Context, ContextGuard};
pub use error::{ConfigError, HandlerError};
pub use fields::{FieldStore, fields_from_context, with_fields};
pub use handler::{GroupHandler, Handler};
pub use level::Level;
pub use logger::Logger;
pub use record::Record;
pub use sink::{Event, Fields, JsonSink, MemoryWriter, Sink, SinkLevel, TracingSink};

use std::fs::{self, File};

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

/// Builder for a [`Logger`] writing JSON lines
///
/// The builder only wires a [`GroupHandler`] over a [`JsonSink`]; it does not
/// touch any global state.
pub struct LoggerBuilder {
    config: LogConfig,
}

impl LoggerBuilder {
    /// Create a new builder with default configuration
    ///
    /// Default: info level, JSON lines on stdout
    pub fn new() -> Self {
        Self {
            config: LogConfig::default(),
        }
    }

    /// Use a specific configuration
    pub fn with_config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the minimum level written by the sink
    pub fn with_level(mut self, level: Level) -> Self {
        self.config.level = level;
        self
    }

    /// Set the minimum level from a name such as `"debug"` or `"warn"`
    pub fn with_level_name(mut self, level: &str) -> Result<Self, ConfigError> {
        self.config.level = level.parse()?;
        Ok(self)
    }

    /// Skip record timestamps
    pub fn with_skip_time(mut self, skip_time: bool) -> Self {
        self.config.handler.skip_time = skip_time;
        self
    }

    /// Set the output destination
    pub fn with_output(mut self, output: OutputConfig) -> Self {
        self.config.output = output;
        self
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Build the logger.
    ///
    /// File output goes through a non-blocking writer; the returned guard
    /// must be kept alive for buffered lines to be flushed.
    pub fn try_build(self) -> Result<(Logger, Option<WorkerGuard>), ConfigError> {
        let LogConfig {
            level,
            handler,
            output,
            field_names,
        } = self.config;

        let (sink, guard) = match output {
            OutputConfig::Stdout => (JsonSink::boxed(std::io::stdout, level, field_names), None),
            OutputConfig::Stderr => (JsonSink::boxed(std::io::stderr, level, field_names), None),
            OutputConfig::File(file_config) => {
                let (writer, guard) = create_file_writer(&file_config)?;
                (JsonSink::boxed(writer, level, field_names), Some(guard))
            }
        };

        Ok((Logger::new(GroupHandler::new(sink, handler)), guard))
    }

    /// Build the logger, falling back to stderr if the file output cannot be
    /// opened.
    pub fn build(self) -> (Logger, Option<WorkerGuard>) {
        let fallback = LogConfig {
            output: OutputConfig::Stderr,
            ..self.config.clone()
        };

        match self.try_build() {
            Ok(built) => built,
            Err(e) => {
                eprintln!("Warning: Failed to open log output, using stderr: {}", e);
                let handler = GroupHandler::new(
                    JsonSink::boxed(std::io::stderr, fallback.level, fallback.field_names),
                    fallback.handler,
                );
                (Logger::new(handler), None)
            }
        }
    }
}

impl Default for LoggerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// Never creates (or truncates) a single file; the others append through a rolling appender.
fn create_file_writer(file_config: &FileConfig) -> Result<(NonBlocking, WorkerGuard), ConfigError> {
    let rotation = match file_config.rotation {
        RotationStrategy::Never => {
            fs::create_dir_all(&file_config.directory)?;
            let file_path = file_config
                .directory
                .join(format!("{}.log", file_config.prefix));
            let file = File::create(&file_path)?;
            return Ok(tracing_appender::non_blocking(file));
        }
        RotationStrategy::Daily => Rotation::DAILY,
        RotationStrategy::Hourly => Rotation::HOURLY,
    };

    let appender = RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(&file_config.prefix)
        .build(&file_config.directory)?;

    Ok(tracing_appender::non_blocking(appender))
}

/// Logger over the `tracing` dispatcher
pub fn tracing_logger(opts: HandlerOptions) -> Logger {
    Logger::new(GroupHandler::new(TracingSink::new(), opts))
}

/// Install a JSON `tracing` subscriber for use with [`tracing_logger`]
///
/// `RUST_LOG` overrides `default_level`. Returns an error if a global
/// subscriber is already set.
pub fn init_tracing_subscriber(
    default_level: &str,
) -> Result<(), tracing_subscriber::util::TryInitError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    Registry::default()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .flatten_event(true)
                .with_current_span(false),
        )
        .try_init()
}

/// Logger with default settings (JSON lines to stdout)
pub fn default_logger() -> Logger {
    LoggerBuilder::new().build().0
}

/// Logger for testing (warnings only, no timestamps)
pub fn testing_logger() -> Logger {
    LoggerBuilder::new()
        .with_config(LogConfig::testing())
        .build()
        .0
}
