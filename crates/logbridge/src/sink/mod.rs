//! Sink contract consumed by the handler
//!
//! A [`Sink`] hands out level-gated [`Event`] builders. Events and the nested
//! dictionaries they open share the typed setters of [`Fields`].

use std::error::Error;
use std::fmt;
use std::panic::Location;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod json;
pub mod tracing_sink;

pub use json::{JsonDict, JsonEvent, JsonSink, MemoryWriter};
pub use tracing_sink::{TracingEvent, TracingSink};

/// The four severities a sink understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl SinkLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SinkLevel::Debug => "debug",
            SinkLevel::Info => "info",
            SinkLevel::Warn => "warn",
            SinkLevel::Error => "error",
        }
    }
}

impl fmt::Display for SinkLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed field setters shared by events and nested dictionaries
pub trait Fields {
    /// Nested dictionary type opened by [`Fields::new_dict`]
    type Dict: Fields<Dict = Self::Dict>;

    fn new_dict(&self) -> Self::Dict;

    fn bool(&mut self, key: &str, value: bool);
    fn i64(&mut self, key: &str, value: i64);
    fn u64(&mut self, key: &str, value: u64);
    fn f64(&mut self, key: &str, value: f64);
    fn duration(&mut self, key: &str, value: Duration);
    fn time(&mut self, key: &str, value: DateTime<Utc>);
    fn str(&mut self, key: &str, value: &str);
    fn error(&mut self, key: &str, err: &(dyn Error + Send + Sync));
    fn any(&mut self, key: &str, value: &serde_json::Value);

    /// Attach a nested dictionary under `key`.
    fn dict(&mut self, key: &str, dict: Self::Dict);
}

/// A single pending log event
pub trait Event: Fields + Sized {
    /// Whether this event will be written at all
    fn enabled(&self) -> bool;

    fn timestamp(&mut self, time: DateTime<Utc>);

    fn caller(&mut self, location: &Location<'_>);

    /// Emit without a message field.
    fn send(self);

    /// Emit with `message`.
    fn msg(self, message: &str);
}

/// The logging backend
pub trait Sink: Send + Sync {
    type Event: Event;

    fn enabled(&self, level: SinkLevel) -> bool;

    /// Start an event at `level`; the event reports whether it is enabled.
    fn event(&self, level: SinkLevel) -> Self::Event;
}
