//! Sink forwarding events to the `tracing` dispatcher
//!
//! Each event becomes one `tracing` event under the `logbridge` target. The
//! projected structure is rendered as JSON into a single `fields` field, since
//! `tracing` field names must be known at compile time. Timestamp and caller
//! go into that JSON under the configured [`FieldNames`].

use std::panic::Location;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::json::{JsonDict, caller_value, delegate_fields, time_value};
use super::{Event, Fields, Sink, SinkLevel};
use crate::config::FieldNames;

/// Target of every forwarded event
pub const TARGET: &str = "logbridge";

macro_rules! emit {
    ($level:expr, $($rest:tt)*) => {
        match $level {
            SinkLevel::Debug => tracing::event!(target: TARGET, tracing::Level::DEBUG, $($rest)*),
            SinkLevel::Info => tracing::event!(target: TARGET, tracing::Level::INFO, $($rest)*),
            SinkLevel::Warn => tracing::event!(target: TARGET, tracing::Level::WARN, $($rest)*),
            SinkLevel::Error => tracing::event!(target: TARGET, tracing::Level::ERROR, $($rest)*),
        }
    };
}

/// Sink backed by whatever `tracing` subscriber is installed
#[derive(Debug, Clone, Default)]
pub struct TracingSink {
    names: Arc<FieldNames>,
}

impl TracingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `names` for the timestamp and caller keys
    pub fn with_field_names(names: FieldNames) -> Self {
        Self {
            names: Arc::new(names),
        }
    }

    pub fn field_names(&self) -> &FieldNames {
        &self.names
    }
}

impl Sink for TracingSink {
    type Event = TracingEvent;

    fn enabled(&self, level: SinkLevel) -> bool {
        match level {
            SinkLevel::Debug => tracing::enabled!(target: TARGET, tracing::Level::DEBUG),
            SinkLevel::Info => tracing::enabled!(target: TARGET, tracing::Level::INFO),
            SinkLevel::Warn => tracing::enabled!(target: TARGET, tracing::Level::WARN),
            SinkLevel::Error => tracing::enabled!(target: TARGET, tracing::Level::ERROR),
        }
    }

    fn event(&self, level: SinkLevel) -> TracingEvent {
        TracingEvent {
            level,
            enabled: self.enabled(level),
            names: Arc::clone(&self.names),
            fields: JsonDict::new(),
        }
    }
}

/// Pending `tracing` event
pub struct TracingEvent {
    level: SinkLevel,
    enabled: bool,
    names: Arc<FieldNames>,
    fields: JsonDict,
}

delegate_fields!(impl<> TracingEvent => fields);

impl TracingEvent {
    fn rendered(&self) -> String {
        Value::Object(self.fields.as_map().clone()).to_string()
    }
}

impl Event for TracingEvent {
    fn enabled(&self) -> bool {
        self.enabled
    }

    fn timestamp(&mut self, time: DateTime<Utc>) {
        self.fields.put(&self.names.time, time_value(time));
    }

    fn caller(&mut self, location: &Location<'_>) {
        self.fields.put(&self.names.caller, caller_value(location));
    }

    fn send(self) {
        if !self.enabled {
            return;
        }
        let fields = self.rendered();
        emit!(self.level, fields = %fields);
    }

    fn msg(self, message: &str) {
        if !self.enabled {
            return;
        }
        let fields = self.rendered();
        emit!(self.level, fields = %fields, "{}", message);
    }
}
