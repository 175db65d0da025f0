//! Log records produced by the front end

use std::panic::Location;

use chrono::{DateTime, FixedOffset, Utc};

use crate::attr::Attr;
use crate::level::Level;

/// A single log call
///
/// Timestamp and caller location are optional; a record without them is
/// emitted without the corresponding sink fields.
#[derive(Debug, Clone)]
pub struct Record {
    pub time: Option<DateTime<FixedOffset>>,
    pub level: Level,
    pub message: String,
    pub caller: Option<&'static Location<'static>>,
    attrs: Vec<Attr>,
}

impl Record {
    /// Create a record stamped with the current time and no caller.
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            time: Some(Utc::now().fixed_offset()),
            level,
            message: message.into(),
            caller: None,
            attrs: Vec::new(),
        }
    }

    pub fn with_time(mut self, time: Option<DateTime<FixedOffset>>) -> Self {
        self.time = time;
        self
    }

    pub fn with_caller(mut self, caller: Option<&'static Location<'static>>) -> Self {
        self.caller = caller;
        self
    }

    /// Append attributes to the record.
    pub fn add_attrs(&mut self, attrs: impl IntoIterator<Item = Attr>) {
        self.attrs.extend(attrs);
    }

    pub fn with_attrs(mut self, attrs: impl IntoIterator<Item = Attr>) -> Self {
        self.add_attrs(attrs);
        self
    }

    pub fn num_attrs(&self) -> usize {
        self.attrs.len()
    }

    /// Iterate the record's own top-level attributes.
    pub fn attrs(&self) -> impl Iterator<Item = &Attr> {
        self.attrs.iter()
    }
}
