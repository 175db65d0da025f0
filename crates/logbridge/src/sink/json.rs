//! JSON lines sink
//!
//! Every event becomes one JSON object on its own line. Keys keep insertion
//! order: the level first, then timestamp and caller when present, then the
//! projected fields, and the message last.
//!
//! Built-in keys are written around the projected fields rather than into
//! them. A field that shares a built-in name is emitted as a duplicate key
//! and never replaces the level, time, caller or message.
//!
//! ```text
//! {"level":"warn","id":1,"bro":{"bro_id":2},"message":"run"}
//! ```

use std::error::Error;
use std::io::Write;
use std::panic::Location;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

use super::{Event, Fields, Sink, SinkLevel};
use crate::config::FieldNames;
use crate::level::Level;

pub(crate) fn duration_value(d: Duration) -> Value {
    Value::from(d.as_secs_f64() * 1000.0)
}

pub(crate) fn time_value(t: DateTime<Utc>) -> Value {
    Value::String(t.to_rfc3339_opts(SecondsFormat::AutoSi, true))
}

pub(crate) fn caller_value(location: &Location<'_>) -> Value {
    Value::String(format!("{}:{}", location.file(), location.line()))
}

/// Ordered JSON object used for events and nested dictionaries
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JsonDict(Map<String, Value>);

impl JsonDict {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    /// Insert a raw value; an existing key keeps its position.
    pub fn put(&mut self, key: &str, value: Value) {
        self.0.insert(key.to_string(), value);
    }
}

impl Fields for JsonDict {
    type Dict = JsonDict;

    fn new_dict(&self) -> JsonDict {
        JsonDict::new()
    }

    fn bool(&mut self, key: &str, value: bool) {
        self.put(key, Value::Bool(value));
    }

    fn i64(&mut self, key: &str, value: i64) {
        self.put(key, Value::from(value));
    }

    fn u64(&mut self, key: &str, value: u64) {
        self.put(key, Value::from(value));
    }

    fn f64(&mut self, key: &str, value: f64) {
        self.put(key, Value::from(value));
    }

    fn duration(&mut self, key: &str, value: Duration) {
        self.put(key, duration_value(value));
    }

    fn time(&mut self, key: &str, value: DateTime<Utc>) {
        self.put(key, time_value(value));
    }

    fn str(&mut self, key: &str, value: &str) {
        self.put(key, Value::String(value.to_string()));
    }

    fn error(&mut self, key: &str, err: &(dyn Error + Send + Sync)) {
        self.put(key, Value::String(err.to_string()));
    }

    fn any(&mut self, key: &str, value: &Value) {
        self.put(key, value.clone());
    }

    fn dict(&mut self, key: &str, dict: JsonDict) {
        self.put(key, Value::Object(dict.0));
    }
}

/// Implements [`Fields`] for an event type by delegating to a `JsonDict` field.
macro_rules! delegate_fields {
    (impl<$($gen:ident),*> $ty:ty => $field:ident) => {
        impl<$($gen),*> Fields for $ty {
            type Dict = JsonDict;

            fn new_dict(&self) -> JsonDict {
                JsonDict::new()
            }
            fn bool(&mut self, key: &str, value: bool) {
                self.$field.bool(key, value)
            }
            fn i64(&mut self, key: &str, value: i64) {
                self.$field.i64(key, value)
            }
            fn u64(&mut self, key: &str, value: u64) {
                self.$field.u64(key, value)
            }
            fn f64(&mut self, key: &str, value: f64) {
                self.$field.f64(key, value)
            }
            fn duration(&mut self, key: &str, value: std::time::Duration) {
                self.$field.duration(key, value)
            }
            fn time(&mut self, key: &str, value: chrono::DateTime<chrono::Utc>) {
                self.$field.time(key, value)
            }
            fn str(&mut self, key: &str, value: &str) {
                self.$field.str(key, value)
            }
            fn error(&mut self, key: &str, err: &(dyn std::error::Error + Send + Sync)) {
                self.$field.error(key, err)
            }
            fn any(&mut self, key: &str, value: &serde_json::Value) {
                self.$field.any(key, value)
            }
            fn dict(&mut self, key: &str, dict: JsonDict) {
                self.$field.dict(key, dict)
            }
        }
    };
}

pub(crate) use delegate_fields;

struct Inner<W> {
    make_writer: W,
    min_level: Level,
    names: FieldNames,
}

/// Sink writing JSON lines through a [`MakeWriter`]
///
/// Cloning is cheap; clones share the writer.
pub struct JsonSink<W = BoxMakeWriter> {
    inner: Arc<Inner<W>>,
}

impl<W> Clone for JsonSink<W> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl JsonSink<fn() -> std::io::Stdout> {
    /// Sink writing to stdout at [`Level::DEBUG`] and above
    pub fn stdout() -> Self {
        JsonSink::new(std::io::stdout as fn() -> std::io::Stdout)
    }
}

impl JsonSink<fn() -> std::io::Stderr> {
    pub fn stderr() -> Self {
        JsonSink::new(std::io::stderr as fn() -> std::io::Stderr)
    }
}

impl<W> JsonSink<W>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    pub fn new(make_writer: W) -> Self {
        Self::with_options(make_writer, Level::DEBUG, FieldNames::default())
    }

    pub fn with_options(make_writer: W, min_level: Level, names: FieldNames) -> Self {
        Self {
            inner: Arc::new(Inner {
                make_writer,
                min_level,
                names,
            }),
        }
    }

    pub fn min_level(&self) -> Level {
        self.inner.min_level
    }

    pub fn field_names(&self) -> &FieldNames {
        &self.inner.names
    }
}

impl<W> Sink for JsonSink<W>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    type Event = JsonEvent<W>;

    fn enabled(&self, level: SinkLevel) -> bool {
        Level::from(level) >= self.inner.min_level
    }

    fn event(&self, level: SinkLevel) -> JsonEvent<W> {
        let inner = self.enabled(level).then(|| Arc::clone(&self.inner));
        JsonEvent {
            inner,
            level,
            time: None,
            caller: None,
            fields: JsonDict::new(),
        }
    }
}

/// Pending JSON line; a disabled event writes nothing
pub struct JsonEvent<W> {
    inner: Option<Arc<Inner<W>>>,
    level: SinkLevel,
    time: Option<Value>,
    caller: Option<Value>,
    fields: JsonDict,
}

delegate_fields!(impl<W> JsonEvent<W> => fields);

fn push_entry(line: &mut Vec<u8>, key: &str, value: &Value) -> serde_json::Result<()> {
    if line.len() > 1 {
        line.push(b',');
    }
    serde_json::to_writer(&mut *line, key)?;
    line.push(b':');
    serde_json::to_writer(&mut *line, value)
}

impl<W> JsonEvent<W>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    fn render(&self, names: &FieldNames, message: Option<&str>) -> serde_json::Result<Vec<u8>> {
        let mut line = Vec::with_capacity(128);
        line.push(b'{');

        push_entry(&mut line, &names.level, &Value::from(self.level.as_str()))?;
        if let Some(time) = &self.time {
            push_entry(&mut line, &names.time, time)?;
        }
        if let Some(caller) = &self.caller {
            push_entry(&mut line, &names.caller, caller)?;
        }
        for (key, value) in self.fields.as_map() {
            push_entry(&mut line, key, value)?;
        }
        if let Some(message) = message {
            push_entry(&mut line, &names.message, &Value::from(message))?;
        }

        line.extend_from_slice(b"}\n");
        Ok(line)
    }

    fn write(self, message: Option<&str>) {
        let Some(inner) = &self.inner else {
            return;
        };

        let line = match self.render(&inner.names, message) {
            Ok(line) => line,
            Err(e) => {
                eprintln!("logbridge: could not serialize event: {}", e);
                return;
            }
        };

        let mut writer = inner.make_writer.make_writer();
        if let Err(e) = writer.write_all(&line) {
            eprintln!("logbridge: could not write event: {}", e);
        }
    }
}

impl<W> Event for JsonEvent<W>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    fn enabled(&self) -> bool {
        self.inner.is_some()
    }

    fn timestamp(&mut self, time: DateTime<Utc>) {
        if self.inner.is_some() {
            self.time = Some(time_value(time));
        }
    }

    fn caller(&mut self, location: &Location<'_>) {
        if self.inner.is_some() {
            self.caller = Some(caller_value(location));
        }
    }

    fn send(self) {
        self.write(None);
    }

    fn msg(self, message: &str) {
        self.write(Some(message));
    }
}

/// In-memory writer whose clones share one buffer
///
/// Useful for capturing emitted lines, e.g. in tests.
#[derive(Clone, Default)]
pub struct MemoryWriter {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl MemoryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buf.lock()).into_owned()
    }

    /// Every complete line written so far
    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }

    pub fn clear(&self) {
        self.buf.lock().clear();
    }
}

impl Write for MemoryWriter {
    fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
        self.buf.lock().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for MemoryWriter {
    type Writer = MemoryWriter;

    fn make_writer(&'a self) -> MemoryWriter {
        self.clone()
    }
}

impl JsonSink {
    /// Type-erased sink, used when the writer is picked at runtime
    pub fn boxed<W>(make_writer: W, min_level: Level, names: FieldNames) -> Self
    where
        W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    {
        JsonSink::with_options(BoxMakeWriter::new(make_writer), min_level, names)
    }
}
