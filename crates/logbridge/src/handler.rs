//! Group-aware handler and projection engine
//!
//! A [`GroupHandler`] holds an ordered list of open groups, innermost last.
//! The root handler has a single unnamed group; [`GroupHandler::with_group`]
//! opens named groups and [`GroupHandler::with_attrs`] adds attributes to the
//! innermost one. Handlers are immutable: every derivation builds fresh group
//! storage and leaves the receiver untouched, so one handler can be shared and
//! derived from by any number of threads.
//!
//! [`GroupHandler::handle`] folds the groups from the innermost outward into
//! nested dictionaries:
//!
//! - record attributes go into the innermost scope only;
//! - ambient fields from the context go to the top level, and only when no
//!   named group is open;
//! - a named group that ends up with no fields is left out entirely.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;

use crate::attr::{AnyValue, Attr, Value};
use crate::config::HandlerOptions;
use crate::context::Context;
use crate::error::HandlerError;
use crate::fields::fields_from_context;
use crate::level::Level;
use crate::record::Record;
use crate::sink::{Event, Fields, Sink};

/// Front-end facing handler interface
///
/// Object safe, so loggers can hold any handler behind an `Arc`.
pub trait Handler: Send + Sync {
    /// Whether records at `level` would be emitted.
    fn enabled(&self, ctx: &Context, level: Level) -> bool;

    /// Project and emit one record.
    fn handle(&self, ctx: &Context, record: Record) -> Result<(), HandlerError>;

    /// Derive a handler with `attrs` added to the innermost group.
    fn with_attrs(&self, attrs: Vec<Attr>) -> Arc<dyn Handler>;

    /// Derive a handler with a new innermost group; an empty name is a no-op.
    fn with_group(&self, name: &str) -> Arc<dyn Handler>;
}

#[derive(Debug, Clone, Default)]
struct Group {
    name: String,
    attrs: Vec<Attr>,
}

/// Handler projecting records into a [`Sink`]
pub struct GroupHandler<S> {
    sink: Arc<S>,
    groups: Arc<Vec<Group>>,
    opts: HandlerOptions,
}

impl<S> Clone for GroupHandler<S> {
    fn clone(&self) -> Self {
        Self {
            sink: Arc::clone(&self.sink),
            groups: Arc::clone(&self.groups),
            opts: self.opts,
        }
    }
}

impl<S> fmt::Debug for GroupHandler<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let groups: Vec<_> = self
            .groups
            .iter()
            .map(|g| (g.name.as_str(), g.attrs.len()))
            .collect();
        f.debug_struct("GroupHandler")
            .field("groups", &groups)
            .field("opts", &self.opts)
            .finish()
    }
}

impl<S: Sink> GroupHandler<S> {
    /// Root handler with one empty unnamed group
    pub fn new(sink: S, opts: HandlerOptions) -> Self {
        Self::from_shared(Arc::new(sink), opts)
    }

    /// Root handler over a sink shared with other handler chains
    pub fn from_shared(sink: Arc<S>, opts: HandlerOptions) -> Self {
        Self {
            sink,
            groups: Arc::new(vec![Group::default()]),
            opts,
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn options(&self) -> HandlerOptions {
        self.opts
    }

    /// Names of the open groups, outermost first (the root group is `""`)
    pub fn group_names(&self) -> Vec<&str> {
        self.groups.iter().map(|g| g.name.as_str()).collect()
    }

    pub fn enabled(&self, level: Level) -> bool {
        level
            .to_sink_level()
            .is_some_and(|level| self.sink.enabled(level))
    }

    /// Derive a handler whose innermost group also carries `attrs`.
    pub fn with_attrs(&self, attrs: impl IntoIterator<Item = Attr>) -> Self {
        let attrs: Vec<Attr> = attrs.into_iter().collect();
        if attrs.is_empty() {
            return self.clone();
        }

        let mut groups = self.clone_with_capacity(0, attrs.len());
        if let Some(last) = groups.last_mut() {
            last.attrs.extend(attrs);
        }

        self.derive(groups)
    }

    /// Derive a handler with `name` as the new innermost group.
    ///
    /// An empty name returns a handler identical to the receiver.
    pub fn with_group(&self, name: &str) -> Self {
        if name.is_empty() {
            return self.clone();
        }

        let mut groups = self.clone_with_capacity(1, 0);
        groups.push(Group {
            name: name.to_string(),
            attrs: Vec::new(),
        });

        self.derive(groups)
    }

    fn derive(&self, groups: Vec<Group>) -> Self {
        Self {
            sink: Arc::clone(&self.sink),
            groups: Arc::new(groups),
            opts: self.opts,
        }
    }

    /// Copy the group list into fresh storage.
    ///
    /// The list reserves room for `extra_groups` more groups and the
    /// innermost group's attributes for `extra_attrs` more attributes.
    fn clone_with_capacity(&self, extra_groups: usize, extra_attrs: usize) -> Vec<Group> {
        let last = self.groups.len() - 1;
        let mut groups = Vec::with_capacity(self.groups.len() + extra_groups);

        for (i, g) in self.groups.iter().enumerate() {
            let extra = if i == last { extra_attrs } else { 0 };
            let mut attrs = Vec::with_capacity(g.attrs.len() + extra);
            attrs.extend(g.attrs.iter().cloned());
            groups.push(Group {
                name: g.name.clone(),
                attrs,
            });
        }

        groups
    }

    /// Project `record` and emit it as one sink event.
    ///
    /// Fails only when the record level is not one of the four named levels,
    /// in which case nothing is emitted.
    pub fn handle(&self, ctx: &Context, record: Record) -> Result<(), HandlerError> {
        let level = record
            .level
            .to_sink_level()
            .ok_or(HandlerError::UnsupportedLevel(record.level))?;

        let mut event = self.sink.event(level);
        if !event.enabled() {
            return Ok(());
        }

        if !self.opts.skip_time {
            if let Some(time) = record.time {
                event.timestamp(time.with_timezone(&Utc));
            }
        }

        if let Some(caller) = record.caller {
            event.caller(caller);
        }

        let last = self.groups.len() - 1;
        let mut pending: Option<(&str, <S::Event as Fields>::Dict)> = None;

        for (i, group) in self.groups.iter().enumerate().rev() {
            if group.name.is_empty() {
                append_attrs(&mut event, &group.attrs);
                if i == last {
                    append_attrs(&mut event, record.attrs());
                    if let Some(store) = fields_from_context(ctx) {
                        append_attrs(&mut event, &store.snapshot());
                    }
                }
                break;
            }

            let mut dict = event.new_dict();
            let mut populated = append_attrs(&mut dict, &group.attrs);
            if i == last {
                populated |= append_attrs(&mut dict, record.attrs());
            }
            if let Some((name, child)) = pending.take() {
                dict.dict(name, child);
                populated = true;
            }

            pending = populated.then_some((group.name.as_str(), dict));
        }

        if let Some((name, dict)) = pending {
            event.dict(name, dict);
        }

        if record.message.is_empty() {
            event.send();
        } else {
            event.msg(&record.message);
        }

        Ok(())
    }
}

impl<S: Sink + 'static> Handler for GroupHandler<S> {
    fn enabled(&self, _ctx: &Context, level: Level) -> bool {
        GroupHandler::enabled(self, level)
    }

    fn handle(&self, ctx: &Context, record: Record) -> Result<(), HandlerError> {
        GroupHandler::handle(self, ctx, record)
    }

    fn with_attrs(&self, attrs: Vec<Attr>) -> Arc<dyn Handler> {
        Arc::new(GroupHandler::with_attrs(self, attrs))
    }

    fn with_group(&self, name: &str) -> Arc<dyn Handler> {
        Arc::new(GroupHandler::with_group(self, name))
    }
}

/// Append every attribute; returns whether any field was set.
fn append_attrs<'a, F: Fields>(fields: &mut F, attrs: impl IntoIterator<Item = &'a Attr>) -> bool {
    let mut appended = false;
    for attr in attrs {
        appended |= append_attr(fields, attr);
    }
    appended
}

fn append_attr<F: Fields>(fields: &mut F, attr: &Attr) -> bool {
    if attr.is_empty() {
        return false;
    }
    append_value(fields, &attr.key, &attr.value)
}

fn append_value<F: Fields>(fields: &mut F, key: &str, value: &Value) -> bool {
    match value {
        Value::Group(members) => {
            // an unnamed group is inlined into the current scope
            if key.is_empty() {
                return append_attrs(fields, members);
            }

            let mut dict = fields.new_dict();
            if !append_attrs(&mut dict, members) {
                return false;
            }
            fields.dict(key, dict);
        }
        Value::Lazy(valuer) => {
            let resolved = Value::Lazy(Arc::clone(valuer)).resolve();
            if key.is_empty() && resolved.is_zero() {
                return false;
            }
            return append_value(fields, key, &resolved);
        }
        Value::Bool(v) => fields.bool(key, *v),
        Value::Int64(v) => fields.i64(key, *v),
        Value::Uint64(v) => fields.u64(key, *v),
        Value::Float64(v) => fields.f64(key, *v),
        Value::Duration(v) => fields.duration(key, *v),
        Value::Time(v) => fields.time(key, *v),
        Value::String(v) => fields.str(key, v),
        Value::Any(AnyValue::Error(err)) => fields.error(key, &**err),
        Value::Any(AnyValue::Json(v)) => fields.any(key, v),
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FieldNames;
    use crate::fields::with_fields;
    use crate::sink::{JsonSink, MemoryWriter};
    use chrono::DateTime;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn handler(min: Level, skip_time: bool) -> (GroupHandler<JsonSink<MemoryWriter>>, MemoryWriter) {
        let out = MemoryWriter::new();
        let sink = JsonSink::with_options(out.clone(), min, FieldNames::default());
        (GroupHandler::new(sink, HandlerOptions { skip_time }), out)
    }

    fn record(level: Level, msg: &str, attrs: Vec<Attr>) -> Record {
        Record::new(level, msg).with_time(None).with_attrs(attrs)
    }

    fn last_line(out: &MemoryWriter) -> serde_json::Value {
        let lines = out.lines();
        serde_json::from_str(lines.last().expect("no line written")).unwrap()
    }

    #[test]
    fn test_root_has_one_unnamed_group() {
        let (h, _) = handler(Level::DEBUG, true);
        assert_eq!(h.group_names(), vec![""]);
    }

    #[test]
    fn test_derivation_does_not_touch_receiver() {
        let (h, _) = handler(Level::DEBUG, true);
        let base = h.with_attrs([Attr::int("a", 1)]);
        let _child = base.with_attrs([Attr::int("b", 2)]);
        let _grouped = base.with_group("g");

        assert_eq!(base.group_names(), vec![""]);
        assert_eq!(base.groups[0].attrs.len(), 1);
    }

    #[test]
    fn test_clone_with_capacity_reserves_room() {
        let (h, _) = handler(Level::DEBUG, true);
        let h = h.with_attrs([Attr::int("a", 1)]).with_group("g");

        let groups = h.clone_with_capacity(1, 3);
        assert!(groups.capacity() >= 3);
        assert!(groups[1].attrs.capacity() >= 3);
        assert!(!std::ptr::eq(groups[0].attrs.as_ptr(), h.groups[0].attrs.as_ptr()));
    }

    #[test]
    fn test_empty_derivations_share_storage() {
        let (h, _) = handler(Level::DEBUG, true);
        assert!(Arc::ptr_eq(&h.groups, &h.with_group("").groups));
        assert!(Arc::ptr_eq(&h.groups, &h.with_attrs(Vec::<Attr>::new()).groups));
        assert!(!Arc::ptr_eq(&h.groups, &h.with_group("g").groups));
    }

    #[test]
    fn test_enabled_follows_sink() {
        let (h, _) = handler(Level::WARN, true);
        assert!(!h.enabled(Level::DEBUG));
        assert!(!h.enabled(Level::INFO));
        assert!(h.enabled(Level::WARN));
        assert!(h.enabled(Level::ERROR));
        assert!(!h.enabled(Level(5)));
    }

    #[test]
    fn test_unsupported_level_fails_without_output() {
        let (h, out) = handler(Level::DEBUG, true);
        let err = h
            .handle(&Context::background(), record(Level(3), "odd", vec![]))
            .unwrap_err();

        assert_eq!(err, HandlerError::UnsupportedLevel(Level(3)));
        assert!(out.contents().is_empty());
    }

    #[test]
    fn test_disabled_level_skips_projection() {
        let (h, out) = handler(Level::INFO, true);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let attr = Attr::lazy("expensive", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Value::Int64(1)
        });

        h.handle(&Context::background(), record(Level::DEBUG, "hidden", vec![attr]))
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(out.contents().is_empty());
    }

    #[test]
    fn test_timestamp_normalized_to_utc() {
        let (h, out) = handler(Level::DEBUG, false);
        let time = DateTime::parse_from_rfc3339("2024-05-01T12:00:00+02:00").unwrap();
        h.handle(
            &Context::background(),
            record(Level::INFO, "t", vec![]).with_time(Some(time)),
        )
        .unwrap();

        assert_eq!(last_line(&out)["time"], "2024-05-01T10:00:00Z");
    }

    #[test]
    fn test_skip_time() {
        let (h, out) = handler(Level::DEBUG, true);
        let time = DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z").unwrap();
        h.handle(
            &Context::background(),
            record(Level::INFO, "t", vec![]).with_time(Some(time)),
        )
        .unwrap();

        assert!(last_line(&out).get("time").is_none());
    }

    #[test]
    fn test_caller_forwarded() {
        let (h, out) = handler(Level::DEBUG, true);
        let here = std::panic::Location::caller();
        h.handle(
            &Context::background(),
            record(Level::INFO, "c", vec![]).with_caller(Some(here)),
        )
        .unwrap();

        assert_eq!(
            last_line(&out)["caller"],
            format!("{}:{}", here.file(), here.line())
        );
    }

    #[test]
    fn test_empty_message_omits_field() {
        let (h, out) = handler(Level::DEBUG, true);
        h.handle(&Context::background(), record(Level::INFO, "", vec![Attr::int("n", 1)]))
            .unwrap();

        assert_eq!(last_line(&out), json!({"level": "info", "n": 1}));
    }

    #[test]
    fn test_value_kinds() {
        let (h, out) = handler(Level::DEBUG, true);
        let when = DateTime::parse_from_rfc3339("2024-01-02T03:04:05Z")
            .unwrap()
            .with_timezone(&Utc);

        h.handle(
            &Context::background(),
            record(
                Level::INFO,
                "kinds",
                vec![
                    Attr::bool("b", true),
                    Attr::int("i", -1),
                    Attr::uint("u", 2),
                    Attr::float("f", 0.5),
                    Attr::duration("d", std::time::Duration::from_millis(250)),
                    Attr::time("t", when),
                    Attr::string("s", "x"),
                    Attr::error("e", std::io::Error::other("boom")),
                    Attr::any("a", &vec![1, 2]),
                    Attr::lazy("l", || Value::from("resolved")),
                ],
            ),
        )
        .unwrap();

        assert_eq!(
            last_line(&out),
            json!({
                "level": "info",
                "b": true,
                "i": -1,
                "u": 2,
                "f": 0.5,
                "d": 250.0,
                "t": "2024-01-02T03:04:05Z",
                "s": "x",
                "e": "boom",
                "a": [1, 2],
                "l": "resolved",
                "message": "kinds"
            })
        );
    }

    #[test]
    fn test_group_values() {
        let (h, out) = handler(Level::DEBUG, true);
        h.handle(
            &Context::background(),
            record(
                Level::INFO,
                "g",
                vec![
                    Attr::group("req", [Attr::string("method", "GET")]),
                    Attr::group("", [Attr::int("inlined", 1)]),
                    Attr::group("empty", Vec::<Attr>::new()),
                    Attr::group("only_zero", [Attr::int("", 0)]),
                    Attr::lazy("lazy_group", || Value::Group(vec![Attr::int("x", 1)])),
                ],
            ),
        )
        .unwrap();

        assert_eq!(
            last_line(&out),
            json!({
                "level": "info",
                "req": {"method": "GET"},
                "inlined": 1,
                "lazy_group": {"x": 1},
                "message": "g"
            })
        );
    }

    #[test]
    fn test_ambient_fields_only_at_top_level() {
        let (h, out) = handler(Level::DEBUG, true);
        let ctx = with_fields(&Context::background(), [Attr::string("k", "v")]);

        h.handle(&ctx, record(Level::INFO, "top", vec![Attr::int("r", 1)]))
            .unwrap();
        assert_eq!(
            last_line(&out),
            json!({"level": "info", "r": 1, "k": "v", "message": "top"})
        );

        h.with_group("g")
            .handle(&ctx, record(Level::INFO, "nested", vec![Attr::int("r", 1)]))
            .unwrap();
        assert_eq!(
            last_line(&out),
            json!({"level": "info", "g": {"r": 1}, "message": "nested"})
        );
    }

    #[test]
    fn test_trait_object_derivation() {
        let (h, out) = handler(Level::DEBUG, true);
        let dynh: Arc<dyn Handler> = Arc::new(h);
        let derived = dynh
            .with_attrs(vec![Attr::int("id", 1)])
            .with_group("g")
            .with_attrs(vec![Attr::int("x", 2)]);

        assert!(derived.enabled(&Context::background(), Level::INFO));
        derived
            .handle(&Context::background(), record(Level::ERROR, "dyn", vec![]))
            .unwrap();

        assert_eq!(
            last_line(&out),
            json!({"level": "error", "id": 1, "g": {"x": 2}, "message": "dyn"})
        );
    }
}
