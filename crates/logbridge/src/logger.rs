//! Front-end logger
//!
//! [`Logger`] builds [`Record`]s and hands them to a [`Handler`]. It is cheap
//! to clone; `with` and `with_group` derive new loggers over derived handlers.

use std::panic::Location;
use std::sync::Arc;

use crate::attr::Attr;
use crate::context::Context;
use crate::handler::Handler;
use crate::level::Level;
use crate::record::Record;

#[derive(Clone)]
pub struct Logger {
    handler: Arc<dyn Handler>,
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger").finish_non_exhaustive()
    }
}

impl Logger {
    pub fn new<H: Handler + 'static>(handler: H) -> Self {
        Self::from_arc(Arc::new(handler))
    }

    pub fn from_arc(handler: Arc<dyn Handler>) -> Self {
        Self { handler }
    }

    pub fn handler(&self) -> &Arc<dyn Handler> {
        &self.handler
    }

    /// Logger whose records all carry `attrs`
    pub fn with(&self, attrs: impl IntoIterator<Item = Attr>) -> Self {
        let attrs: Vec<Attr> = attrs.into_iter().collect();
        if attrs.is_empty() {
            return self.clone();
        }
        Self::from_arc(self.handler.with_attrs(attrs))
    }

    /// Logger qualifying all later attributes by group `name`
    pub fn with_group(&self, name: &str) -> Self {
        if name.is_empty() {
            return self.clone();
        }
        Self::from_arc(self.handler.with_group(name))
    }

    pub fn enabled(&self, level: Level) -> bool {
        self.enabled_ctx(&Context::current(), level)
    }

    pub fn enabled_ctx(&self, ctx: &Context, level: Level) -> bool {
        self.handler.enabled(ctx, level)
    }

    /// Log with the current thread's context.
    #[track_caller]
    pub fn log(&self, level: Level, msg: &str, attrs: impl IntoIterator<Item = Attr>) {
        self.log_ctx(&Context::current(), level, msg, attrs);
    }

    /// Log with an explicit context.
    ///
    /// A record the handler rejects is dropped and reported through
    /// `tracing`.
    #[track_caller]
    pub fn log_ctx(
        &self,
        ctx: &Context,
        level: Level,
        msg: &str,
        attrs: impl IntoIterator<Item = Attr>,
    ) {
        if !self.handler.enabled(ctx, level) {
            return;
        }

        let record = Record::new(level, msg)
            .with_caller(Some(Location::caller()))
            .with_attrs(attrs);

        if let Err(e) = self.handler.handle(ctx, record) {
            tracing::warn!(target: "logbridge", error = %e, "dropping log record");
        }
    }

    #[track_caller]
    pub fn debug(&self, msg: &str, attrs: impl IntoIterator<Item = Attr>) {
        self.log(Level::DEBUG, msg, attrs);
    }

    #[track_caller]
    pub fn info(&self, msg: &str, attrs: impl IntoIterator<Item = Attr>) {
        self.log(Level::INFO, msg, attrs);
    }

    #[track_caller]
    pub fn warn(&self, msg: &str, attrs: impl IntoIterator<Item = Attr>) {
        self.log(Level::WARN, msg, attrs);
    }

    #[track_caller]
    pub fn error(&self, msg: &str, attrs: impl IntoIterator<Item = Attr>) {
        self.log(Level::ERROR, msg, attrs);
    }

    #[track_caller]
    pub fn debug_ctx(&self, ctx: &Context, msg: &str, attrs: impl IntoIterator<Item = Attr>) {
        self.log_ctx(ctx, Level::DEBUG, msg, attrs);
    }

    #[track_caller]
    pub fn info_ctx(&self, ctx: &Context, msg: &str, attrs: impl IntoIterator<Item = Attr>) {
        self.log_ctx(ctx, Level::INFO, msg, attrs);
    }

    #[track_caller]
    pub fn warn_ctx(&self, ctx: &Context, msg: &str, attrs: impl IntoIterator<Item = Attr>) {
        self.log_ctx(ctx, Level::WARN, msg, attrs);
    }

    #[track_caller]
    pub fn error_ctx(&self, ctx: &Context, msg: &str, attrs: impl IntoIterator<Item = Attr>) {
        self.log_ctx(ctx, Level::ERROR, msg, attrs);
    }
}
