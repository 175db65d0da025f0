//! Ambient fields carried by a [`Context`]
//!
//! Fields attached with [`with_fields`] are injected into every record logged
//! with that context while no named group is open.
//!
//! Note the visibility rule: only the *first* attachment derives a new
//! context. Later attachments append to the store already bound, so the new
//! fields are visible to every holder of that store, including callers further
//! up the same call chain:
//!
//! ```ignore
//! let ctx = with_fields(&ctx, [Attr::string("request_id", "r-1")]);
//! handle(&ctx);           // calls with_fields(&ctx, [Attr::int("user", 7)])
//! logger.info_ctx(&ctx, "done", []); // carries request_id and user
//! ```

use std::sync::Arc;

use parking_lot::RwLock;

use crate::attr::Attr;
use crate::context::Context;

/// Append-in-place list of ambient attributes
#[derive(Debug, Default)]
pub struct FieldStore {
    fields: RwLock<Vec<Attr>>,
}

impl FieldStore {
    fn new(fields: Vec<Attr>) -> Self {
        Self {
            fields: RwLock::new(fields),
        }
    }

    fn append(&self, attrs: impl IntoIterator<Item = Attr>) {
        self.fields.write().extend(attrs);
    }

    pub fn len(&self) -> usize {
        self.fields.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.read().is_empty()
    }

    /// Copy of the current fields, in insertion order
    pub fn snapshot(&self) -> Vec<Attr> {
        self.fields.read().clone()
    }
}

/// Attach ambient fields to `ctx`.
///
/// Without a store bound, a new store seeded with `attrs` is bound into a
/// derived context which is returned. With a store already bound, `attrs` are
/// appended to it and `ctx` itself is returned.
pub fn with_fields(ctx: &Context, attrs: impl IntoIterator<Item = Attr>) -> Context {
    match fields_from_context(ctx) {
        Some(store) => {
            store.append(attrs);
            ctx.clone()
        }
        None => ctx.with_value(Arc::new(FieldStore::new(attrs.into_iter().collect()))),
    }
}

/// The store bound to `ctx`, if any
pub fn fields_from_context(ctx: &Context) -> Option<Arc<FieldStore>> {
    ctx.value::<Arc<FieldStore>>().cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(store: &FieldStore) -> Vec<String> {
        store.snapshot().into_iter().map(|a| a.key).collect()
    }

    #[test]
    fn test_no_store_by_default() {
        assert!(fields_from_context(&Context::background()).is_none());
    }

    #[test]
    fn test_first_attach_derives_context() {
        let root = Context::background();
        let ctx = with_fields(&root, [Attr::string("k", "v")]);

        assert!(!ctx.ptr_eq(&root));
        assert!(fields_from_context(&root).is_none());
        let store = fields_from_context(&ctx).unwrap();
        assert_eq!(keys(&store), vec!["k"]);
    }

    #[test]
    fn test_second_attach_appends_in_place() {
        let ctx = with_fields(&Context::background(), [Attr::int("a", 1)]);
        let same = with_fields(&ctx, [Attr::int("b", 2), Attr::int("c", 3)]);

        assert!(same.ptr_eq(&ctx));
        assert_eq!(keys(&fields_from_context(&ctx).unwrap()), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_append_is_visible_upstream() {
        let upstream = with_fields(&Context::background(), [Attr::int("a", 1)]);

        // A callee derives its own child scope, then attaches more fields.
        let callee = upstream.with_value(42u32);
        let _ = with_fields(&callee, [Attr::int("b", 2)]);

        assert_eq!(fields_from_context(&upstream).unwrap().len(), 2);
    }

    #[test]
    fn test_empty_attach_still_binds_store() {
        let ctx = with_fields(&Context::background(), Vec::<Attr>::new());
        let store = fields_from_context(&ctx).unwrap();
        assert!(store.is_empty());
    }
}
