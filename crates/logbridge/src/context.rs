//! Scoped context carrier
//!
//! A [`Context`] is an immutable chain of typed values. Deriving a child with
//! [`Context::with_value`] never changes the parent; lookups search from the
//! most recent binding outward.
//!
//! Each thread also has a *current* context, set for a scope with
//! [`ContextGuard`], which the [`Logger`](crate::Logger) uses when a call does
//! not pass a context explicitly.

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::fmt;
use std::sync::Arc;

struct Node {
    key: TypeId,
    value: Arc<dyn Any + Send + Sync>,
    parent: Option<Arc<Node>>,
}

/// Immutable key-value scope, keyed by value type
#[derive(Clone, Default)]
pub struct Context {
    head: Option<Arc<Node>>,
}

impl Context {
    /// The empty root context
    pub fn background() -> Self {
        Self::default()
    }

    /// Derive a child context binding `value` under its type.
    pub fn with_value<T: Any + Send + Sync>(&self, value: T) -> Self {
        Self {
            head: Some(Arc::new(Node {
                key: TypeId::of::<T>(),
                value: Arc::new(value),
                parent: self.head.clone(),
            })),
        }
    }

    /// Look up the innermost value bound for type `T`.
    pub fn value<T: Any + Send + Sync>(&self) -> Option<&T> {
        let key = TypeId::of::<T>();
        let mut node = self.head.as_deref();
        while let Some(n) = node {
            if n.key == key {
                return n.value.downcast_ref::<T>();
            }
            node = n.parent.as_deref();
        }
        None
    }

    /// Whether both contexts are the same scope.
    pub fn ptr_eq(&self, other: &Context) -> bool {
        match (&self.head, &other.head) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }

    /// The context entered on the current thread, or the background context.
    pub fn current() -> Self {
        CURRENT_CONTEXT.with(|ctx| ctx.borrow().clone())
    }

    /// Run `f` with this context entered on the current thread.
    pub fn scope<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = ContextGuard::enter(self.clone());
        f()
    }

    fn depth(&self) -> usize {
        let mut depth = 0;
        let mut node = self.head.as_deref();
        while let Some(n) = node {
            depth += 1;
            node = n.parent.as_deref();
        }
        depth
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("bindings", &self.depth())
            .finish()
    }
}

thread_local! {
    static CURRENT_CONTEXT: RefCell<Context> = RefCell::new(Context::background());
}

/// RAII guard for the current thread's context
///
/// Entering replaces the current context; dropping restores the one that was
/// current before.
pub struct ContextGuard {
    previous: Option<Context>,
}

impl ContextGuard {
    pub fn enter(ctx: Context) -> Self {
        let previous = CURRENT_CONTEXT.with(|current| current.replace(ctx));
        Self {
            previous: Some(previous),
        }
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            CURRENT_CONTEXT.with(|current| *current.borrow_mut() = previous);
        }
    }
}
