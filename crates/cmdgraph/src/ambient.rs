//! The ambient "current" service resolver.
//!
//! An invocation that was handed its own resolver makes it current for
//! everything bound underneath it, so nested binds without an explicit
//! resolver still see it. Storage is thread-local for synchronous runs and
//! task-local for async ones; concurrent invocations never observe each
//! other's resolver.
//!
//! ```rust
//! use std::sync::Arc;
//! use cmdgraph::ambient::{self, ResolverScope};
//! use cmdgraph::{ServiceMap, ServiceResolver};
//!
//! assert!(ambient::current().is_none());
//! {
//!     let _scope = ResolverScope::enter(Arc::new(ServiceMap::new()));
//!     assert!(ambient::current().is_some());
//! }
//! assert!(ambient::current().is_none());
//! ```

use std::cell::RefCell;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::services::ServiceResolver;

thread_local! {
    static THREAD_CURRENT: RefCell<Vec<Arc<dyn ServiceResolver>>> = const { RefCell::new(Vec::new()) };
}

tokio::task_local! {
    static TASK_CURRENT: Arc<dyn ServiceResolver>;
}

/// Makes a resolver current on this thread until dropped.
///
/// Scopes nest; dropping restores the previous resolver, including when
/// unwinding.
#[must_use = "the resolver is only current while the scope is alive"]
pub struct ResolverScope {
    // Pinned to the thread whose stack it pushed onto.
    _not_send: PhantomData<*const ()>,
}

impl ResolverScope {
    pub fn enter(resolver: Arc<dyn ServiceResolver>) -> Self {
        THREAD_CURRENT.with(|stack| stack.borrow_mut().push(resolver));
        Self {
            _not_send: PhantomData,
        }
    }
}

impl Drop for ResolverScope {
    fn drop(&mut self) {
        THREAD_CURRENT.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// Runs `future` with `resolver` current for the whole task.
pub async fn scope_async<F>(resolver: Arc<dyn ServiceResolver>, future: F) -> F::Output
where
    F: Future,
{
    TASK_CURRENT.scope(resolver, future).await
}

/// The innermost current resolver: a thread scope first, then the task's.
pub fn current() -> Option<Arc<dyn ServiceResolver>> {
    THREAD_CURRENT
        .with(|stack| stack.borrow().last().cloned())
        .or_else(|| TASK_CURRENT.try_with(Arc::clone).ok())
}
