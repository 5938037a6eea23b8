//! Substituting a surface's request primitives with lookups against a [`VirtualOrigin`].
//!
//! Both primitive families follow the same policy: a handle URL issued by the origin is
//! served from the handle's bytes; any other request target is resolved against the
//! origin's base path at the moment of the call and a store hit is served from memory.
//! Anything else goes to the primitive that was installed before, unmodified.
//!
//! [`install`] returns an [`InterceptorGuard`], the capability that puts the previous
//! primitives back.

mod fetch;
mod request;

pub use fetch::InterceptedFetch;
pub use request::{InterceptedRequest, InterceptedRequests};

use std::sync::Arc;

use tracing::{debug, warn};

use crate::origin::VirtualOrigin;
use crate::surface::{ExecutionContext, Fetch, RequestFactory};

/// Restores the primitives an interceptor replaced.
pub struct InterceptorGuard {
    origin_id: u64,
    original_fetch: Arc<dyn Fetch>,
    original_requests: Arc<dyn RequestFactory>,
}

impl InterceptorGuard {
    pub fn origin_id(&self) -> u64 {
        self.origin_id
    }

    /// Put the original primitives back.
    ///
    /// A slot is only restored while it still holds this interceptor, so a primitive
    /// installed later by someone else is left alone. Returns whether anything changed.
    pub fn restore(self, context: &ExecutionContext) -> bool {
        let mut restored = false;
        if context.fetch_primitive().interceptor_id() == Some(self.origin_id) {
            context.replace_fetch(self.original_fetch);
            restored = true;
        }
        if context.request_primitive().interceptor_id() == Some(self.origin_id) {
            context.replace_requests(self.original_requests);
            restored = true;
        }
        if restored {
            debug!(origin = self.origin_id, "restored original request primitives");
        }
        restored
    }
}

/// Whether the interceptor for `origin_id` is the one currently installed on `context`.
pub fn is_installed(context: &ExecutionContext, origin_id: u64) -> bool {
    context.fetch_primitive().interceptor_id() == Some(origin_id)
        && context.request_primitive().interceptor_id() == Some(origin_id)
}

/// Install interceptors for `origin` on `context`.
///
/// Returns `None` without touching the context when this origin's interceptors are
/// already installed, so repeated installation never wraps twice.
pub fn install(
    context: &ExecutionContext,
    origin: &Arc<VirtualOrigin>,
) -> Option<InterceptorGuard> {
    if is_installed(context, origin.id()) {
        debug!(origin = origin.id(), "interceptor already installed");
        return None;
    }

    let current_fetch = context.fetch_primitive();
    let current_requests = context.request_primitive();
    let foreign = current_fetch
        .interceptor_id()
        .or(current_requests.interceptor_id());
    if let Some(other) = foreign {
        warn!(
            origin = origin.id(),
            other, "surface is already intercepted by another session"
        );
    }

    let original_fetch = context.replace_fetch(Arc::new(InterceptedFetch::new(
        origin.clone(),
        current_fetch,
    )));
    let original_requests = context.replace_requests(Arc::new(InterceptedRequests::new(
        origin.clone(),
        current_requests,
    )));
    debug!(origin = origin.id(), "installed request interceptor");

    Some(InterceptorGuard {
        origin_id: origin.id(),
        original_fetch,
        original_requests,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ContentStore;

    #[tokio::test]
    async fn test_install_is_idempotent_and_reversible() {
        let context = ExecutionContext::offline();
        let origin = Arc::new(VirtualOrigin::new());
        let mut store = ContentStore::new();
        store.put("hello.txt", b"hello".to_vec());
        origin.replace_store(store);

        let guard = install(&context, &origin).unwrap();
        assert!(is_installed(&context, origin.id()));
        assert!(install(&context, &origin).is_none());

        let response = context.fetch("hello.txt").await.unwrap();
        assert_eq!(response.status, 200);

        assert!(guard.restore(&context));
        assert!(!is_installed(&context, origin.id()));
        assert_eq!(context.fetch("hello.txt").await.unwrap().status, 404);
    }

    #[test]
    fn test_restore_leaves_foreign_primitives_alone() {
        let context = ExecutionContext::offline();
        let origin = Arc::new(VirtualOrigin::new());
        let guard = install(&context, &origin).unwrap();

        let newer = Arc::new(VirtualOrigin::new());
        let newer_guard = install(&context, &newer).unwrap();
        assert!(!guard.restore(&context));
        assert!(is_installed(&context, newer.id()));
        assert!(newer_guard.restore(&context));
    }
}
