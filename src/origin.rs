//! The virtual origin a session serves documents from: the current store, the
//! directory of the document being rendered and the handles issued for it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::handle::{HANDLE_SCHEME, HandleRegistry};
use crate::path;
use crate::store::{ContentStore, StoredResource};

static NEXT_ORIGIN_ID: AtomicU64 = AtomicU64::new(1);

/// Store, base path and handles shared between a session, its interceptor and its
/// rewriter.
///
/// The session is the only writer. Readers always see either the previous store or the
/// next one in full, never a store under construction.
pub struct VirtualOrigin {
    id: u64,
    store: RwLock<Arc<ContentStore>>,
    base_path: RwLock<String>,
    handles: HandleRegistry,
}

impl VirtualOrigin {
    pub fn new() -> Self {
        let id = NEXT_ORIGIN_ID.fetch_add(1, Ordering::Relaxed);
        Self {
            id,
            store: RwLock::new(Arc::new(ContentStore::new())),
            base_path: RwLock::new(String::new()),
            handles: HandleRegistry::new(id),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Handles issued for documents rendered from this origin.
    pub fn handles(&self) -> &HandleRegistry {
        &self.handles
    }

    /// Snapshot of the current store.
    pub fn store(&self) -> Arc<ContentStore> {
        self.store
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Swap in a fully populated store.
    pub fn replace_store(&self, store: ContentStore) {
        *self
            .store
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Arc::new(store);
    }

    /// Empty the store and reset the base path.
    pub fn clear(&self) {
        self.replace_store(ContentStore::new());
        self.set_base_path("");
    }

    pub fn base_path(&self) -> String {
        self.base_path
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn set_base_path(&self, base: impl Into<String>) {
        *self
            .base_path
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = base.into();
    }

    /// Store key a request target maps to under the current base path.
    ///
    /// External targets (anything with a URL scheme) and empty targets map to nothing.
    pub fn resolve(&self, target: &str) -> Option<String> {
        let target = target.trim();
        if target.is_empty() || path::is_external(target) {
            return None;
        }
        let key = path::resolve(path::strip_suffixes(target), &self.base_path());
        (!key.is_empty()).then_some(key)
    }

    /// The resource behind a handle URL, while the handle is outstanding.
    pub fn dereference(&self, target: &str) -> Option<StoredResource> {
        let target = target.trim();
        if !target.starts_with(HANDLE_SCHEME) {
            return None;
        }
        let handle = self.handles.dereference(target)?;
        Some(StoredResource::shared(handle.path(), handle.bytes().clone()))
    }

    /// Serve a request target: handle URLs dereference directly, anything else is
    /// resolved against the base path at the time of the call and looked up in the
    /// current store.
    pub fn lookup(&self, target: &str) -> Option<StoredResource> {
        if let Some(resource) = self.dereference(target) {
            return Some(resource);
        }
        let key = self.resolve(target)?;
        self.store().get(&key).cloned()
    }
}

impl Default for VirtualOrigin {
    fn default() -> Self {
        Self::new()
    }
}
