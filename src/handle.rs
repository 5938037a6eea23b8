//! Dereferenceable handles standing in for stored bytes inside rendered markup.
//!
//! A handle is the equivalent of an object URL: a `blob:` reference the surface can
//! dereference without touching the network. Handles keep their bytes alive on their
//! own, independently of the store, until they are released.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use crate::store::StoredResource;

/// URL scheme prefix shared by every handle.
pub const HANDLE_SCHEME: &str = "blob:zipframe/";

/// A live handle to a stored resource's bytes.
#[derive(Debug, Clone)]
pub struct ResourceHandle {
    url: String,
    path: String,
    content_type: &'static str,
    bytes: Arc<[u8]>,
}

impl ResourceHandle {
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Store path the handle was issued for.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn content_type(&self) -> &'static str {
        self.content_type
    }

    pub fn bytes(&self) -> &Arc<[u8]> {
        &self.bytes
    }
}

#[derive(Default)]
struct Issued {
    by_url: HashMap<String, ResourceHandle>,
    by_path: HashMap<String, String>,
}

/// Tracks every handle issued during one load cycle so they can be released together.
pub struct HandleRegistry {
    session: u64,
    next: AtomicU64,
    issued: Mutex<Issued>,
}

impl HandleRegistry {
    pub fn new(session: u64) -> Self {
        Self {
            session,
            next: AtomicU64::new(1),
            issued: Mutex::new(Issued::default()),
        }
    }

    /// Return the handle URL for `resource`, issuing one if none is outstanding.
    pub fn issue(&self, resource: &StoredResource) -> String {
        let mut issued = self.lock();
        if let Some(url) = issued.by_path.get(resource.path()) {
            return url.clone();
        }

        let id = self.next.fetch_add(1, Ordering::Relaxed);
        let url = format!("{HANDLE_SCHEME}{}-{id}", self.session);
        let handle = ResourceHandle {
            url: url.clone(),
            path: resource.path().to_string(),
            content_type: resource.content_type(),
            bytes: resource.bytes().clone(),
        };

        debug!(path = resource.path(), url = %url, "issued resource handle");
        issued.by_path.insert(resource.path().to_string(), url.clone());
        issued.by_url.insert(url.clone(), handle);
        url
    }

    /// Look up a handle by URL; released handles no longer dereference.
    pub fn dereference(&self, url: &str) -> Option<ResourceHandle> {
        self.lock().by_url.get(url).cloned()
    }

    /// Handle URL currently issued for a store path, if any.
    pub fn url_for(&self, path: &str) -> Option<String> {
        self.lock().by_path.get(path).cloned()
    }

    /// Release every outstanding handle, returning how many were released.
    pub fn release_all(&self) -> usize {
        let mut issued = self.lock();
        let released = issued.by_url.len();
        issued.by_url.clear();
        issued.by_path.clear();
        if released > 0 {
            debug!(released, "released resource handles");
        }
        released
    }

    pub fn outstanding(&self) -> usize {
        self.lock().by_url.len()
    }

    fn lock(&self) -> MutexGuard<'_, Issued> {
        self.issued.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
