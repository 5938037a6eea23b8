//! Path-addressable in-memory store of archive contents.

use std::collections::HashMap;
use std::sync::Arc;

use crate::{mime, path};

/// A single file extracted from the archive.
///
/// Bytes are shared, so handles issued for a resource keep it readable after the
/// store itself has been cleared.
#[derive(Debug, Clone)]
pub struct StoredResource {
    path: String,
    bytes: Arc<[u8]>,
}

impl StoredResource {
    /// A resource over bytes already shared with someone else, such as a handle.
    pub(crate) fn shared(path: impl Into<String>, bytes: Arc<[u8]>) -> Self {
        Self {
            path: path.into(),
            bytes,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn bytes(&self) -> &Arc<[u8]> {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Content type derived from the path's extension.
    pub fn content_type(&self) -> &'static str {
        mime::for_path(&self.path)
    }

    /// Lossy UTF-8 view of the payload.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

/// Mapping from normalized path to [`StoredResource`].
///
/// Keys are expected to be normalized already; `get`/`has` are exact-key lookups.
/// Use [`ContentStore::lookup`] to resolve a raw reference first.
#[derive(Debug, Default, Clone)]
pub struct ContentStore {
    files: HashMap<String, StoredResource>,
}

impl ContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the resource stored under `path`.
    pub fn put(&mut self, path: impl Into<String>, bytes: impl Into<Arc<[u8]>>) {
        let path = path.into();
        let resource = StoredResource {
            path: path.clone(),
            bytes: bytes.into(),
        };
        self.files.insert(path, resource);
    }

    pub fn get(&self, path: &str) -> Option<&StoredResource> {
        self.files.get(path)
    }

    pub fn has(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    /// Resolve `reference` against the directory `base`, then look it up.
    ///
    /// Query strings and fragments are ignored.
    pub fn lookup(&self, reference: &str, base: &str) -> Option<&StoredResource> {
        let key = path::resolve(path::strip_suffixes(reference), base);
        if key.is_empty() {
            return None;
        }
        self.get(&key)
    }

    pub fn clear(&mut self) {
        self.files.clear();
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// All stored paths, in no particular order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    pub fn resources(&self) -> impl Iterator<Item = &StoredResource> {
        self.files.values()
    }

    /// Content type for a store path.
    pub fn mime_for(path: &str) -> &'static str {
        mime::for_path(path)
    }
}
