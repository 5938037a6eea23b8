//! Rendering surfaces and the execution context their documents run in.
//!
//! A [`Surface`] is an isolated document sink: markup is written into it through
//! open/write/close, and it announces its own teardown. Its [`ExecutionContext`] holds
//! the request primitives documents use, in slots that can be swapped at runtime so an
//! interceptor can stand in front of the real ones.

mod memory;
mod network;
mod offline;
mod primitives;

pub use memory::MemorySurface;
pub use network::{NetworkClient, NetworkFetch, NetworkRequest, NetworkRequests};
pub use offline::{OfflineFetch, OfflineRequest, OfflineRequests};
pub use primitives::*;

use std::sync::{Arc, RwLock};

use anyhow::Result;

use crate::config::NetworkConfig;

/// Listener run once when the surface is torn down.
pub type UnloadListener = Box<dyn FnOnce(&ExecutionContext) + Send>;

/// An isolated document context that markup is written into.
pub trait Surface: Send + Sync {
    fn context(&self) -> &ExecutionContext;

    /// Start a new document, discarding the current one.
    fn open(&self);

    fn write(&self, markup: &str);

    /// Finish the document started by `open`.
    fn close(&self);

    /// Register a listener for the surface's unload.
    fn on_unload(&self, listener: UnloadListener);

    /// Replace the surface's document with `markup`.
    fn write_document(&self, markup: &str) {
        self.open();
        self.write(markup);
        self.close();
    }
}

/// The request primitives visible to documents rendered in a surface.
pub struct ExecutionContext {
    fetch: RwLock<Arc<dyn Fetch>>,
    requests: RwLock<Arc<dyn RequestFactory>>,
}

impl ExecutionContext {
    pub fn new(fetch: Arc<dyn Fetch>, requests: Arc<dyn RequestFactory>) -> Self {
        Self {
            fetch: RwLock::new(fetch),
            requests: RwLock::new(requests),
        }
    }

    /// Context whose primitives answer every request with a 404.
    pub fn offline() -> Self {
        Self::new(Arc::new(OfflineFetch), Arc::new(OfflineRequests))
    }

    /// Context whose primitives reach the real network.
    pub fn networked(config: &NetworkConfig) -> Result<Self> {
        let client = NetworkClient::new(config)?;
        Ok(Self::new(
            Arc::new(NetworkFetch::new(client.clone())),
            Arc::new(NetworkRequests::new(client)),
        ))
    }

    pub fn fetch_primitive(&self) -> Arc<dyn Fetch> {
        self.fetch
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn request_primitive(&self) -> Arc<dyn RequestFactory> {
        self.requests
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Install a new fetch primitive, returning the one it replaced.
    pub fn replace_fetch(&self, fetch: Arc<dyn Fetch>) -> Arc<dyn Fetch> {
        let mut slot = self
            .fetch
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        std::mem::replace(&mut *slot, fetch)
    }

    /// Install a new request factory, returning the one it replaced.
    pub fn replace_requests(&self, requests: Arc<dyn RequestFactory>) -> Arc<dyn RequestFactory> {
        let mut slot = self
            .requests
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        std::mem::replace(&mut *slot, requests)
    }

    /// Call the currently installed fetch primitive.
    pub async fn fetch(&self, input: impl Into<FetchInput>) -> Result<FetchResponse> {
        let fetch = self.fetch_primitive();
        fetch.fetch(input.into()).await
    }

    /// Construct a request object from the currently installed factory.
    pub fn new_request(&self) -> Box<dyn HttpRequest> {
        self.request_primitive().create()
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::offline()
    }
}
