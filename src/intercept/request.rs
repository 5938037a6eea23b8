//! Request objects that answer from the archive before falling back to the original.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use tracing::trace;

use crate::origin::VirtualOrigin;
use crate::surface::{
    HttpRequest, ReadyStateListener, RequestCore, RequestFactory, RequestState, ResponseType,
};

/// Request factory whose objects answer from the origin's store before falling back.
pub struct InterceptedRequests {
    origin: Arc<VirtualOrigin>,
    original: Arc<dyn RequestFactory>,
}

impl InterceptedRequests {
    pub fn new(origin: Arc<VirtualOrigin>, original: Arc<dyn RequestFactory>) -> Self {
        Self { origin, original }
    }
}

impl RequestFactory for InterceptedRequests {
    fn create(&self) -> Box<dyn HttpRequest> {
        Box::new(InterceptedRequest {
            origin: self.origin.clone(),
            inner: self.original.create(),
            core: RequestCore::default(),
            resolved: None,
            passthrough: false,
        })
    }

    fn interceptor_id(&self) -> Option<u64> {
        Some(self.origin.id())
    }
}

/// A request object wrapping one created by the original factory.
///
/// Every call is mirrored onto the wrapped object so that, on a store miss, `send` can
/// hand over to it as if it had been used directly.
pub struct InterceptedRequest {
    origin: Arc<VirtualOrigin>,
    inner: Box<dyn HttpRequest>,
    core: RequestCore,
    /// Store key the opened target resolved to.
    resolved: Option<String>,
    passthrough: bool,
}

#[async_trait]
impl HttpRequest for InterceptedRequest {
    fn open(&mut self, method: &str, url: &str, is_async: bool) -> Result<()> {
        self.core.open(method, url, is_async);
        self.resolved = self.origin.resolve(url);
        self.passthrough = false;
        self.inner.open(method, url, is_async)
    }

    fn set_request_header(&mut self, name: &str, value: &str) -> Result<()> {
        self.core.set_header(name, value)?;
        self.inner.set_request_header(name, value)
    }

    fn set_response_type(&mut self, response_type: ResponseType) {
        self.core.response_type = response_type;
        self.inner.set_response_type(response_type);
    }

    fn response_type(&self) -> ResponseType {
        self.core.response_type
    }

    fn on_ready_state_change(&mut self, listener: ReadyStateListener) {
        let shared = Arc::new(Mutex::new(listener));
        let forward = shared.clone();
        self.core.set_listener(Box::new(move |state| {
            let mut listener = shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            (*listener)(state);
        }));
        self.inner.on_ready_state_change(Box::new(move |state| {
            let mut listener = forward.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            (*listener)(state);
        }));
    }

    async fn send(&mut self, body: Option<Vec<u8>>) -> Result<()> {
        let hit = self.origin.dereference(&self.core.url).or_else(|| {
            let key = self.resolved.as_deref()?;
            self.origin.store().get(key).cloned()
        });

        let Some(resource) = hit else {
            trace!(url = %self.core.url, "request passthrough");
            self.passthrough = true;
            return self.inner.send(body).await;
        };

        self.core.begin_send()?;
        trace!(url = %self.core.url, path = resource.path(), "serving request from archive");
        if self.core.is_async {
            tokio::task::yield_now().await;
        }
        self.core.complete(
            200,
            "OK",
            Some(resource.content_type().to_string()),
            resource.bytes(),
        );
        Ok(())
    }

    fn state(&self) -> &RequestState {
        if self.passthrough {
            self.inner.state()
        } else {
            &self.core.state
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ContentStore;
    use crate::surface::{OfflineRequests, ReadyState, ResponseBody};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn factory() -> (Arc<VirtualOrigin>, InterceptedRequests) {
        let mut store = ContentStore::new();
        store.put("a/config.json", br#"{"level":3}"#.to_vec());
        store.put("a/shader.glsl", b"void main(){}".to_vec());
        store.put("a/mesh.bin", vec![0, 159, 146, 150]);
        let origin = Arc::new(VirtualOrigin::new());
        origin.replace_store(store);
        origin.set_base_path("a");
        let factory = InterceptedRequests::new(origin.clone(), Arc::new(OfflineRequests));
        (origin, factory)
    }

    fn counting(request: &mut dyn HttpRequest) -> Arc<AtomicUsize> {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        request.on_ready_state_change(Box::new(move |state| {
            assert_eq!(state.ready_state, ReadyState::Done);
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        fired
    }

    #[tokio::test]
    async fn test_async_hit_as_text() {
        let (_, factory) = factory();
        let mut request = factory.create();
        let fired = counting(request.as_mut());

        request.open("GET", "shader.glsl", true).unwrap();
        request.send(None).await.unwrap();

        let state = request.state();
        assert_eq!(state.status, 200);
        assert_eq!(state.status_text, "OK");
        assert_eq!(state.ready_state, ReadyState::Done);
        assert_eq!(state.response.as_text(), Some("void main(){}"));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_sync_hit_as_json() {
        let (_, factory) = factory();
        let mut request = factory.create();
        let fired = counting(request.as_mut());

        request.set_response_type(ResponseType::Json);
        request.open("GET", "config.json", false).unwrap();
        request.send(None).await.unwrap();

        assert_eq!(
            request.state().response,
            ResponseBody::Json(serde_json::json!({"level": 3}))
        );
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_binary_response() {
        let (_, factory) = factory();
        let mut request = factory.create();
        request.set_response_type(ResponseType::ArrayBuffer);
        request.open("GET", "/a/mesh.bin", true).unwrap();
        request.send(None).await.unwrap();
        assert_eq!(
            request.state().response,
            ResponseBody::Binary(vec![0, 159, 146, 150])
        );
    }

    #[tokio::test]
    async fn test_miss_delegates_to_original() {
        let (_, factory) = factory();
        let mut request = factory.create();
        let fired = counting(request.as_mut());

        request.open("GET", "missing.txt", true).unwrap();
        request.send(None).await.unwrap();

        assert_eq!(request.state().status, 404);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_target_is_resolved_at_open() {
        let (origin, factory) = factory();
        let mut request = factory.create();
        request.open("GET", "config.json", true).unwrap();
        origin.set_base_path("");
        request.send(None).await.unwrap();
        assert_eq!(request.state().status, 200);
    }

    #[tokio::test]
    async fn test_handle_url_is_served_until_released() {
        let (origin, factory) = factory();
        let resource = origin.store().get("a/config.json").cloned().unwrap();
        let url = origin.handles().issue(&resource);

        let mut request = factory.create();
        request.set_response_type(ResponseType::Json);
        request.open("GET", &url, true).unwrap();
        request.send(None).await.unwrap();
        assert_eq!(request.state().status, 200);
        assert_eq!(
            request.state().response,
            ResponseBody::Json(serde_json::json!({"level": 3}))
        );

        origin.handles().release_all();
        let mut request = factory.create();
        request.open("GET", &url, true).unwrap();
        request.send(None).await.unwrap();
        assert_eq!(request.state().status, 404);
    }

    #[tokio::test]
    async fn test_send_requires_open() {
        let (_, factory) = factory();
        let mut request = factory.create();
        request.open("GET", "config.json", true).unwrap();
        request.send(None).await.unwrap();
        assert!(request.send(None).await.is_err());
    }
}
