//! The fetch primitive installed over a surface while an archive is rendered.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::trace;

use crate::origin::VirtualOrigin;
use crate::store::StoredResource;
use crate::surface::{Fetch, FetchInput, FetchResponse};

/// Fetch primitive answering handle URLs and store hits before falling back.
pub struct InterceptedFetch {
    origin: Arc<VirtualOrigin>,
    original: Arc<dyn Fetch>,
}

impl InterceptedFetch {
    pub fn new(origin: Arc<VirtualOrigin>, original: Arc<dyn Fetch>) -> Self {
        Self { origin, original }
    }
}

#[async_trait]
impl Fetch for InterceptedFetch {
    async fn fetch(&self, input: FetchInput) -> Result<FetchResponse> {
        if let Some(resource) = self.origin.lookup(input.target()) {
            trace!(url = input.target(), path = resource.path(), "serving fetch from archive");
            // Completion is always delivered asynchronously, as the real primitive does
            tokio::task::yield_now().await;
            return Ok(served(&resource));
        }

        trace!(url = input.target(), "fetch passthrough");
        self.original.fetch(input).await
    }

    fn interceptor_id(&self) -> Option<u64> {
        Some(self.origin.id())
    }
}

fn served(resource: &StoredResource) -> FetchResponse {
    let mut response = FetchResponse::new(resource.path(), 200, "OK");
    response.headers = vec![
        ("content-type".to_string(), resource.content_type().to_string()),
        ("content-length".to_string(), resource.len().to_string()),
    ];
    response.body = resource.bytes().to_vec();
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ContentStore;
    use std::sync::Mutex;

    /// Records every input it sees and answers 418.
    #[derive(Default)]
    struct Recording {
        seen: Mutex<Vec<FetchInput>>,
    }

    #[async_trait]
    impl Fetch for Recording {
        async fn fetch(&self, input: FetchInput) -> Result<FetchResponse> {
            let response = FetchResponse::new(input.target(), 418, "I'm a teapot");
            self.seen.lock().unwrap().push(input);
            Ok(response)
        }
    }

    fn setup() -> (Arc<VirtualOrigin>, Arc<Recording>, InterceptedFetch) {
        let mut store = ContentStore::new();
        store.put("site/data.json", br#"{"ok":true}"#.to_vec());
        store.put("site/style.css", b"body{}".to_vec());
        let origin = Arc::new(VirtualOrigin::new());
        origin.replace_store(store);
        origin.set_base_path("site");

        let recording = Arc::new(Recording::default());
        let fetch = InterceptedFetch::new(origin.clone(), recording.clone());
        (origin, recording, fetch)
    }

    #[tokio::test]
    async fn test_hit_is_served_from_store() {
        let (_, recording, fetch) = setup();
        let response = fetch.fetch("data.json".into()).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.content_type(), Some("application/json"));
        let value: serde_json::Value = response.json().unwrap();
        assert_eq!(value["ok"], true);

        let css = fetch.fetch("./style.css?v=1".into()).await.unwrap();
        assert_eq!(css.content_type(), Some("text/css"));
        assert!(recording.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_request_descriptor_is_resolved_too() {
        let (_, _, fetch) = setup();
        let input = crate::surface::FetchRequest::get("/site/data.json").with_method("POST");
        assert_eq!(fetch.fetch(input.into()).await.unwrap().status, 200);
    }

    #[tokio::test]
    async fn test_miss_passes_through_unmodified() {
        let (_, recording, fetch) = setup();
        let external = FetchInput::from("https://example.com/api?q=1");
        let response = fetch.fetch(external.clone()).await.unwrap();
        assert_eq!(response.status, 418);

        let missing = FetchInput::from("missing.json");
        fetch.fetch(missing.clone()).await.unwrap();

        assert_eq!(*recording.seen.lock().unwrap(), vec![external, missing]);
    }

    #[tokio::test]
    async fn test_handle_url_is_served_until_released() {
        let (origin, recording, fetch) = setup();
        let resource = origin.store().get("site/data.json").cloned().unwrap();
        let url = origin.handles().issue(&resource);

        let response = fetch.fetch(url.as_str().into()).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.content_type(), Some("application/json"));
        assert_eq!(response.text(), r#"{"ok":true}"#);

        origin.handles().release_all();
        assert_eq!(fetch.fetch(url.as_str().into()).await.unwrap().status, 418);
        assert_eq!(recording.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_base_path_is_read_per_call() {
        let (origin, recording, fetch) = setup();
        origin.set_base_path("");
        assert_eq!(fetch.fetch("data.json".into()).await.unwrap().status, 418);
        origin.set_base_path("site");
        assert_eq!(fetch.fetch("data.json".into()).await.unwrap().status, 200);
        assert_eq!(recording.seen.lock().unwrap().len(), 1);
    }
}
