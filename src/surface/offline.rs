//! Request primitives for a surface with no network: every request answers 404.

use anyhow::Result;
use async_trait::async_trait;

use super::primitives::{
    Fetch, FetchInput, FetchResponse, HttpRequest, ReadyStateListener, RequestCore,
    RequestFactory, RequestState, ResponseType,
};

/// Fetch primitive of a surface with no network: every request is a 404
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineFetch;

#[async_trait]
impl Fetch for OfflineFetch {
    async fn fetch(&self, input: FetchInput) -> Result<FetchResponse> {
        Ok(FetchResponse::not_found(input.target()))
    }
}

/// Request factory of a surface with no network
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineRequests;

impl RequestFactory for OfflineRequests {
    fn create(&self) -> Box<dyn HttpRequest> {
        Box::new(OfflineRequest::default())
    }
}

#[derive(Default)]
pub struct OfflineRequest {
    core: RequestCore,
}

#[async_trait]
impl HttpRequest for OfflineRequest {
    fn open(&mut self, method: &str, url: &str, is_async: bool) -> Result<()> {
        self.core.open(method, url, is_async);
        Ok(())
    }

    fn set_request_header(&mut self, name: &str, value: &str) -> Result<()> {
        self.core.set_header(name, value)
    }

    fn set_response_type(&mut self, response_type: ResponseType) {
        self.core.response_type = response_type;
    }

    fn response_type(&self) -> ResponseType {
        self.core.response_type
    }

    fn on_ready_state_change(&mut self, listener: ReadyStateListener) {
        self.core.set_listener(listener);
    }

    async fn send(&mut self, _body: Option<Vec<u8>>) -> Result<()> {
        self.core.begin_send()?;
        self.core
            .complete(404, "Not Found", Some("text/plain".to_string()), b"Not Found");
        Ok(())
    }

    fn state(&self) -> &RequestState {
        &self.core.state
    }
}
