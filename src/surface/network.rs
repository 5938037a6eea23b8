//! Request primitives backed by a real HTTP client.

use async_trait::async_trait;
use reqwest::{Client, Method};
use std::time::Duration;
use tracing::warn;

use super::primitives::{
    Fetch, FetchInput, FetchRequest, FetchResponse, HttpRequest, ReadyStateListener, RequestCore,
    RequestFactory, RequestState, ResponseType,
};
use crate::config::NetworkConfig;
use anyhow::{Result, anyhow, bail};

/// Real network access shared by both primitive families
#[derive(Clone)]
pub struct NetworkClient {
    client: Client,
    max_retry: u32,
}

impl NetworkClient {
    pub fn new(config: &NetworkConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            max_retry: config.max_retry,
        })
    }

    /// Perform a request, retrying on connection errors and timeouts
    pub async fn execute(&self, request: &FetchRequest) -> Result<FetchResponse> {
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|_| anyhow!("Invalid HTTP method: {}", request.method))?;

        let mut retry_count = 0;
        loop {
            let mut builder = self.client.request(method.clone(), &request.url);
            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            if let Some(body) = &request.body {
                builder = builder.body(body.clone());
            }

            match builder.send().await {
                Ok(resp) => {
                    let status = resp.status();
                    let url = resp.url().to_string();
                    let headers = resp
                        .headers()
                        .iter()
                        .filter_map(|(name, value)| {
                            value
                                .to_str()
                                .ok()
                                .map(|v| (name.as_str().to_string(), v.to_string()))
                        })
                        .collect();
                    let body = resp.bytes().await?.to_vec();

                    return Ok(FetchResponse {
                        url,
                        status: status.as_u16(),
                        status_text: status.canonical_reason().unwrap_or_default().to_string(),
                        headers,
                        body,
                    });
                }
                Err(e) if e.is_timeout() || e.is_connect() => {
                    retry_count += 1;
                    if retry_count >= self.max_retry {
                        bail!("Max retries exceeded for {}: {}", request.url, e);
                    }
                    warn!(
                        "Connection error, retry {}/{}: {}",
                        retry_count, self.max_retry, e
                    );
                    tokio::time::sleep(Duration::from_millis(500 * retry_count as u64)).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// Fetch primitive backed by the real network
#[derive(Clone)]
pub struct NetworkFetch {
    client: NetworkClient,
}

impl NetworkFetch {
    pub fn new(client: NetworkClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetch for NetworkFetch {
    async fn fetch(&self, input: FetchInput) -> Result<FetchResponse> {
        self.client.execute(&input.into_request()).await
    }
}

/// Request factory backed by the real network
#[derive(Clone)]
pub struct NetworkRequests {
    client: NetworkClient,
}

impl NetworkRequests {
    pub fn new(client: NetworkClient) -> Self {
        Self { client }
    }
}

impl RequestFactory for NetworkRequests {
    fn create(&self) -> Box<dyn HttpRequest> {
        Box::new(NetworkRequest {
            client: self.client.clone(),
            core: RequestCore::default(),
        })
    }
}

pub struct NetworkRequest {
    client: NetworkClient,
    core: RequestCore,
}

#[async_trait]
impl HttpRequest for NetworkRequest {
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

    async fn send(&mut self, body: Option<Vec<u8>>) -> Result<()> {
        self.core.begin_send()?;

        let request = FetchRequest {
            url: self.core.url.clone(),
            method: self.core.method.clone(),
            headers: self.core.headers.clone(),
            body,
        };
        let response = self.client.execute(&request).await?;
        let content_type = response.content_type().map(str::to_string);
        self.core.complete(
            response.status,
            &response.status_text,
            content_type,
            &response.body,
        );
        Ok(())
    }

    fn state(&self) -> &RequestState {
        &self.core.state
    }
}
