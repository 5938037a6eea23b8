//! The two request primitive families a surface exposes to its documents.
//!
//! [`Fetch`] is the promise-style primitive: one call, one response. [`HttpRequest`] is the
//! stateful open/send object whose completion is signalled through a ready-state listener.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde::de::DeserializeOwned;

/// A fetch request descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,
    pub method: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl FetchRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: "GET".to_string(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// What a fetch call accepts: a bare target or a full request descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchInput {
    Url(String),
    Request(FetchRequest),
}

impl FetchInput {
    /// The request target, as written by the caller.
    pub fn target(&self) -> &str {
        match self {
            FetchInput::Url(url) => url,
            FetchInput::Request(request) => &request.url,
        }
    }

    pub fn into_request(self) -> FetchRequest {
        match self {
            FetchInput::Url(url) => FetchRequest::get(url),
            FetchInput::Request(request) => request,
        }
    }
}

impl From<&str> for FetchInput {
    fn from(url: &str) -> Self {
        FetchInput::Url(url.to_string())
    }
}

impl From<String> for FetchInput {
    fn from(url: String) -> Self {
        FetchInput::Url(url)
    }
}

impl From<FetchRequest> for FetchInput {
    fn from(request: FetchRequest) -> Self {
        FetchInput::Request(request)
    }
}

/// A completed fetch response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub url: String,
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl FetchResponse {
    pub fn new(url: impl Into<String>, status: u16, status_text: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status,
            status_text: status_text.into(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn not_found(url: impl Into<String>) -> Self {
        let mut response = Self::new(url, 404, "Not Found");
        response.body = b"Not Found".to_vec();
        response
            .headers
            .push(("content-type".to_string(), "text/plain".to_string()));
        response
    }

    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body)
            .with_context(|| format!("response from {} is not valid JSON", self.url))
    }
}

/// Fetch-style request primitive.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, input: FetchInput) -> Result<FetchResponse>;

    /// Session id of the interceptor this primitive belongs to, if it is one.
    fn interceptor_id(&self) -> Option<u64> {
        None
    }
}

/// Request progress, numbered like the values documents observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadyState {
    #[default]
    Unsent = 0,
    Opened = 1,
    HeadersReceived = 2,
    Loading = 3,
    Done = 4,
}

/// Shape in which a completed request exposes its body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseType {
    #[default]
    Text,
    Json,
    ArrayBuffer,
}

/// Completed response body, shaped by [`ResponseType`].
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ResponseBody {
    #[default]
    Empty,
    Text(String),
    Json(serde_json::Value),
    Binary(Vec<u8>),
}

impl ResponseBody {
    /// Shape raw bytes the way the caller asked for. Unparseable JSON becomes `null`.
    pub fn decode(bytes: &[u8], response_type: ResponseType) -> Self {
        match response_type {
            ResponseType::Text => ResponseBody::Text(String::from_utf8_lossy(bytes).into_owned()),
            ResponseType::Json => ResponseBody::Json(
                serde_json::from_slice(bytes).unwrap_or(serde_json::Value::Null),
            ),
            ResponseType::ArrayBuffer => ResponseBody::Binary(bytes.to_vec()),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ResponseBody::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// Observable fields of a request object.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RequestState {
    pub ready_state: ReadyState,
    pub status: u16,
    pub status_text: String,
    pub response_url: String,
    pub content_type: Option<String>,
    pub response: ResponseBody,
}

impl RequestState {
    /// Text view of the response, available whatever the response type.
    pub fn response_text(&self) -> Option<String> {
        match &self.response {
            ResponseBody::Empty => None,
            ResponseBody::Text(text) => Some(text.clone()),
            ResponseBody::Json(value) => Some(value.to_string()),
            ResponseBody::Binary(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        }
    }
}

pub type ReadyStateListener = Box<dyn FnMut(&RequestState) + Send>;

/// Stateful open/send request primitive.
///
/// `send` on a synchronous request (`is_async == false`) completes without suspending;
/// an asynchronous one may suspend before completing. In both cases completion is
/// observable, and the listener has fired once, by the time `send` resolves.
#[async_trait]
pub trait HttpRequest: Send {
    fn open(&mut self, method: &str, url: &str, is_async: bool) -> Result<()>;

    fn set_request_header(&mut self, name: &str, value: &str) -> Result<()>;

    fn set_response_type(&mut self, response_type: ResponseType);

    fn response_type(&self) -> ResponseType;

    fn on_ready_state_change(&mut self, listener: ReadyStateListener);

    async fn send(&mut self, body: Option<Vec<u8>>) -> Result<()>;

    fn state(&self) -> &RequestState;
}

/// Constructor for [`HttpRequest`] objects.
pub trait RequestFactory: Send + Sync {
    fn create(&self) -> Box<dyn HttpRequest>;

    /// Session id of the interceptor this factory belongs to, if it is one.
    fn interceptor_id(&self) -> Option<u64> {
        None
    }
}

/// Bookkeeping shared by request implementations: what was opened, what the caller
/// configured, and the completion state.
#[derive(Default)]
pub struct RequestCore {
    pub method: String,
    pub url: String,
    pub is_async: bool,
    pub headers: Vec<(String, String)>,
    pub response_type: ResponseType,
    pub state: RequestState,
    listener: Option<ReadyStateListener>,
    sent: bool,
}

impl RequestCore {
    pub fn open(&mut self, method: &str, url: &str, is_async: bool) {
        self.method = method.to_ascii_uppercase();
        self.url = url.to_string();
        self.is_async = is_async;
        self.headers.clear();
        self.sent = false;
        self.state = RequestState {
            ready_state: ReadyState::Opened,
            ..RequestState::default()
        };
    }

    pub fn set_header(&mut self, name: &str, value: &str) -> Result<()> {
        if self.state.ready_state != ReadyState::Opened || self.sent {
            bail!("InvalidStateError: headers can only be set on an opened, unsent request");
        }
        self.headers.push((name.to_string(), value.to_string()));
        Ok(())
    }

    pub fn set_listener(&mut self, listener: ReadyStateListener) {
        self.listener = Some(listener);
    }

    /// Mark the request as sent; a request can only be sent once per `open`.
    pub fn begin_send(&mut self) -> Result<()> {
        if self.state.ready_state != ReadyState::Opened || self.sent {
            bail!("InvalidStateError: request must be opened before it is sent");
        }
        self.sent = true;
        Ok(())
    }

    /// Fill in the completed state and notify the listener.
    pub fn complete(
        &mut self,
        status: u16,
        status_text: &str,
        content_type: Option<String>,
        bytes: &[u8],
    ) {
        self.state = RequestState {
            ready_state: ReadyState::Done,
            status,
            status_text: status_text.to_string(),
            response_url: self.url.clone(),
            content_type,
            response: ResponseBody::decode(bytes, self.response_type),
        };
        if let Some(listener) = self.listener.as_mut() {
            listener(&self.state);
        }
    }
}
