//! Mock implementations for testing.
//!
//! [`MockTransport`] replays queued responses and records every request it
//! receives, so services can be exercised without a network.

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use crate::transport::{
    ByteStream, Connection, HttpMethod, HttpRequest, HttpResponse, HttpTransport, RequestBody,
    StreamingResponse, TransportError,
};

/// Mock HTTP transport for testing.
pub struct MockTransport {
    responses: Mutex<VecDeque<Result<MockResponse, TransportError>>>,
    requests: Mutex<Vec<RecordedRequest>>,
    default_response: Mutex<Option<MockResponse>>,
}

/// A recorded request.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// HTTP method.
    pub method: HttpMethod,
    /// Absolute request URL.
    pub url: String,
    /// Request headers.
    pub headers: HashMap<String, String>,
    /// Request body.
    pub body: RequestBody,
    /// Timeout of the connection the request was sent on.
    pub timeout: Duration,
    /// Whether the connection was built for a multipart body.
    pub multipart: bool,
    /// Whether the request was sent through the streaming path.
    pub streaming: bool,
}

impl RecordedRequest {
    /// Looks up a header, ignoring case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Parses a JSON body.
    pub fn json_body(&self) -> Option<serde_json::Value> {
        match &self.body {
            RequestBody::Json(bytes) => serde_json::from_slice(bytes).ok(),
            _ => None,
        }
    }
}

/// A mock response.
#[derive(Debug, Clone)]
pub struct MockResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers, names lowercased.
    pub headers: HashMap<String, String>,
    /// Response body.
    pub body: Vec<u8>,
    /// Chunks delivered by the streaming path; defaults to the body in one chunk.
    pub chunks: Option<Vec<Vec<u8>>>,
}

impl MockResponse {
    /// Creates a response with the given status and no body.
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: Vec::new(),
            chunks: None,
        }
    }

    /// Creates a successful JSON response.
    pub fn json<T: serde::Serialize>(value: &T) -> Self {
        Self::new(200)
            .with_header("content-type", "application/json")
            .with_body(serde_json::to_vec(value).unwrap_or_default())
    }

    /// Creates a successful binary response.
    pub fn binary(content_type: &str, body: impl Into<Vec<u8>>) -> Self {
        Self::new(200)
            .with_header("content-type", content_type)
            .with_body(body)
    }

    /// Creates an error response in the API's error shape.
    pub fn error(status: u16, message: &str) -> Self {
        let error = serde_json::json!({
            "name": "error",
            "errors": [message],
        });
        Self::json(&error).with_status(status)
    }

    /// Creates a streamed response delivered in the given chunks.
    pub fn streaming<I, C>(chunks: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Vec<u8>>,
    {
        let chunks: Vec<Vec<u8>> = chunks.into_iter().map(Into::into).collect();
        let mut response = Self::new(200).with_header("content-type", "text/event-stream");
        response.body = chunks.concat();
        response.chunks = Some(chunks);
        response
    }

    /// Sets the status.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Adds a header.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    /// Replaces the body.
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }
}

impl MockTransport {
    /// Creates a new mock transport.
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            default_response: Mutex::new(None),
        }
    }

    /// Queues a response.
    pub fn queue(&self, response: MockResponse) {
        self.responses.lock().push_back(Ok(response));
    }

    /// Queues a JSON response.
    pub fn queue_json<T: serde::Serialize>(&self, value: &T) {
        self.queue(MockResponse::json(value));
    }

    /// Queues an error response.
    pub fn queue_error(&self, status: u16, message: &str) {
        self.queue(MockResponse::error(status, message));
    }

    /// Queues a transport failure.
    pub fn queue_failure(&self, error: TransportError) {
        self.responses.lock().push_back(Err(error));
    }

    /// Sets the response used once the queue is drained.
    pub fn set_default(&self, response: MockResponse) {
        *self.default_response.lock() = Some(response);
    }

    /// Gets all recorded requests.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    /// Gets the last recorded request.
    pub fn last_request(&self) -> Option<RecordedRequest> {
        self.requests.lock().last().cloned()
    }

    /// Returns the number of requests made.
    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    fn next_response(&self) -> Result<MockResponse, TransportError> {
        match self.responses.lock().pop_front() {
            Some(response) => response,
            None => Ok(self
                .default_response
                .lock()
                .clone()
                .unwrap_or_else(|| MockResponse::error(500, "No mock response configured"))),
        }
    }

    fn record(&self, connection: &Connection, request: HttpRequest, streaming: bool) {
        self.requests.lock().push(RecordedRequest {
            method: request.method,
            url: request.url,
            headers: request.headers,
            body: request.body,
            timeout: connection.timeout(),
            multipart: connection.is_multipart(),
            streaming,
        });
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(
        &self,
        connection: &Connection,
        request: HttpRequest,
    ) -> Result<HttpResponse, TransportError> {
        self.record(connection, request, false);

        let response = self.next_response()?;
        Ok(HttpResponse {
            status: response.status,
            headers: response.headers,
            body: Bytes::from(response.body),
        })
    }

    async fn send_streaming(
        &self,
        connection: &Connection,
        request: HttpRequest,
    ) -> Result<StreamingResponse, TransportError> {
        self.record(connection, request, true);

        let response = self.next_response()?;
        let chunks = response.chunks.unwrap_or_else(|| vec![response.body]);
        let stream: ByteStream = Box::pin(futures::stream::iter(
            chunks.into_iter().map(|chunk| Ok(Bytes::from(chunk))),
        ));

        Ok(StreamingResponse {
            status: response.status,
            headers: response.headers,
            stream,
        })
    }
}
