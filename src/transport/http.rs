//! HTTP transport implementation.

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::{Client, ClientBuilder};
use std::collections::HashMap;
use std::fmt;
use std::pin::Pin;
use tracing::instrument;

use super::{Connection, MultipartPart, TransportError};

/// Byte stream of a streamed response body.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>;

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// GET request.
    Get,
    /// POST request.
    Post,
    /// DELETE request.
    Delete,
}

impl HttpMethod {
    /// Returns the method name.
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request body.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// No body.
    None,
    /// Serialized JSON document.
    Json(Vec<u8>),
    /// Multipart form parts.
    Multipart(Vec<MultipartPart>),
}

/// HTTP request representation.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// HTTP method.
    pub method: HttpMethod,
    /// Absolute request URL.
    pub url: String,
    /// Request headers.
    pub headers: HashMap<String, String>,
    /// Request body.
    pub body: RequestBody,
}

impl HttpRequest {
    /// Creates a request without body.
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HashMap::new(),
            body: RequestBody::None,
        }
    }

    /// Sets the request body.
    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    /// Replaces the request headers.
    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    /// Looks up a header, ignoring case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// HTTP response representation.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers, names lowercased.
    pub headers: HashMap<String, String>,
    /// Response body.
    pub body: Bytes,
}

impl HttpResponse {
    /// Returns true if the status indicates success (2xx).
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Returns the `content-type` header.
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type").map(String::as_str)
    }

    /// Returns the body decoded lossily as text.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Streaming HTTP response.
pub struct StreamingResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers, names lowercased.
    pub headers: HashMap<String, String>,
    /// Byte stream.
    pub stream: ByteStream,
}

impl StreamingResponse {
    /// Returns true if the status indicates success (2xx).
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Drains the stream into a buffered response.
    pub async fn into_buffered(mut self) -> Result<HttpResponse, TransportError> {
        let mut body = Vec::new();
        while let Some(chunk) = self.stream.next().await {
            body.extend_from_slice(&chunk?);
        }
        Ok(HttpResponse {
            status: self.status,
            headers: self.headers,
            body: Bytes::from(body),
        })
    }
}

impl fmt::Debug for StreamingResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamingResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish()
    }
}

/// HTTP transport trait.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Sends a request and buffers the whole response.
    async fn send(
        &self,
        connection: &Connection,
        request: HttpRequest,
    ) -> Result<HttpResponse, TransportError>;

    /// Sends a request and returns the response body as a byte stream.
    async fn send_streaming(
        &self,
        connection: &Connection,
        request: HttpRequest,
    ) -> Result<StreamingResponse, TransportError>;
}

/// HTTP transport implementation using reqwest.
///
/// A fresh client is built from the [`Connection`] for every request so that
/// timeout and transport hooks always reflect the current configuration.
#[derive(Default)]
pub struct ReqwestTransport;

impl ReqwestTransport {
    /// Creates a new reqwest transport.
    pub fn new() -> Self {
        Self
    }

    fn client(&self, connection: &Connection) -> Result<Client, TransportError> {
        let builder = ClientBuilder::new().timeout(connection.timeout());
        connection
            .apply_client_hooks(builder)
            .build()
            .map_err(|e| TransportError::Connection {
                message: format!("Failed to build HTTP client: {}", e),
            })
    }

    fn build_request(
        &self,
        client: &Client,
        request: HttpRequest,
    ) -> Result<reqwest::RequestBuilder, TransportError> {
        let mut req_builder = match request.method {
            HttpMethod::Get => client.get(&request.url),
            HttpMethod::Post => client.post(&request.url),
            HttpMethod::Delete => client.delete(&request.url),
        };

        let multipart = matches!(request.body, RequestBody::Multipart(_));

        for (name, value) in &request.headers {
            // The form encoder supplies `multipart/form-data; boundary=...`.
            if multipart && name.eq_ignore_ascii_case("content-type") {
                continue;
            }
            req_builder = req_builder.header(name, value);
        }

        req_builder = match request.body {
            RequestBody::None => req_builder,
            RequestBody::Json(body) => req_builder.body(body),
            RequestBody::Multipart(parts) => req_builder.multipart(build_form(parts)?),
        };

        Ok(req_builder)
    }

    async fn execute(
        &self,
        connection: &Connection,
        request: HttpRequest,
    ) -> Result<reqwest::Response, TransportError> {
        let client = self.client(connection)?;
        let req_builder = self.build_request(&client, request)?;

        req_builder
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(e, Some(connection.timeout())))
    }
}

fn build_form(parts: Vec<MultipartPart>) -> Result<reqwest::multipart::Form, TransportError> {
    let mut form = reqwest::multipart::Form::new();

    for part in parts {
        form = match part {
            MultipartPart::Text { name, value } => form.text(name, value),
            MultipartPart::File {
                name,
                filename,
                content_type,
                data,
            } => {
                let mut part = reqwest::multipart::Part::bytes(data.to_vec()).file_name(filename);
                if let Some(content_type) = content_type {
                    part = part
                        .mime_str(&content_type)
                        .map_err(|e| TransportError::InvalidResponse {
                            message: e.to_string(),
                        })?;
                }
                form.part(name, part)
            }
        };
    }

    Ok(form)
}

fn collect_headers(headers: &reqwest::header::HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or_default().to_string()))
        .collect()
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    #[instrument(skip(self, connection, request), fields(method = %request.method, url = %request.url))]
    async fn send(
        &self,
        connection: &Connection,
        request: HttpRequest,
    ) -> Result<HttpResponse, TransportError> {
        let timeout = connection.timeout();
        let response = self.execute(connection, request).await?;

        let status = response.status().as_u16();
        let headers = collect_headers(response.headers());
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::from_reqwest(e, Some(timeout)))?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }

    #[instrument(skip(self, connection, request), fields(method = %request.method, url = %request.url))]
    async fn send_streaming(
        &self,
        connection: &Connection,
        request: HttpRequest,
    ) -> Result<StreamingResponse, TransportError> {
        let timeout = connection.timeout();
        let response = self.execute(connection, request).await?;

        let status = response.status().as_u16();
        let headers = collect_headers(response.headers());
        let stream: ByteStream = Box::pin(
            response
                .bytes_stream()
                .map(move |result| result.map_err(|e| TransportError::from_reqwest(e, Some(timeout)))),
        );

        Ok(StreamingResponse {
            status,
            headers,
            stream,
        })
    }
}

impl fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReqwestTransport").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_header_lookup_ignores_case() {
        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        let request = HttpRequest::new(HttpMethod::Get, "https://example.com").with_headers(headers);

        assert_eq!(request.header("content-type"), Some("application/json"));
        assert_eq!(request.header("accept"), None);
    }

    #[test]
    fn test_response_success_range() {
        let response = HttpResponse {
            status: 204,
            headers: HashMap::new(),
            body: Bytes::new(),
        };
        assert!(response.is_success());

        let response = HttpResponse { status: 302, ..response };
        assert!(!response.is_success());
    }

    #[tokio::test]
    async fn test_streaming_response_into_buffered() {
        let chunks = vec![Ok(Bytes::from_static(b"ab")), Ok(Bytes::from_static(b"cd"))];
        let response = StreamingResponse {
            status: 500,
            headers: HashMap::new(),
            stream: Box::pin(futures::stream::iter(chunks)),
        };

        let buffered = response.into_buffered().await.unwrap();
        assert_eq!(buffered.status, 500);
        assert_eq!(buffered.text(), "abcd");
    }

    #[test]
    fn test_build_form_accepts_parts_without_content_type() {
        let form = build_form(vec![
            MultipartPart::Text {
                name: "prompt".to_string(),
                value: "a cat".to_string(),
            },
            MultipartPart::File {
                name: "image".to_string(),
                filename: "cat.png".to_string(),
                content_type: None,
                data: Bytes::from_static(b"\x89PNG"),
            },
        ]);
        assert!(form.is_ok());
    }

    #[test]
    fn test_method_display() {
        assert_eq!(HttpMethod::Delete.to_string(), "DELETE");
    }
}
