//! Request-building layer on top of [`HttpTransport`].

use bytes::Bytes;
use futures::StreamExt;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::instrument;

use super::{
    Connection, ConnectionBuilder, EventDecoder, EventSink, HttpMethod, HttpRequest, HttpResponse,
    HttpTransport, MultipartEncoder, RequestBody, ReqwestTransport, ResponseBody,
    StreamingResponse, TransportError,
};
use crate::config::{ConfigHandle, StabilityConfig};
use crate::errors::StabilityResult;
use crate::observability::ErrorLogger;
use crate::types::Parameters;

const JSON_CONTENT_TYPE: &str = "application/json";
const MULTIPART_CONTENT_TYPE: &str = "multipart/form-data";

/// Issues API calls using the current configuration.
///
/// The configuration is read once per call, so changes made through the
/// handle apply to the next request.
#[derive(Clone)]
pub struct ApiTransport {
    config: ConfigHandle,
    transport: Arc<dyn HttpTransport>,
    decoder: EventDecoder,
    encoder: MultipartEncoder,
}

impl ApiTransport {
    /// Creates a transport layer over `transport`.
    pub fn new(config: ConfigHandle, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            config,
            transport,
            decoder: EventDecoder::new(),
            encoder: MultipartEncoder::new(),
        }
    }

    /// Creates a transport layer backed by reqwest.
    pub fn with_reqwest(config: ConfigHandle) -> Self {
        Self::new(config, Arc::new(ReqwestTransport::new()))
    }

    /// Returns the configuration handle.
    pub fn config(&self) -> &ConfigHandle {
        &self.config
    }

    /// Sends a GET request.
    #[instrument(skip(self))]
    pub async fn get(&self, path: &str) -> StabilityResult<ResponseBody> {
        self.simple(HttpMethod::Get, path).await
    }

    /// Sends a DELETE request.
    #[instrument(skip(self))]
    pub async fn delete(&self, path: &str) -> StabilityResult<ResponseBody> {
        self.simple(HttpMethod::Delete, path).await
    }

    /// Sends a JSON POST request.
    ///
    /// When `params` holds an [`EventSink`] under `stream`, the body is sent
    /// with `stream: true`, each decoded event is delivered to the sink as the
    /// response arrives, and [`ResponseBody::Empty`] is returned. Events in a
    /// non-2xx stream are delivered too before the HTTP error is raised.
    #[instrument(skip(self, params))]
    pub async fn post(&self, path: &str, mut params: Parameters) -> StabilityResult<ResponseBody> {
        let config = self.config.snapshot();
        let headers = default_headers(&config)?;
        let sink = params.take_stream_sink()?;
        let body = serde_json::to_vec(&params.into_json()?)?;

        let request = HttpRequest::new(HttpMethod::Post, config.endpoint_url(path))
            .with_headers(headers)
            .with_body(RequestBody::Json(body));
        let connection = connect(&config, false);

        match sink {
            Some(sink) => self.execute_streaming(&connection, request, &sink).await,
            None => self.execute(&connection, request).await,
        }
    }

    /// Sends a multipart POST request.
    ///
    /// `headers` are merged over the defaults; the content type is always
    /// multipart.
    #[instrument(skip(self, headers, params))]
    pub async fn multipart_post(
        &self,
        path: &str,
        headers: HashMap<String, String>,
        params: Option<Parameters>,
    ) -> StabilityResult<ResponseBody> {
        let config = self.config.snapshot();
        let mut merged = default_headers(&config)?;
        merge_headers(&mut merged, headers);
        merge_headers(&mut merged, [("Content-Type", MULTIPART_CONTENT_TYPE)]);

        let parts = match &params {
            Some(params) => self.encoder.encode(params).await?,
            None => Vec::new(),
        };

        let request = HttpRequest::new(HttpMethod::Post, config.endpoint_url(path))
            .with_headers(merged)
            .with_body(RequestBody::Multipart(parts));
        let connection = connect(&config, true);

        self.execute(&connection, request).await
    }

    async fn simple(&self, method: HttpMethod, path: &str) -> StabilityResult<ResponseBody> {
        let config = self.config.snapshot();
        let request =
            HttpRequest::new(method, config.endpoint_url(path)).with_headers(default_headers(&config)?);
        let connection = connect(&config, false);

        self.execute(&connection, request).await
    }

    async fn execute(
        &self,
        connection: &Connection,
        request: HttpRequest,
    ) -> StabilityResult<ResponseBody> {
        let method = request.method;
        let url = request.url.clone();

        connection.before_request(&request);
        let response = self.transport.send(connection, request).await?;
        connection.after_response(method, &url, &response);

        if !response.is_success() {
            return Err(http_error(&response).into());
        }

        Ok(ResponseBody::decode(&response)?)
    }

    async fn execute_streaming(
        &self,
        connection: &Connection,
        request: HttpRequest,
        sink: &EventSink,
    ) -> StabilityResult<ResponseBody> {
        let method = request.method;
        let url = request.url.clone();

        connection.before_request(&request);
        let response = self.transport.send_streaming(connection, request).await?;

        let success = response.is_success();
        let StreamingResponse {
            status,
            headers,
            mut stream,
        } = response;

        // Failed streams still reach the sink; their bytes become the error body.
        let mut failed_body = Vec::new();
        let mut delivered = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            delivered += self.decoder.decode(&chunk, sink);
            if !success {
                failed_body.extend_from_slice(&chunk);
            }
        }
        tracing::debug!(events = delivered, status, "Stream finished");

        let finished = HttpResponse {
            status,
            headers,
            body: Bytes::from(failed_body),
        };
        connection.after_response(method, &url, &finished);

        if !success {
            return Err(http_error(&finished).into());
        }

        Ok(ResponseBody::Empty)
    }
}

impl fmt::Debug for ApiTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiTransport")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn http_error(response: &HttpResponse) -> TransportError {
    TransportError::Http {
        status: response.status,
        body: response.text(),
    }
}

/// Builds the per-request connection: error logging first, then the
/// caller's hook.
fn connect(config: &StabilityConfig, multipart: bool) -> Connection {
    let mut builder = ConnectionBuilder::new(config.request_timeout).multipart(multipart);
    if config.log_errors {
        builder.use_middleware(ErrorLogger);
    }
    if let Some(customizer) = config.transport_customizer() {
        customizer(&mut builder);
    }
    builder.build()
}

/// Authorization and JSON content type, with the configured extra headers
/// merged over them. Fails before any I/O when the credential is missing.
fn default_headers(config: &StabilityConfig) -> StabilityResult<HashMap<String, String>> {
    let mut headers = HashMap::new();
    headers.insert(
        "Authorization".to_string(),
        format!("Bearer {}", config.api_key()?),
    );
    headers.insert("Content-Type".to_string(), JSON_CONTENT_TYPE.to_string());
    merge_headers(&mut headers, config.extra_headers.clone());
    Ok(headers)
}

/// Inserts `extra` into `headers`; names compare case-insensitively and the
/// incoming value wins.
fn merge_headers<I, K, V>(headers: &mut HashMap<String, String>, extra: I)
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    for (name, value) in extra {
        let name = name.into();
        headers.retain(|existing, _| !existing.eq_ignore_ascii_case(&name));
        headers.insert(name, value.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::StabilityError;
    use crate::mocks::{MockResponse, MockTransport};
    use crate::transport::{EventKind, Middleware, MultipartPart, StreamEvent};
    use crate::types::FileRef;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn setup(configure: impl FnOnce(&mut StabilityConfig)) -> (Arc<MockTransport>, ApiTransport) {
        let mut config = StabilityConfig::new();
        config.set_api_key("sk-test");
        configure(&mut config);
        let mock = Arc::new(MockTransport::new());
        let api = ApiTransport::new(ConfigHandle::new(config), mock.clone());
        (mock, api)
    }

    #[tokio::test]
    async fn test_get_uses_default_headers_and_joined_url() {
        let (mock, api) = setup(|config| {
            config.extra_headers.insert("X-Client".to_string(), "tests".to_string());
        });
        mock.queue_json(&json!({"engines": []}));

        let body = api.get("/engines/list").await.unwrap();

        assert_eq!(body, ResponseBody::Json(json!({"engines": []})));
        let request = mock.last_request().unwrap();
        assert_eq!(request.method, HttpMethod::Get);
        assert_eq!(request.url, "https://api.stability.ai/v2beta/engines/list");
        assert_eq!(request.header("authorization"), Some("Bearer sk-test"));
        assert_eq!(request.header("content-type"), Some("application/json"));
        assert_eq!(request.header("x-client"), Some("tests"));
        assert_eq!(request.timeout, Duration::from_secs(120));
    }

    #[tokio::test]
    async fn test_missing_key_fails_before_sending() {
        let (mock, api) = setup(|config| config.clear_api_key());

        let err = api.delete("/x").await.unwrap_err();

        assert!(matches!(err, StabilityError::Configuration { .. }));
        assert_eq!(mock.request_count(), 0);
    }

    #[tokio::test]
    async fn test_non_2xx_is_http_error() {
        let (mock, api) = setup(|_| {});
        mock.queue_error(403, "forbidden");

        let err = api.get("/x").await.unwrap_err();

        assert_eq!(err.status_code(), Some(403));
        assert_eq!(err.api_message().as_deref(), Some("forbidden"));
    }

    #[tokio::test]
    async fn test_post_serializes_parameters() {
        let (mock, api) = setup(|_| {});
        mock.queue_json(&json!({"id": "gen-1"}));

        api.post("/generation", Parameters::new().with("prompt", "cat").with("seed", 7))
            .await
            .unwrap();

        let request = mock.last_request().unwrap();
        assert!(!request.streaming);
        assert_eq!(request.json_body(), Some(json!({"prompt": "cat", "seed": 7})));
    }

    #[tokio::test]
    async fn test_post_with_sink_streams_events() {
        let (mock, api) = setup(|_| {});
        mock.queue(MockResponse::streaming(vec![
            "data: {\"a\":1}\nerror: {\"b\":2}\ndata: not-json",
        ]));

        let seen = Arc::new(Mutex::new(Vec::<StreamEvent>::new()));
        let sink = {
            let seen = Arc::clone(&seen);
            EventSink::new(move |event| seen.lock().push(event))
        };

        let body = api
            .post("/chat", Parameters::new().with("prompt", "hi").with("stream", sink))
            .await
            .unwrap();

        assert_eq!(body, ResponseBody::Empty);
        let data: Vec<_> = seen.lock().iter().map(|e| e.data.clone()).collect();
        assert_eq!(data, vec![json!({"a": 1}), json!({"b": 2})]);

        let request = mock.last_request().unwrap();
        assert!(request.streaming);
        assert_eq!(request.json_body(), Some(json!({"prompt": "hi", "stream": true})));
    }

    #[tokio::test]
    async fn test_streaming_failure_is_http_error() {
        let (mock, api) = setup(|_| {});
        mock.queue(
            MockResponse::streaming(vec!["error: {\"message\":\"rate limited\"}\n"])
                .with_status(429),
        );

        let seen = Arc::new(Mutex::new(Vec::<StreamEvent>::new()));
        let sink = {
            let seen = Arc::clone(&seen);
            EventSink::new(move |event| seen.lock().push(event))
        };

        let err = api
            .post("/chat", Parameters::new().with("stream", sink))
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), Some(429));
        match &err {
            StabilityError::Transport(TransportError::Http { body, .. }) => {
                assert!(body.contains("rate limited"));
            }
            other => panic!("Expected HTTP error, got {:?}", other),
        }

        let events = seen.lock();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::Error);
        assert_eq!(events[0].data, json!({"message": "rate limited"}));
    }

    #[tokio::test]
    async fn test_json_post_rejects_files() {
        let (mock, api) = setup(|_| {});

        let err = api
            .post("/x", Parameters::new().with("image", FileRef::new("a.png")))
            .await
            .unwrap_err();

        assert!(matches!(err, StabilityError::Argument { .. }));
        assert_eq!(mock.request_count(), 0);
    }

    #[tokio::test]
    async fn test_multipart_header_precedence() {
        let (mock, api) = setup(|config| {
            config.extra_headers.insert("Accept".to_string(), "text/plain".to_string());
            config.extra_headers.insert("X-Trace".to_string(), "1".to_string());
        });
        mock.queue(MockResponse::binary("image/png", b"\x89PNG".to_vec()));

        let mut call_headers = HashMap::new();
        call_headers.insert("accept".to_string(), "image/*".to_string());
        call_headers.insert("content-type".to_string(), "text/html".to_string());

        let body = api
            .multipart_post(
                "/stable-image/generate/core",
                call_headers,
                Some(Parameters::new().with("prompt", "cat").with("seed", 3)),
            )
            .await
            .unwrap();

        assert!(matches!(body, ResponseBody::Binary { .. }));
        let request = mock.last_request().unwrap();
        assert!(request.multipart);
        assert_eq!(request.header("accept"), Some("image/*"));
        assert_eq!(request.header("x-trace"), Some("1"));
        assert_eq!(request.header("content-type"), Some("multipart/form-data"));
        assert_eq!(request.headers.len(), 4);
        assert_eq!(
            request.body,
            RequestBody::Multipart(vec![
                MultipartPart::Text {
                    name: "prompt".to_string(),
                    value: "cat".to_string(),
                },
                MultipartPart::Text {
                    name: "seed".to_string(),
                    value: "3".to_string(),
                },
            ])
        );
    }

    #[tokio::test]
    async fn test_multipart_without_parameters() {
        let (mock, api) = setup(|_| {});
        mock.queue(MockResponse::new(200));

        let body = api.multipart_post("/x", HashMap::new(), None).await.unwrap();

        assert_eq!(body, ResponseBody::Empty);
        assert_eq!(mock.last_request().unwrap().body, RequestBody::Multipart(Vec::new()));
    }

    #[derive(Clone)]
    struct Counter(Arc<AtomicUsize>);

    impl Middleware for Counter {
        fn on_request(&self, _request: &HttpRequest) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_customizer_runs_per_connection() {
        let hooks = Arc::new(AtomicUsize::new(0));
        let requests = Arc::new(AtomicUsize::new(0));
        let (mock, api) = {
            let hooks = Arc::clone(&hooks);
            let requests = Arc::clone(&requests);
            setup(move |config| {
                config.transport(move |builder| {
                    hooks.fetch_add(1, Ordering::SeqCst);
                    builder.set_timeout(Duration::from_secs(9));
                    builder.use_middleware(Counter(Arc::clone(&requests)));
                });
            })
        };
        mock.set_default(MockResponse::json(&json!({"ok": true})));

        api.get("/a").await.unwrap();
        api.get("/b").await.unwrap();

        assert_eq!(hooks.load(Ordering::SeqCst), 2);
        assert_eq!(requests.load(Ordering::SeqCst), 2);
        assert_eq!(mock.last_request().unwrap().timeout, Duration::from_secs(9));
    }

    #[tokio::test]
    async fn test_config_changes_apply_to_next_request() {
        let (mock, api) = setup(|_| {});
        mock.set_default(MockResponse::json(&json!({"ok": true})));

        api.get("/a").await.unwrap();
        api.config().update(|config| {
            config.base_url = "http://localhost:9000".to_string();
            config.set_api_key("sk-rotated");
        });
        api.get("/a").await.unwrap();

        let request = mock.last_request().unwrap();
        assert_eq!(request.url, "http://localhost:9000/v2beta/a");
        assert_eq!(request.header("authorization"), Some("Bearer sk-rotated"));
    }

    #[test]
    fn test_error_logger_is_installed_first() {
        let mut config = StabilityConfig::new();
        config.log_errors = true;
        config.transport(|builder| {
            assert_eq!(builder.middleware_count(), 1);
        });
        connect(&config, false);
    }

    #[test]
    fn test_merge_headers_ignores_case() {
        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        merge_headers(&mut headers, [("content-type", "text/plain")]);

        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("content-type").map(String::as_str), Some("text/plain"));
    }
}
