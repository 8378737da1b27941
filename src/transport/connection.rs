//! Per-request connection settings and middleware.

use reqwest::ClientBuilder;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::{HttpMethod, HttpRequest, HttpResponse};

type ClientHook = Arc<dyn Fn(ClientBuilder) -> ClientBuilder + Send + Sync>;

/// Observer around each HTTP exchange.
///
/// Middleware runs in installation order, before the status check that turns
/// non-2xx responses into errors.
pub trait Middleware: Send + Sync {
    /// Called before the request is sent.
    fn on_request(&self, _request: &HttpRequest) {}

    /// Called once the response is available. Streamed success responses are
    /// reported with an empty body.
    fn on_response(&self, _method: HttpMethod, _url: &str, _response: &HttpResponse) {}
}

/// Builder handed to the transport hook once per connection.
pub struct ConnectionBuilder {
    timeout: Duration,
    multipart: bool,
    client_hooks: Vec<ClientHook>,
    middleware: Vec<Arc<dyn Middleware>>,
}

impl ConnectionBuilder {
    /// Creates a builder with the given timeout.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            multipart: false,
            client_hooks: Vec::new(),
            middleware: Vec::new(),
        }
    }

    /// Marks the connection as carrying a multipart body.
    pub fn multipart(mut self, multipart: bool) -> Self {
        self.multipart = multipart;
        self
    }

    /// Returns true if the connection will carry a multipart body.
    pub fn is_multipart(&self) -> bool {
        self.multipart
    }

    /// Returns the timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Overrides the timeout.
    pub fn set_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.timeout = timeout;
        self
    }

    /// Adjusts the underlying reqwest client builder.
    pub fn client<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(ClientBuilder) -> ClientBuilder + Send + Sync + 'static,
    {
        self.client_hooks.push(Arc::new(hook));
        self
    }

    /// Sets the `User-Agent` sent by the client.
    pub fn user_agent(&mut self, user_agent: impl Into<String>) -> &mut Self {
        let user_agent = user_agent.into();
        self.client(move |builder| builder.user_agent(user_agent.clone()))
    }

    /// Appends a middleware.
    pub fn use_middleware<M>(&mut self, middleware: M) -> &mut Self
    where
        M: Middleware + 'static,
    {
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// Number of installed middleware.
    pub fn middleware_count(&self) -> usize {
        self.middleware.len()
    }

    /// Finalizes the connection.
    pub fn build(self) -> Connection {
        Connection {
            timeout: self.timeout,
            multipart: self.multipart,
            client_hooks: self.client_hooks,
            middleware: self.middleware,
        }
    }
}

impl fmt::Debug for ConnectionBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionBuilder")
            .field("timeout", &self.timeout)
            .field("multipart", &self.multipart)
            .field("client_hooks", &self.client_hooks.len())
            .field("middleware", &self.middleware.len())
            .finish()
    }
}

/// Settings for a single request.
pub struct Connection {
    timeout: Duration,
    multipart: bool,
    client_hooks: Vec<ClientHook>,
    middleware: Vec<Arc<dyn Middleware>>,
}

impl Connection {
    /// Returns the timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns true if the connection carries a multipart body.
    pub fn is_multipart(&self) -> bool {
        self.multipart
    }

    /// Applies the registered client hooks in order.
    pub fn apply_client_hooks(&self, builder: ClientBuilder) -> ClientBuilder {
        self.client_hooks
            .iter()
            .fold(builder, |builder, hook| hook(builder))
    }

    pub(crate) fn before_request(&self, request: &HttpRequest) {
        for middleware in &self.middleware {
            middleware.on_request(request);
        }
    }

    pub(crate) fn after_response(&self, method: HttpMethod, url: &str, response: &HttpResponse) {
        for middleware in &self.middleware {
            middleware.on_response(method, url, response);
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("timeout", &self.timeout)
            .field("multipart", &self.multipart)
            .field("middleware", &self.middleware.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default, Clone)]
    struct Recorder {
        seen: Arc<Mutex<Vec<String>>>,
        label: &'static str,
    }

    impl Middleware for Recorder {
        fn on_request(&self, request: &HttpRequest) {
            self.seen
                .lock()
                .unwrap()
                .push(format!("{} request {}", self.label, request.url));
        }

        fn on_response(&self, _method: HttpMethod, _url: &str, response: &HttpResponse) {
            self.seen
                .lock()
                .unwrap()
                .push(format!("{} response {}", self.label, response.status));
        }
    }

    #[test]
    fn test_middleware_runs_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut builder = ConnectionBuilder::new(Duration::from_secs(1));
        builder
            .use_middleware(Recorder {
                seen: Arc::clone(&seen),
                label: "first",
            })
            .use_middleware(Recorder {
                seen: Arc::clone(&seen),
                label: "second",
            });
        let connection = builder.build();

        let request = HttpRequest::new(HttpMethod::Get, "https://example.com/x");
        connection.before_request(&request);
        connection.after_response(
            HttpMethod::Get,
            &request.url,
            &HttpResponse {
                status: 200,
                headers: HashMap::new(),
                body: Bytes::new(),
            },
        );

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                "first request https://example.com/x",
                "second request https://example.com/x",
                "first response 200",
                "second response 200",
            ]
        );
    }

    #[test]
    fn test_timeout_override() {
        let mut builder = ConnectionBuilder::new(Duration::from_secs(120));
        builder.set_timeout(Duration::from_secs(5));
        assert_eq!(builder.build().timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_client_hooks_are_kept() {
        let mut builder = ConnectionBuilder::new(Duration::from_secs(1)).multipart(true);
        builder.user_agent("tests").client(|b| b.tcp_nodelay(true));
        let connection = builder.build();

        assert!(connection.is_multipart());
        assert!(connection
            .apply_client_hooks(ClientBuilder::new())
            .build()
            .is_ok());
    }
}
