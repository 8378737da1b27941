//! Logging middleware for the transport.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

use crate::transport::{HttpMethod, HttpRequest, HttpResponse, Middleware, RequestBody};

const MAX_LOGGED_BODY: usize = 1000;

static SECRET_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"(?i)bearer\s+[a-z0-9._~+/=-]+", "Bearer [REDACTED]"),
        (r"sk-[A-Za-z0-9_-]+", "sk-***"),
    ]
    .into_iter()
    .filter_map(|(pattern, replacement)| Regex::new(pattern).ok().map(|re| (re, replacement)))
    .collect()
});

/// Masks credentials in free text.
pub fn redact(text: &str) -> String {
    SECRET_PATTERNS
        .iter()
        .fold(text.to_string(), |acc, (re, replacement)| {
            re.replace_all(&acc, *replacement).into_owned()
        })
}

fn excerpt(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let truncated: String = text.chars().take(MAX_LOGGED_BODY).collect();
    redact(&truncated)
}

fn describe_body(body: &RequestBody) -> String {
    match body {
        RequestBody::None => "<empty>".to_string(),
        RequestBody::Json(bytes) => excerpt(bytes),
        RequestBody::Multipart(parts) => {
            let names: Vec<&str> = parts.iter().map(|part| part.name()).collect();
            format!("multipart [{}]", names.join(", "))
        }
    }
}

/// Logs every request and response at `debug` level.
///
/// Credentials are masked in headers and bodies.
///
/// ```
/// use integrations_stability::configure;
/// use integrations_stability::observability::RequestLogger;
///
/// configure(|config| {
///     config.transport(|builder| {
///         builder.use_middleware(RequestLogger::new());
///     });
/// });
/// ```
#[derive(Debug, Clone, Default)]
pub struct RequestLogger {
    log_bodies: bool,
}

impl RequestLogger {
    /// Creates a logger that records headers and statuses only.
    pub fn new() -> Self {
        Self::default()
    }

    /// Also records (truncated, redacted) bodies.
    pub fn with_bodies(mut self) -> Self {
        self.log_bodies = true;
        self
    }
}

impl Middleware for RequestLogger {
    fn on_request(&self, request: &HttpRequest) {
        let headers: BTreeMap<&str, String> = request
            .headers
            .iter()
            .map(|(name, value)| (name.as_str(), redact(value)))
            .collect();

        if self.log_bodies {
            tracing::debug!(
                method = %request.method,
                url = %request.url,
                headers = ?headers,
                body = %describe_body(&request.body),
                "Outgoing request"
            );
        } else {
            tracing::debug!(
                method = %request.method,
                url = %request.url,
                headers = ?headers,
                "Outgoing request"
            );
        }
    }

    fn on_response(&self, method: HttpMethod, url: &str, response: &HttpResponse) {
        if self.log_bodies {
            tracing::debug!(
                method = %method,
                url = url,
                status = response.status,
                body = %excerpt(&response.body),
                "Incoming response"
            );
        } else {
            tracing::debug!(
                method = %method,
                url = url,
                status = response.status,
                bytes = response.body.len(),
                "Incoming response"
            );
        }
    }
}

/// Logs failed responses at `error` level.
///
/// Installed automatically when `log_errors` is enabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorLogger;

impl Middleware for ErrorLogger {
    fn on_response(&self, method: HttpMethod, url: &str, response: &HttpResponse) {
        if response.is_success() {
            return;
        }
        tracing::error!(
            method = %method,
            url = url,
            status = response.status,
            body = %excerpt(&response.body),
            "Stability request failed"
        );
    }
}
