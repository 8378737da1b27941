//! HTTP transport layer for the Stability client.
//!
//! [`ApiTransport`] is the request-building layer used by the services: it
//! resolves URLs and headers from the configuration, encodes JSON or multipart
//! bodies, routes streamed chunks through the [`EventDecoder`] and turns
//! non-2xx statuses into errors. The wire work itself sits behind the
//! [`HttpTransport`] trait so it can be replaced in tests.

mod api;
mod connection;
mod http;
mod multipart;
mod response;
mod streaming;

pub use api::ApiTransport;
pub use connection::{Connection, ConnectionBuilder, Middleware};
pub use http::{
    ByteStream, HttpMethod, HttpRequest, HttpResponse, HttpTransport, RequestBody,
    ReqwestTransport, StreamingResponse,
};
pub use multipart::MultipartEncoder;
pub use response::{ApiResponse, JsonBody, ResponseBody, ResponseKey, ResponseNormalizer};
pub use streaming::{EventDecoder, EventKind, EventScanner, EventSink, Fragment, StreamEvent};

use bytes::Bytes;
use std::time::Duration;

/// A part of a multipart form.
#[derive(Debug, Clone, PartialEq)]
pub enum MultipartPart {
    /// Text field.
    Text {
        /// Field name.
        name: String,
        /// Field value.
        value: String,
    },
    /// File upload field.
    File {
        /// Field name.
        name: String,
        /// File name sent in the content disposition.
        filename: String,
        /// Content type; `None` leaves it unspecified.
        content_type: Option<String>,
        /// File data.
        data: Bytes,
    },
}

impl MultipartPart {
    /// Returns the field name.
    pub fn name(&self) -> &str {
        match self {
            MultipartPart::Text { name, .. } | MultipartPart::File { name, .. } => name,
        }
    }
}

/// Transport error types.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The server answered with a non-2xx status.
    #[error("HTTP {status}: {body}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Raw response body.
        body: String,
    },

    /// Connection error.
    #[error("Connection error: {message}")]
    Connection {
        /// Error message.
        message: String,
    },

    /// Timeout error.
    #[error("Request timed out{}", .timeout.map(|t| format!(" after {:?}", t)).unwrap_or_default())]
    Timeout {
        /// Timeout that elapsed, when known.
        timeout: Option<Duration>,
    },

    /// Invalid response.
    #[error("Invalid response: {message}")]
    InvalidResponse {
        /// Error message.
        message: String,
    },

    /// A file to upload could not be read.
    #[error("Failed to read {path}: {message}")]
    File {
        /// Path of the file.
        path: String,
        /// Error message.
        message: String,
    },
}

impl TransportError {
    /// Maps a reqwest error, recording the timeout in effect.
    pub fn from_reqwest(err: reqwest::Error, timeout: Option<Duration>) -> Self {
        if err.is_timeout() {
            TransportError::Timeout { timeout }
        } else if err.is_connect() {
            TransportError::Connection {
                message: err.to_string(),
            }
        } else {
            TransportError::InvalidResponse {
                message: err.to_string(),
            }
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        TransportError::from_reqwest(err, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_display() {
        let error = TransportError::Timeout {
            timeout: Some(Duration::from_secs(120)),
        };
        assert_eq!(error.to_string(), "Request timed out after 120s");

        let error = TransportError::Timeout { timeout: None };
        assert_eq!(error.to_string(), "Request timed out");
    }

    #[test]
    fn test_http_display_carries_status_and_body() {
        let error = TransportError::Http {
            status: 403,
            body: "forbidden".to_string(),
        };
        assert_eq!(error.to_string(), "HTTP 403: forbidden");
    }

    #[test]
    fn test_part_name() {
        let part = MultipartPart::Text {
            name: "prompt".to_string(),
            value: "a cat".to_string(),
        };
        assert_eq!(part.name(), "prompt");
    }
}
