//! Error types for the Stability client.
//!
//! Failures are layered: configuration problems are detected before any I/O,
//! argument problems before a request is built, transport problems while
//! talking to the server, and server problems after a response was decoded.

use thiserror::Error;

use crate::transport::TransportError;

/// Result type alias for Stability operations.
pub type StabilityResult<T> = Result<T, StabilityError>;

/// Message used when the API answers with a blank body.
pub const EMPTY_RESPONSE_MESSAGE: &str =
    "Empty response from Stability. Might be worth retrying once or twice.";

/// Message used when the credential is read before being set.
pub const MISSING_API_KEY_MESSAGE: &str = "Stability AI api key missing!";

/// Error type for Stability client operations.
#[derive(Debug, Error)]
pub enum StabilityError {
    /// Configuration error (missing credential, invalid base URL, ...).
    #[error("Configuration error: {message}")]
    Configuration {
        /// Error message describing the configuration issue.
        message: String,
    },

    /// The caller supplied an invalid combination of parameters.
    #[error("Invalid argument: {message}")]
    Argument {
        /// Error message.
        message: String,
        /// The parameter that caused the error.
        param: Option<String>,
    },

    /// HTTP-level failure: non-2xx status, connection failure or timeout.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The API returned an empty body or reported an error inside the body.
    #[error("{message}")]
    Server {
        /// Message reported by the API, or the generic retry message.
        message: String,
    },

    /// The request body could not be serialized.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message.
        message: String,
    },
}

impl StabilityError {
    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        StabilityError::Configuration {
            message: message.into(),
        }
    }

    /// Creates an argument error.
    pub fn argument(message: impl Into<String>) -> Self {
        StabilityError::Argument {
            message: message.into(),
            param: None,
        }
    }

    /// Creates an argument error naming the offending parameter.
    pub fn argument_param(message: impl Into<String>, param: impl Into<String>) -> Self {
        StabilityError::Argument {
            message: message.into(),
            param: Some(param.into()),
        }
    }

    /// Creates a server error.
    pub fn server(message: impl Into<String>) -> Self {
        StabilityError::Server {
            message: message.into(),
        }
    }

    /// Creates the server error raised for blank responses.
    pub fn empty_response() -> Self {
        Self::server(EMPTY_RESPONSE_MESSAGE)
    }

    /// Returns the HTTP status code for HTTP failures.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            StabilityError::Transport(TransportError::Http { status, .. }) => Some(*status),
            _ => None,
        }
    }

    /// Extracts the API's own message from an HTTP error body, if any.
    ///
    /// Understands both `{"error": {"message": ..}}` and the
    /// `{"name": .., "errors": [..]}` shape used by the v2beta endpoints.
    pub fn api_message(&self) -> Option<String> {
        match self {
            StabilityError::Transport(TransportError::Http { body, .. }) => {
                let parsed: ApiErrorResponse = serde_json::from_str(body).ok()?;
                parsed.message()
            }
            StabilityError::Server { message } => Some(message.clone()),
            _ => None,
        }
    }

    /// Returns true when the failure happened before any request was sent.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            StabilityError::Configuration { .. }
                | StabilityError::Argument { .. }
                | StabilityError::Serialization { .. }
        )
    }
}

/// Error body returned by the API for rejected requests.
#[derive(Debug, Default, serde::Deserialize)]
pub struct ApiErrorResponse {
    /// Request identifier.
    #[serde(default)]
    pub id: Option<String>,
    /// Short error name, e.g. `bad_request`.
    #[serde(default)]
    pub name: Option<String>,
    /// Human readable error list.
    #[serde(default)]
    pub errors: Vec<String>,
    /// Nested error object used by some endpoints.
    #[serde(default)]
    pub error: Option<ApiErrorDetail>,
}

/// Nested error detail.
#[derive(Debug, Default, serde::Deserialize)]
pub struct ApiErrorDetail {
    /// The error message.
    #[serde(default)]
    pub message: Option<String>,
}

impl ApiErrorResponse {
    /// Best message available in the body.
    pub fn message(&self) -> Option<String> {
        if let Some(message) = self.error.as_ref().and_then(|e| e.message.clone()) {
            return Some(message);
        }
        if !self.errors.is_empty() {
            return Some(self.errors.join("; "));
        }
        self.name.clone()
    }
}

impl From<reqwest::Error> for StabilityError {
    fn from(err: reqwest::Error) -> Self {
        StabilityError::Transport(TransportError::from(err))
    }
}

impl From<serde_json::Error> for StabilityError {
    fn from(err: serde_json::Error) -> Self {
        StabilityError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<url::ParseError> for StabilityError {
    fn from(err: url::ParseError) -> Self {
        StabilityError::Configuration {
            message: format!("Invalid URL: {}", err),
        }
    }
}
