//! Response decoding and normalization.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use serde_json::Value;
use std::ops::Index;

use super::{HttpResponse, TransportError};
use crate::errors::{StabilityError, StabilityResult};

/// Body of a successful response, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    /// JSON document.
    Json(Value),
    /// Raw bytes of a non-JSON response, typically an image.
    Binary {
        /// Declared content type.
        content_type: Option<String>,
        /// Response bytes.
        data: Bytes,
        /// `finish-reason` header, when present.
        finish_reason: Option<String>,
        /// `seed` header, when present.
        seed: Option<u64>,
    },
    /// Zero-length body, or a streamed call.
    Empty,
}

impl ResponseBody {
    /// Decodes a buffered response.
    ///
    /// The body is parsed as JSON only when the content type says so.
    pub fn decode(response: &HttpResponse) -> Result<Self, TransportError> {
        if response.body.is_empty() {
            return Ok(ResponseBody::Empty);
        }

        let content_type = response.content_type().map(str::to_string);
        if content_type.as_deref().map_or(false, is_json_content_type) {
            return serde_json::from_slice(&response.body)
                .map(ResponseBody::Json)
                .map_err(|e| TransportError::InvalidResponse {
                    message: format!("Failed to parse JSON body: {}", e),
                });
        }

        Ok(ResponseBody::Binary {
            content_type,
            data: response.body.clone(),
            finish_reason: response.headers.get("finish-reason").cloned(),
            seed: response
                .headers
                .get("seed")
                .and_then(|seed| seed.trim().parse().ok()),
        })
    }

    /// Returns true for bodies that carry nothing: no bytes, `null`, `false`,
    /// whitespace-only strings, empty objects and empty arrays.
    pub fn is_blank(&self) -> bool {
        match self {
            ResponseBody::Empty => true,
            ResponseBody::Json(value) => is_blank_value(value),
            ResponseBody::Binary { data, .. } => data.iter().all(u8::is_ascii_whitespace),
        }
    }

    /// Returns the JSON document, if any.
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ResponseBody::Json(value) => Some(value),
            _ => None,
        }
    }
}

fn is_json_content_type(content_type: &str) -> bool {
    match content_type.parse::<mime::Mime>() {
        Ok(mime) => {
            mime.subtype() == mime::JSON || mime.suffix().map_or(false, |s| s == mime::JSON)
        }
        Err(_) => false,
    }
}

fn is_blank_value(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Well-known keys of generation responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseKey {
    /// Base64 encoded image.
    Image,
    /// Why generation stopped, e.g. `SUCCESS` or `CONTENT_FILTERED`.
    FinishReason,
    /// Seed used for the generation.
    Seed,
    /// Error list.
    Errors,
    /// Error name.
    Name,
    /// Request identifier.
    Id,
}

impl ResponseKey {
    /// Returns the JSON key.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseKey::Image => "image",
            ResponseKey::FinishReason => "finish_reason",
            ResponseKey::Seed => "seed",
            ResponseKey::Errors => "errors",
            ResponseKey::Name => "name",
            ResponseKey::Id => "id",
        }
    }
}

impl AsRef<str> for ResponseKey {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

static NULL: Value = Value::Null;

/// JSON document with lenient key lookup.
///
/// Keys match exactly first, then ignoring ASCII case.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonBody(Value);

impl JsonBody {
    /// Wraps a JSON document.
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Looks up a top-level key.
    pub fn get<K: AsRef<str>>(&self, key: K) -> Option<&Value> {
        lookup(&self.0, key.as_ref())
    }

    /// Follows a path of keys through nested objects.
    pub fn pointer<K: AsRef<str>>(&self, path: &[K]) -> Option<&Value> {
        path.iter()
            .try_fold(&self.0, |value, key| lookup(value, key.as_ref()))
    }

    /// Returns true if the top-level key is present.
    pub fn contains_key<K: AsRef<str>>(&self, key: K) -> bool {
        self.get(key).is_some()
    }

    /// Borrows the document.
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Unwraps the document.
    pub fn into_inner(self) -> Value {
        self.0
    }
}

fn lookup<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    let map = value.as_object()?;
    map.get(key).or_else(|| {
        map.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    })
}

impl<K: AsRef<str>> Index<K> for JsonBody {
    type Output = Value;

    fn index(&self, key: K) -> &Value {
        self.get(key).unwrap_or(&NULL)
    }
}

/// Normalized result of a generate call.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiResponse {
    /// JSON document.
    Json(JsonBody),
    /// Raw image bytes.
    Binary {
        /// Declared content type.
        content_type: Option<String>,
        /// Image bytes.
        data: Bytes,
        /// `finish-reason` header, when present.
        finish_reason: Option<String>,
        /// `seed` header, when present.
        seed: Option<u64>,
    },
}

impl ApiResponse {
    /// Looks up a top-level JSON key; always `None` for binary responses.
    pub fn get<K: AsRef<str>>(&self, key: K) -> Option<&Value> {
        match self {
            ApiResponse::Json(body) => body.get(key),
            ApiResponse::Binary { .. } => None,
        }
    }

    /// Returns the JSON body, if any.
    pub fn as_json(&self) -> Option<&JsonBody> {
        match self {
            ApiResponse::Json(body) => Some(body),
            ApiResponse::Binary { .. } => None,
        }
    }

    /// Returns the declared content type of binary responses.
    pub fn content_type(&self) -> Option<&str> {
        match self {
            ApiResponse::Json(_) => Some("application/json"),
            ApiResponse::Binary { content_type, .. } => content_type.as_deref(),
        }
    }

    /// Returns the finish reason from the body or the response headers.
    pub fn finish_reason(&self) -> Option<&str> {
        match self {
            ApiResponse::Json(body) => body.get(ResponseKey::FinishReason).and_then(Value::as_str),
            ApiResponse::Binary { finish_reason, .. } => finish_reason.as_deref(),
        }
    }

    /// Returns the seed from the body or the response headers.
    pub fn seed(&self) -> Option<u64> {
        match self {
            ApiResponse::Json(body) => body.get(ResponseKey::Seed).and_then(Value::as_u64),
            ApiResponse::Binary { seed, .. } => *seed,
        }
    }

    /// Returns the image bytes, decoding the base64 `image` of JSON responses.
    pub fn image_bytes(&self) -> StabilityResult<Bytes> {
        match self {
            ApiResponse::Binary { data, .. } => Ok(data.clone()),
            ApiResponse::Json(body) => {
                let encoded = body
                    .get(ResponseKey::Image)
                    .and_then(Value::as_str)
                    .ok_or_else(|| TransportError::InvalidResponse {
                        message: "Response carries no image".to_string(),
                    })?;
                let decoded = STANDARD
                    .decode(encoded)
                    .map_err(|e| TransportError::InvalidResponse {
                        message: format!("Invalid base64 image: {}", e),
                    })?;
                Ok(Bytes::from(decoded))
            }
        }
    }
}

impl<K: AsRef<str>> Index<K> for ApiResponse {
    type Output = Value;

    fn index(&self, key: K) -> &Value {
        self.get(key).unwrap_or(&NULL)
    }
}

/// Turns decoded bodies into results or errors.
#[derive(Debug, Default, Clone, Copy)]
pub struct ResponseNormalizer;

impl ResponseNormalizer {
    /// Creates a normalizer.
    pub fn new() -> Self {
        Self
    }

    /// Fails on blank bodies and on bodies carrying `error.message`.
    pub fn normalize(&self, body: ResponseBody) -> StabilityResult<ApiResponse> {
        if body.is_blank() {
            return Err(StabilityError::empty_response());
        }

        match body {
            ResponseBody::Json(value) => {
                if let Some(message) = embedded_error(&value) {
                    return Err(StabilityError::server(message));
                }
                Ok(ApiResponse::Json(JsonBody(value)))
            }
            ResponseBody::Binary {
                content_type,
                data,
                finish_reason,
                seed,
            } => Ok(ApiResponse::Binary {
                content_type,
                data,
                finish_reason,
                seed,
            }),
            ResponseBody::Empty => Err(StabilityError::empty_response()),
        }
    }
}

/// `error.message`, matched on exact keys.
fn embedded_error(value: &Value) -> Option<String> {
    let message = value.get("error").and_then(|error| error.get("message"))?;
    if is_blank_value(message) {
        return None;
    }
    Some(match message {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    })
}
