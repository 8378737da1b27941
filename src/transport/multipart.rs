//! Multipart form encoding.

use serde_json::Value;

use super::MultipartPart;
use crate::errors::{StabilityError, StabilityResult};
use crate::types::{ParamValue, Parameters};

/// Converts parameters into multipart form parts.
#[derive(Debug, Default, Clone, Copy)]
pub struct MultipartEncoder;

impl MultipartEncoder {
    /// Creates an encoder.
    pub fn new() -> Self {
        Self
    }

    /// Encodes every parameter, in order.
    ///
    /// Files become file parts named after their path, with no content type.
    /// Everything else becomes a text field.
    pub async fn encode(&self, params: &Parameters) -> StabilityResult<Vec<MultipartPart>> {
        let mut parts = Vec::with_capacity(params.len());

        for (name, value) in params.iter() {
            let part = match value {
                ParamValue::Value(value) => MultipartPart::Text {
                    name: name.to_string(),
                    value: text_value(value),
                },
                ParamValue::File(file) => MultipartPart::File {
                    name: name.to_string(),
                    filename: file.file_name(),
                    content_type: None,
                    data: file.read().await?,
                },
                ParamValue::Stream(_) => {
                    return Err(StabilityError::argument_param(
                        "stream callbacks are not supported for multipart requests",
                        name,
                    ));
                }
            };
            parts.push(part);
        }

        Ok(parts)
    }
}

fn text_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
