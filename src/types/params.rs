//! Request parameters.

use bytes::Bytes;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

use crate::errors::{StabilityError, StabilityResult};
use crate::transport::{EventSink, TransportError};

/// Key under which a streaming sink is accepted.
pub const STREAM_KEY: &str = "stream";

/// A file to upload.
#[derive(Debug, Clone, PartialEq)]
pub struct FileRef {
    path: PathBuf,
    contents: Option<Bytes>,
}

impl FileRef {
    /// References a file on disk; it is read when the request is encoded.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            contents: None,
        }
    }

    /// Wraps in-memory contents under the given file name.
    pub fn from_bytes(path: impl Into<PathBuf>, contents: impl Into<Bytes>) -> Self {
        Self {
            path: path.into(),
            contents: Some(contents.into()),
        }
    }

    /// Returns the path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the path as sent in the content disposition.
    pub fn file_name(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    /// Reads the file contents.
    pub async fn read(&self) -> StabilityResult<Bytes> {
        if let Some(contents) = &self.contents {
            return Ok(contents.clone());
        }

        let data = tokio::fs::read(&self.path).await.map_err(|e| TransportError::File {
            path: self.file_name(),
            message: e.to_string(),
        })?;
        Ok(Bytes::from(data))
    }
}

/// A single parameter value.
#[derive(Debug, Clone)]
pub enum ParamValue {
    /// Plain JSON value.
    Value(Value),
    /// File to upload.
    File(FileRef),
    /// Callback receiving streamed events.
    Stream(EventSink),
}

impl ParamValue {
    /// Returns the JSON value, if this is one.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            ParamValue::Value(value) => Some(value),
            _ => None,
        }
    }

    /// Returns false for missing-like values (`null` and `false`).
    pub fn is_truthy(&self) -> bool {
        !matches!(self, ParamValue::Value(Value::Null | Value::Bool(false)))
    }

    fn kind(&self) -> &'static str {
        match self {
            ParamValue::Value(_) => "value",
            ParamValue::File(_) => "file",
            ParamValue::Stream(_) => "stream callback",
        }
    }
}

macro_rules! impl_from_value {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for ParamValue {
                fn from(value: $ty) -> Self {
                    ParamValue::Value(Value::from(value))
                }
            }
        )*
    };
}

impl_from_value!(&str, String, bool, i32, i64, u32, u64, f32, f64);

impl From<Value> for ParamValue {
    fn from(value: Value) -> Self {
        ParamValue::Value(value)
    }
}

impl From<FileRef> for ParamValue {
    fn from(file: FileRef) -> Self {
        ParamValue::File(file)
    }
}

impl From<EventSink> for ParamValue {
    fn from(sink: EventSink) -> Self {
        ParamValue::Stream(sink)
    }
}

/// Ordered parameter mapping.
///
/// Insertion order is kept so multipart fields go out in the order they were
/// given. Inserting an existing key replaces its value in place.
#[derive(Debug, Clone, Default)]
pub struct Parameters {
    entries: Vec<(String, ParamValue)>,
}

impl Parameters {
    /// Creates an empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a parameter, builder style.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Inserts a parameter, returning the previous value.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<ParamValue>,
    ) -> Option<ParamValue> {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    /// Looks up a parameter.
    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Looks up a string parameter.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(ParamValue::as_value).and_then(Value::as_str)
    }

    /// Removes a parameter.
    pub fn remove(&mut self, key: &str) -> Option<ParamValue> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    /// Returns true if the key is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Returns true if the key is present with a value other than `null` or `false`.
    pub fn is_truthy(&self, key: &str) -> bool {
        self.get(key).map_or(false, ParamValue::is_truthy)
    }

    /// Merges `other` over `self`; keys in `other` win.
    pub fn merge(mut self, other: Parameters) -> Self {
        for (key, value) in other.entries {
            self.insert(key, value);
        }
        self
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no parameters.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over the parameters in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Detaches the streaming sink, if any, leaving `stream: true` in its place.
    ///
    /// A sink stored under any other key is rejected.
    pub fn take_stream_sink(&mut self) -> StabilityResult<Option<EventSink>> {
        if let Some((key, _)) = self
            .entries
            .iter()
            .find(|(k, v)| k != STREAM_KEY && matches!(v, ParamValue::Stream(_)))
        {
            return Err(StabilityError::argument_param(
                format!("stream callbacks are only accepted under `{}`", STREAM_KEY),
                key.clone(),
            ));
        }

        match self.get(STREAM_KEY) {
            Some(ParamValue::Stream(sink)) => {
                let sink = sink.clone();
                self.insert(STREAM_KEY, true);
                Ok(Some(sink))
            }
            _ => Ok(None),
        }
    }

    /// Converts into a JSON object.
    ///
    /// Files and stream callbacks cannot be represented and are rejected.
    pub fn into_json(self) -> StabilityResult<Value> {
        let mut object = Map::with_capacity(self.entries.len());
        for (key, value) in self.entries {
            match value {
                ParamValue::Value(value) => {
                    object.insert(key, value);
                }
                other => {
                    return Err(StabilityError::argument_param(
                        format!("a {} cannot be sent in a JSON body", other.kind()),
                        key,
                    ));
                }
            }
        }
        Ok(Value::Object(object))
    }
}

impl<K, V> FromIterator<(K, V)> for Parameters
where
    K: Into<String>,
    V: Into<ParamValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Parameters::new();
        for (key, value) in iter {
            params.insert(key, value);
        }
        params
    }
}

impl IntoIterator for Parameters {
    type Item = (String, ParamValue);
    type IntoIter = std::vec::IntoIter<(String, ParamValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
