//! Streamed event decoding.
//!
//! Streamed responses embed JSON objects behind `data: ` or `error: ` markers.
//! [`EventScanner`] finds the candidate objects in one chunk of text and
//! [`EventDecoder`] parses them, handing each event to an [`EventSink`].
//!
//! Chunks are scanned independently. An object split across two chunks is
//! not reassembled and is dropped like any other malformed fragment.

use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Marker an event was found behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// `data: {...}`
    Data,
    /// `error: {...}`
    Error,
}

impl EventKind {
    const ALL: [EventKind; 2] = [EventKind::Data, EventKind::Error];

    /// Returns the marker name.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Data => "data",
            EventKind::Error => "error",
        }
    }

    /// Lowercased marker including the opening brace.
    fn pattern(&self) -> &'static str {
        match self {
            EventKind::Data => "data: {",
            EventKind::Error => "error: {",
        }
    }
}

/// One decoded event.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamEvent {
    /// Marker the event was found behind.
    pub kind: EventKind,
    /// Parsed JSON payload.
    pub data: Value,
}

impl StreamEvent {
    /// Returns true for events found behind `error:`.
    pub fn is_error(&self) -> bool {
        self.kind == EventKind::Error
    }
}

/// Callback receiving decoded events.
#[derive(Clone)]
pub struct EventSink(Arc<dyn Fn(StreamEvent) + Send + Sync>);

impl EventSink {
    /// Wraps a callback.
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(StreamEvent) + Send + Sync + 'static,
    {
        Self(Arc::new(callback))
    }

    /// Delivers one event.
    pub fn emit(&self, event: StreamEvent) {
        (self.0)(event);
    }
}

impl fmt::Debug for EventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EventSink(..)")
    }
}

/// Candidate JSON object found in a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fragment<'a> {
    /// Marker the object follows.
    pub kind: EventKind,
    /// Text from the opening brace through the last closing brace on the line.
    pub json: &'a str,
    /// Byte offset of the marker in the chunk.
    pub offset: usize,
}

/// Lazy scanner over the fragments of one chunk.
///
/// A fragment starts at a case-insensitive `data: {` or `error: {` and extends
/// to the last `}` before the next newline, so nested braces stay inside the
/// fragment. Fragments never overlap; a marker with no closing brace on its
/// line is skipped.
pub struct EventScanner<'a> {
    text: &'a str,
    lowered: String,
    pos: usize,
}

impl<'a> EventScanner<'a> {
    /// Creates a scanner over `text`.
    pub fn new(text: &'a str) -> Self {
        Self {
            text,
            lowered: text.to_ascii_lowercase(),
            pos: 0,
        }
    }

    fn next_marker(&self) -> Option<(usize, EventKind)> {
        let rest = &self.lowered[self.pos..];
        EventKind::ALL
            .iter()
            .filter_map(|kind| rest.find(kind.pattern()).map(|i| (self.pos + i, *kind)))
            .min_by_key(|(start, _)| *start)
    }
}

impl<'a> Iterator for EventScanner<'a> {
    type Item = Fragment<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.pos < self.text.len() {
            let (start, kind) = self.next_marker()?;
            let brace = start + kind.pattern().len() - 1;
            let line_end = self.text[brace..]
                .find('\n')
                .map_or(self.text.len(), |i| brace + i);

            match self.text[brace + 1..line_end].rfind('}') {
                Some(rel) => {
                    let close = brace + 1 + rel;
                    self.pos = close + 1;
                    return Some(Fragment {
                        kind,
                        json: &self.text[brace..=close],
                        offset: start,
                    });
                }
                None => self.pos = start + 1,
            }
        }
        None
    }
}

/// Decodes streamed chunks into events.
#[derive(Debug, Default, Clone, Copy)]
pub struct EventDecoder;

impl EventDecoder {
    /// Creates a decoder.
    pub fn new() -> Self {
        Self
    }

    /// Decodes every well-formed event in `chunk`, in order.
    ///
    /// Fragments that are not valid JSON are dropped and scanning continues.
    pub fn events(&self, chunk: &[u8]) -> Vec<StreamEvent> {
        let text = String::from_utf8_lossy(chunk);
        EventScanner::new(&text)
            .filter_map(|fragment| match serde_json::from_str::<Value>(fragment.json) {
                Ok(data) => Some(StreamEvent {
                    kind: fragment.kind,
                    data,
                }),
                Err(e) => {
                    tracing::debug!(
                        error = %e,
                        kind = fragment.kind.as_str(),
                        offset = fragment.offset,
                        "Dropping malformed stream fragment"
                    );
                    None
                }
            })
            .collect()
    }

    /// Decodes `chunk` and delivers each event to `sink`. Returns the number
    /// of events delivered.
    pub fn decode(&self, chunk: &[u8], sink: &EventSink) -> usize {
        let events = self.events(chunk);
        let count = events.len();
        for event in events {
            sink.emit(event);
        }
        count
    }
}
