//! Integration tests for streamed POST requests.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::*;
use integrations_stability::prelude::*;
use integrations_stability::{EventKind, ResponseBody};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::body_json;
use wiremock::ResponseTemplate;

fn collecting_sink() -> (EventSink, Arc<Mutex<Vec<StreamEvent>>>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = {
        let events = Arc::clone(&events);
        EventSink::new(move |event| events.lock().push(event))
    };
    (sink, events)
}

#[tokio::test]
async fn test_stream_delivers_events_in_order() {
    let mock_server = setup_mock_server().await;

    mock_with_auth("POST", "/generation/stream")
        .and(body_json(json!({"prompt": "a cat", "stream": true})))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            "data: {\"a\":1}\nerror: {\"b\":2}\ndata: not-json",
            "text/event-stream",
        ))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (sink, events) = collecting_sink();
    let client = client_for(&mock_server);

    let body = client
        .http()
        .post(
            "/generation/stream",
            Parameters::new().with("prompt", "a cat").with("stream", sink),
        )
        .await
        .unwrap();

    assert_eq!(body, ResponseBody::Empty);
    let events = events.lock();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].kind, EventKind::Data);
    assert_eq!(events[0].data, json!({"a": 1}));
    assert_eq!(events[1].kind, EventKind::Error);
    assert_eq!(events[1].data, json!({"b": 2}));
}

#[tokio::test]
async fn test_stream_http_error_is_raised() {
    let mock_server = setup_mock_server().await;

    mock_with_auth("POST", "/generation/stream")
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "name": "too_many_requests",
            "errors": ["rate limit exceeded"]
        })))
        .mount(&mock_server)
        .await;

    let (sink, events) = collecting_sink();
    let err = client_for(&mock_server)
        .http()
        .post("/generation/stream", Parameters::new().with("stream", sink))
        .await
        .unwrap_err();

    assert_eq!(err.status_code(), Some(429));
    assert_eq!(err.api_message().as_deref(), Some("rate limit exceeded"));
    assert!(events.lock().is_empty());
}

#[tokio::test]
async fn test_stream_error_events_reach_sink_before_failure() {
    let mock_server = setup_mock_server().await;

    mock_with_auth("POST", "/generation/stream")
        .respond_with(ResponseTemplate::new(429).set_body_raw(
            "error: {\"message\":\"rate limited\"}\n",
            "text/event-stream",
        ))
        .mount(&mock_server)
        .await;

    let (sink, events) = collecting_sink();
    let err = client_for(&mock_server)
        .http()
        .post("/generation/stream", Parameters::new().with("stream", sink))
        .await
        .unwrap_err();

    assert_eq!(err.status_code(), Some(429));
    let events = events.lock();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, EventKind::Error);
    assert_eq!(events[0].data, json!({"message": "rate limited"}));
}

#[tokio::test]
async fn test_plain_post_returns_json() {
    let mock_server = setup_mock_server().await;

    mock_with_auth("POST", "/generation/text-to-image")
        .and(body_json(json!({"prompt": "a cat", "stream": false})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "gen-1"})))
        .mount(&mock_server)
        .await;

    let body = client_for(&mock_server)
        .http()
        .post(
            "/generation/text-to-image",
            Parameters::new().with("prompt", "a cat").with("stream", false),
        )
        .await
        .unwrap();

    assert_eq!(body, ResponseBody::Json(json!({"id": "gen-1"})));
}

#[tokio::test]
async fn test_sink_under_other_key_is_rejected() {
    let mock_server = setup_mock_server().await;
    let (sink, _) = collecting_sink();

    let err = client_for(&mock_server)
        .http()
        .post("/generation/stream", Parameters::new().with("on_event", sink))
        .await
        .unwrap_err();

    assert!(matches!(err, StabilityError::Argument { .. }));
    assert!(mock_server.received_requests().await.unwrap_or_default().is_empty());
}
