//! Integration tests for multipart uploads.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::*;
use integrations_stability::prelude::*;
use integrations_stability::{GenerationMode, Sd3Model};
use serde_json::json;
use std::collections::HashMap;
use std::io::Write;
use wiremock::matchers::{header, header_regex};
use wiremock::ResponseTemplate;

fn body_contains(body: &[u8], needle: &[u8]) -> bool {
    body.windows(needle.len()).any(|window| window == needle)
}

#[tokio::test]
async fn test_sd3_uploads_file_and_fields() {
    let mock_server = setup_mock_server().await;

    mock_with_auth("POST", "/stable-image/generate/sd3")
        .and(header_regex("content-type", "^multipart/form-data; boundary="))
        .and(header("accept", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "image": "aW1n",
            "finish_reason": "SUCCESS",
            "seed": 7
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"INIT-IMAGE-BYTES").unwrap();
    let file_name = file
        .path()
        .file_name()
        .unwrap()
        .to_string_lossy()
        .into_owned();

    let options = GenerateOptions::builder()
        .mode(GenerationMode::ImageToImage)
        .image(FileRef::new(file.path()))
        .strength(0.35)
        .model(Sd3Model::Sd3Turbo)
        .build();

    let response = client_for(&mock_server)
        .generate_sd3("a watercolor harbor", options, true)
        .await
        .unwrap();
    assert_eq!(response.seed(), Some(7));

    let requests = mock_server.received_requests().await.unwrap();
    let body = &requests[0].body;

    assert!(body_contains(body, b"INIT-IMAGE-BYTES"));
    assert!(body_contains(body, b"name=\"prompt\""));
    assert!(body_contains(body, b"a watercolor harbor"));
    assert!(body_contains(body, b"name=\"strength\""));
    assert!(body_contains(body, b"0.35"));
    assert!(body_contains(body, b"sd3-turbo"));
    assert!(body_contains(body, b"image-to-image"));
    assert!(body_contains(body, b"filename"));
    assert!(body_contains(body, file_name.as_bytes()));
}

#[tokio::test]
async fn test_unreadable_file_fails_before_request() {
    let mock_server = setup_mock_server().await;

    let options = GenerateOptions::builder()
        .mode(GenerationMode::ImageToImage)
        .image(FileRef::new("/no/such/dir/input.png"))
        .strength(0.5)
        .build();

    let err = client_for(&mock_server)
        .generate_sd3("x", options, false)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("/no/such/dir/input.png"));
    assert!(mock_server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn test_call_headers_override_extra_headers() {
    let mock_server = setup_mock_server().await;

    mock_with_auth("POST", "/stable-image/upscale/fast")
        .and(header("accept", "image/*"))
        .and(header("x-trace", "abc"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(b"RIFF".to_vec(), "image/webp"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut extra = HashMap::new();
    extra.insert("Accept".to_string(), "application/json".to_string());
    extra.insert("X-Trace".to_string(), "abc".to_string());

    let client = client_builder(&mock_server)
        .extra_headers(extra)
        .build()
        .unwrap();

    let mut call_headers = HashMap::new();
    call_headers.insert("Accept".to_string(), "image/*".to_string());

    let body = client
        .http()
        .multipart_post(
            "/stable-image/upscale/fast",
            call_headers,
            Some(Parameters::new().with("output_format", "webp")),
        )
        .await
        .unwrap();

    assert!(matches!(
        body,
        integrations_stability::ResponseBody::Binary { .. }
    ));
}
