//! Shared helpers for the WireMock integration tests.

#![allow(dead_code, clippy::expect_used)]

use integrations_stability::{StabilityClient, StabilityClientBuilder};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockBuilder, MockServer};

pub const API_KEY: &str = "sk-integration-test";

/// Starts a mock server.
pub async fn setup_mock_server() -> MockServer {
    MockServer::start().await
}

/// Builder for a client with a private configuration pointed at `server`.
pub fn client_builder(server: &MockServer) -> StabilityClientBuilder {
    StabilityClient::builder()
        .isolated()
        .api_key(API_KEY)
        .base_url(server.uri())
}

/// Client with a private configuration pointed at `server`.
pub fn client_for(server: &MockServer) -> StabilityClient {
    client_builder(server)
        .build()
        .expect("Failed to build client")
}

/// Mock matching an authenticated request to a versioned path.
pub fn mock_with_auth(method_matcher: &str, endpoint: &str) -> MockBuilder {
    Mock::given(method(method_matcher))
        .and(path(format!("/v2beta{}", endpoint)))
        .and(header("authorization", format!("Bearer {}", API_KEY).as_str()))
}
