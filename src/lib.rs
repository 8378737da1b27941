//! Stability AI Client Library
//!
//! An async Rust client for the Stability AI REST API. Covers Stable Image
//! Core and Stable Diffusion 3 generation, raw JSON, multipart and streamed
//! calls, and a process-wide configuration that clients share by default.
//!
//! # Features
//!
//! - **Generation**: text-to-image and image-to-image with typed options
//! - **Transport**: JSON, multipart uploads and `data:`/`error:` event streams
//! - **Configuration**: shared process default or isolated per client, with a
//!   per-connection hook for proxies, user agents and middleware
//! - **Observability**: `tracing` spans, optional error logging, credential redaction
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use integrations_stability::{GenerateOptions, AspectRatio, StabilityClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = StabilityClient::builder()
//!         .api_key("sk-your-api-key")
//!         .build()?;
//!
//!     let options = GenerateOptions::builder()
//!         .aspect_ratio(AspectRatio::Landscape16x9)
//!         .build();
//!
//!     let response = client.generate_core("a red fox in the snow", options, true).await?;
//!     println!("finish reason: {:?}", response.finish_reason());
//!     std::fs::write("fox.png", response.image_bytes()?)?;
//!     Ok(())
//! }
//! ```
//!
//! # Shared Configuration
//!
//! ```rust,no_run
//! use integrations_stability::{configure, StabilityClient};
//! use std::time::Duration;
//!
//! configure(|config| {
//!     config.set_api_key("sk-your-api-key");
//!     config.request_timeout = Duration::from_secs(60);
//!     config.transport(|builder| {
//!         builder.user_agent("my-app/1.0");
//!     });
//! });
//!
//! // Every client built without `isolated()` sees the settings above.
//! let client = StabilityClient::new();
//! ```
//!
//! # Streaming
//!
//! ```rust,no_run
//! use integrations_stability::{EventSink, Parameters, StabilityClient};
//!
//! # async fn run(client: StabilityClient) -> Result<(), Box<dyn std::error::Error>> {
//! let sink = EventSink::new(|event| println!("{}: {}", event.kind.as_str(), event.data));
//! client
//!     .http()
//!     .post("/some/streaming/endpoint", Parameters::new().with("stream", sink))
//!     .await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod client;
pub mod config;
pub mod errors;
pub mod observability;
pub mod services;
pub mod transport;
pub mod types;

/// Mock implementations for testing.
#[cfg(any(test, feature = "mocks"))]
pub mod mocks;

// Re-exports for convenience
pub use client::{StabilityClient, StabilityClientBuilder};
pub use config::{configuration, configure, ConfigHandle, StabilityConfig, StabilityConfigBuilder};
pub use errors::{StabilityError, StabilityResult};
pub use services::GenerationService;
pub use transport::{
    ApiResponse, ApiTransport, ConnectionBuilder, EventKind, EventSink, JsonBody, Middleware,
    ResponseBody, ResponseKey, StreamEvent, TransportError,
};
pub use types::{
    AspectRatio, FileRef, GenerateOptions, GenerationMode, OutputFormat, ParamValue, Parameters,
    Sd3Model, StylePreset,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude for common imports.
pub mod prelude {
    pub use crate::client::{StabilityClient, StabilityClientBuilder};
    pub use crate::config::{configure, StabilityConfig};
    pub use crate::errors::{StabilityError, StabilityResult};
    pub use crate::transport::{ApiResponse, EventSink, ResponseKey, StreamEvent};
    pub use crate::types::{FileRef, GenerateOptions, Parameters};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
