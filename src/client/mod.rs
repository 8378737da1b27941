//! Stability API client.
//!
//! Provides the main client interface for interacting with the Stability API.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{configuration, ConfigHandle, StabilityConfig};
use crate::errors::{StabilityError, StabilityResult};
use crate::services::GenerationService;
use crate::transport::{ApiResponse, ApiTransport, HttpTransport, ReqwestTransport};
use crate::types::Parameters;

type ConfigureFn = Box<dyn FnOnce(&mut StabilityConfig) + Send>;

/// The main Stability client.
///
/// By default a client shares the process-wide configuration, so settings
/// made through [`crate::configure`] or by any other sharing client apply to
/// it as well. Use [`StabilityClientBuilder::isolated`] or
/// [`StabilityClientBuilder::config`] for a private configuration.
///
/// # Example
///
/// ```rust,no_run
/// use integrations_stability::{GenerateOptions, OutputFormat, StabilityClient};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = StabilityClient::builder()
///         .api_key("sk-your-api-key")
///         .isolated()
///         .build()?;
///
///     let options = GenerateOptions::builder()
///         .output_format(OutputFormat::Webp)
///         .build();
///     let response = client.generate_core("a lighthouse at dusk", options, false).await?;
///     std::fs::write("lighthouse.webp", response.image_bytes()?)?;
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct StabilityClient {
    config: ConfigHandle,
    http: Arc<ApiTransport>,
    generation: GenerationService,
}

impl StabilityClient {
    /// Creates a client sharing the process-wide configuration.
    pub fn new() -> Self {
        Self::from_parts(configuration(), Arc::new(ReqwestTransport::new()))
    }

    /// Creates a new client builder.
    pub fn builder() -> StabilityClientBuilder {
        StabilityClientBuilder::new()
    }

    /// Creates a client with a private configuration read from the
    /// environment.
    pub fn from_env() -> StabilityResult<Self> {
        StabilityClientBuilder::new()
            .config(StabilityConfig::from_env()?)
            .build()
    }

    fn from_parts(config: ConfigHandle, transport: Arc<dyn HttpTransport>) -> Self {
        let http = Arc::new(ApiTransport::new(config.clone(), transport));
        let generation = GenerationService::new(Arc::clone(&http));
        Self {
            config,
            http,
            generation,
        }
    }

    /// Returns the configuration handle.
    pub fn config(&self) -> &ConfigHandle {
        &self.config
    }

    /// Applies `f` to this client's configuration.
    ///
    /// For a client sharing the process default this is the same as
    /// [`crate::configure`].
    pub fn configure<F>(&self, f: F)
    where
        F: FnOnce(&mut StabilityConfig),
    {
        self.config.update(f);
    }

    /// Returns the transport layer for raw `get`/`post`/`multipart_post`/`delete` calls.
    pub fn http(&self) -> &ApiTransport {
        &self.http
    }

    /// Returns the generation service.
    pub fn generation(&self) -> &GenerationService {
        &self.generation
    }

    /// Generates an image with Stable Image Core.
    ///
    /// See [`GenerationService::generate_core`].
    pub async fn generate_core(
        &self,
        prompt: &str,
        options: impl Into<Parameters>,
        json: bool,
    ) -> StabilityResult<ApiResponse> {
        self.generation.generate_core(prompt, options, json).await
    }

    /// Generates an image with Stable Diffusion 3.
    ///
    /// See [`GenerationService::generate_sd3`].
    pub async fn generate_sd3(
        &self,
        prompt: &str,
        options: impl Into<Parameters>,
        json: bool,
    ) -> StabilityResult<ApiResponse> {
        self.generation.generate_sd3(prompt, options, json).await
    }
}

impl Default for StabilityClient {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StabilityClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StabilityClient")
            .field("config", &self.config)
            .finish()
    }
}

/// Builder for the Stability client.
///
/// Settings given here are written into the target configuration when the
/// client is built, followed by any [`configure`](Self::configure) callbacks.
#[derive(Default)]
pub struct StabilityClientBuilder {
    base: Option<StabilityConfig>,
    isolated: bool,
    api_key: Option<String>,
    request_timeout: Option<Duration>,
    base_url: Option<String>,
    api_version: Option<String>,
    extra_headers: HashMap<String, String>,
    log_errors: Option<bool>,
    callbacks: Vec<ConfigureFn>,
    transport: Option<Arc<dyn HttpTransport>>,
}

impl StabilityClientBuilder {
    /// Creates a new client builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from a private copy of `config` instead of the process default.
    pub fn config(mut self, config: StabilityConfig) -> Self {
        self.base = Some(config);
        self
    }

    /// Uses a fresh private configuration instead of the process default.
    pub fn isolated(mut self) -> Self {
        self.isolated = true;
        self
    }

    /// Sets the API key.
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Sets the request timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Sets the base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets the API version segment.
    pub fn api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = Some(api_version.into());
        self
    }

    /// Replaces the extra headers. An empty map leaves them untouched.
    pub fn extra_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.extra_headers = headers;
        self
    }

    /// Enables or disables logging of failed responses.
    pub fn log_errors(mut self, enabled: bool) -> Self {
        self.log_errors = Some(enabled);
        self
    }

    /// Registers a callback run against the configuration at build time.
    pub fn configure<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&mut StabilityConfig) + Send + 'static,
    {
        self.callbacks.push(Box::new(f));
        self
    }

    /// Sets a custom HTTP transport.
    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Builds the client.
    pub fn build(self) -> StabilityResult<StabilityClient> {
        if let Some(base_url) = &self.base_url {
            url::Url::parse(base_url)?;
        }
        if self.api_key.as_deref() == Some("") {
            return Err(StabilityError::configuration("API key cannot be empty"));
        }
        if self.request_timeout == Some(Duration::ZERO) {
            return Err(StabilityError::configuration(
                "Timeout must be greater than 0",
            ));
        }

        let handle = match self.base {
            Some(config) => ConfigHandle::new(config),
            None if self.isolated => ConfigHandle::new(StabilityConfig::new()),
            None => configuration(),
        };

        let Self {
            api_key,
            request_timeout,
            base_url,
            api_version,
            extra_headers,
            log_errors,
            callbacks,
            transport,
            ..
        } = self;

        handle.update(|config| {
            if let Some(api_key) = api_key {
                config.set_api_key(api_key);
            }
            if let Some(timeout) = request_timeout {
                config.request_timeout = timeout;
            }
            if let Some(base_url) = base_url {
                config.base_url = base_url;
            }
            if let Some(api_version) = api_version {
                config.api_version = api_version;
            }
            if !extra_headers.is_empty() {
                config.extra_headers = extra_headers;
            }
            if let Some(log_errors) = log_errors {
                config.log_errors = log_errors;
            }
            for callback in callbacks {
                callback(&mut *config);
            }
        });

        let transport = transport.unwrap_or_else(|| Arc::new(ReqwestTransport::new()));
        Ok(StabilityClient::from_parts(handle, transport))
    }
}
