//! Configuration module for the Stability client.
//!
//! A [`StabilityConfig`] carries the credential, endpoint, timeout and
//! transport hooks. Clients either own an isolated configuration or share the
//! process-wide default returned by [`configuration`]. Mutating the default via
//! [`configure`] is visible to every client sharing it, on their next request.

use once_cell::sync::Lazy;
use parking_lot::{RwLock, RwLockReadGuard};
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::errors::{StabilityError, StabilityResult, MISSING_API_KEY_MESSAGE};
use crate::transport::ConnectionBuilder;

/// Default base URL for the Stability API.
pub const DEFAULT_BASE_URL: &str = "https://api.stability.ai";

/// Default API version path segment.
pub const DEFAULT_API_VERSION: &str = "v2beta";

/// Default request timeout (120 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Hook invoked once per connection construction.
pub type TransportCustomizer = Arc<dyn Fn(&mut ConnectionBuilder) + Send + Sync>;

static DEFAULT_CONFIG: Lazy<ConfigHandle> =
    Lazy::new(|| ConfigHandle::new(StabilityConfig::default()));

/// Returns the process-wide default configuration handle.
pub fn configuration() -> ConfigHandle {
    DEFAULT_CONFIG.clone()
}

/// Applies `f` to the process-wide default configuration.
///
/// Changes take effect immediately for every client sharing the default.
/// See [`ConfigHandle::update`] for how concurrent calls interact.
pub fn configure<F>(f: F)
where
    F: FnOnce(&mut StabilityConfig),
{
    DEFAULT_CONFIG.update(f);
}

/// Configuration for the Stability client.
#[derive(Clone)]
pub struct StabilityConfig {
    api_key: Option<SecretString>,
    /// API version path segment, e.g. `v2beta`.
    pub api_version: String,
    /// Base URL for API requests.
    pub base_url: String,
    /// Timeout applied to every connection.
    pub request_timeout: Duration,
    /// Headers added to every request.
    pub extra_headers: HashMap<String, String>,
    /// Log non-2xx responses before they are raised.
    pub log_errors: bool,
    transport_customizer: Option<TransportCustomizer>,
}

impl StabilityConfig {
    /// Creates a configuration with defaults and no credential.
    pub fn new() -> Self {
        Self {
            api_key: None,
            api_version: DEFAULT_API_VERSION.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: DEFAULT_TIMEOUT,
            extra_headers: HashMap::new(),
            log_errors: false,
            transport_customizer: None,
        }
    }

    /// Creates a new configuration builder.
    pub fn builder() -> StabilityConfigBuilder {
        StabilityConfigBuilder::new()
    }

    /// Creates a configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `STABILITY_API_KEY` (required): API key for authentication
    /// - `STABILITY_BASE_URL` (optional): Custom base URL
    /// - `STABILITY_API_VERSION` (optional): API version segment
    /// - `STABILITY_TIMEOUT` (optional): Request timeout in seconds
    /// - `STABILITY_LOG_ERRORS` (optional): `true`/`1` to log failed responses
    pub fn from_env() -> StabilityResult<Self> {
        let api_key = std::env::var("STABILITY_API_KEY").map_err(|_| {
            StabilityError::configuration("STABILITY_API_KEY environment variable not set")
        })?;

        let mut builder = StabilityConfigBuilder::new().api_key(api_key);

        if let Ok(base_url) = std::env::var("STABILITY_BASE_URL") {
            builder = builder.base_url(base_url);
        }

        if let Ok(api_version) = std::env::var("STABILITY_API_VERSION") {
            builder = builder.api_version(api_version);
        }

        if let Ok(timeout_str) = std::env::var("STABILITY_TIMEOUT") {
            if let Ok(timeout_secs) = timeout_str.parse::<u64>() {
                builder = builder.timeout_secs(timeout_secs);
            }
        }

        if let Ok(flag) = std::env::var("STABILITY_LOG_ERRORS") {
            builder = builder.log_errors(matches!(flag.as_str(), "1" | "true" | "TRUE"));
        }

        builder.build()
    }

    /// Returns the API key, failing if it was never set.
    pub fn api_key(&self) -> StabilityResult<&str> {
        self.api_key
            .as_ref()
            .map(|key| key.expose_secret().as_str())
            .ok_or_else(|| StabilityError::configuration(MISSING_API_KEY_MESSAGE))
    }

    /// Sets the API key.
    pub fn set_api_key(&mut self, api_key: impl Into<String>) {
        self.api_key = Some(SecretString::new(api_key.into()));
    }

    /// Removes the API key.
    pub fn clear_api_key(&mut self) {
        self.api_key = None;
    }

    /// Returns true when an API key has been set.
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Returns the API key hint (last 4 characters) for debugging.
    pub fn api_key_hint(&self) -> String {
        match &self.api_key {
            Some(key) => {
                let key = key.expose_secret();
                if key.len() > 4 {
                    format!("...{}", &key[key.len() - 4..])
                } else {
                    "****".to_string()
                }
            }
            None => "<unset>".to_string(),
        }
    }

    /// Registers a hook invoked once per connection construction.
    pub fn transport<F>(&mut self, customizer: F)
    where
        F: Fn(&mut ConnectionBuilder) + Send + Sync + 'static,
    {
        self.transport_customizer = Some(Arc::new(customizer));
    }

    /// Returns the registered transport hook.
    pub fn transport_customizer(&self) -> Option<&TransportCustomizer> {
        self.transport_customizer.as_ref()
    }

    /// Returns the full URL for an endpoint path.
    ///
    /// Segments are joined with exactly one `/` at each boundary; nothing else
    /// is normalized.
    pub fn endpoint_url(&self, path: &str) -> String {
        join_segments(&[&self.base_url, &self.api_version, path])
    }
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StabilityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StabilityConfig")
            .field("api_key", &"[REDACTED]")
            .field("api_version", &self.api_version)
            .field("base_url", &self.base_url)
            .field("request_timeout", &self.request_timeout)
            .field("extra_headers", &self.extra_headers.keys().collect::<Vec<_>>())
            .field("log_errors", &self.log_errors)
            .field("transport_customizer", &self.transport_customizer.is_some())
            .finish()
    }
}

fn join_segments(segments: &[&str]) -> String {
    let mut url = String::new();
    for segment in segments {
        if url.is_empty() {
            url.push_str(segment);
            continue;
        }
        let trimmed = segment.trim_start_matches('/');
        while url.ends_with('/') {
            url.pop();
        }
        url.push('/');
        url.push_str(trimmed);
    }
    url
}

/// Shared, mutable handle to a configuration.
///
/// Reads take a snapshot under a read lock; writers take the write lock only
/// for the duration of the mutator.
#[derive(Clone)]
pub struct ConfigHandle {
    inner: Arc<RwLock<StabilityConfig>>,
}

impl ConfigHandle {
    /// Wraps a configuration in a new handle.
    pub fn new(config: StabilityConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    /// Borrows the configuration.
    pub fn read(&self) -> RwLockReadGuard<'_, StabilityConfig> {
        self.inner.read()
    }

    /// Clones the current configuration.
    pub fn snapshot(&self) -> StabilityConfig {
        self.inner.read().clone()
    }

    /// Applies `f` to a copy of the configuration and stores the result.
    ///
    /// No lock is held while `f` runs, so it may read this handle or build
    /// clients sharing it. Concurrent updates are not merged: the last one
    /// to finish wins.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut StabilityConfig),
    {
        let mut config = self.snapshot();
        f(&mut config);
        *self.inner.write() = config;
    }

    /// Returns true if both handles point at the same configuration.
    pub fn ptr_eq(&self, other: &ConfigHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for ConfigHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ConfigHandle").field(&*self.inner.read()).finish()
    }
}

/// Builder for `StabilityConfig`.
#[derive(Default)]
pub struct StabilityConfigBuilder {
    api_key: Option<String>,
    base_url: Option<String>,
    api_version: Option<String>,
    timeout: Option<Duration>,
    extra_headers: HashMap<String, String>,
    log_errors: bool,
    transport_customizer: Option<TransportCustomizer>,
}

impl StabilityConfigBuilder {
    /// Creates a new configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key.
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
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

    /// Sets the request timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the timeout in seconds.
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout = Some(Duration::from_secs(secs));
        self
    }

    /// Adds an extra header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.insert(name.into(), value.into());
        self
    }

    /// Replaces the extra headers.
    pub fn extra_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.extra_headers = headers;
        self
    }

    /// Enables logging of failed responses.
    pub fn log_errors(mut self, enabled: bool) -> Self {
        self.log_errors = enabled;
        self
    }

    /// Registers a transport hook.
    pub fn transport<F>(mut self, customizer: F) -> Self
    where
        F: Fn(&mut ConnectionBuilder) + Send + Sync + 'static,
    {
        self.transport_customizer = Some(Arc::new(customizer));
        self
    }

    /// Builds the configuration.
    ///
    /// The API key stays optional here; it is validated when first read.
    pub fn build(self) -> StabilityResult<StabilityConfig> {
        let base_url = self
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        url::Url::parse(&base_url)?;

        if let Some(key) = &self.api_key {
            if key.is_empty() {
                return Err(StabilityError::configuration("API key cannot be empty"));
            }
            if !key.starts_with("sk-") {
                tracing::warn!("API key does not match expected Stability format (sk-*)");
            }
        }

        if self.timeout == Some(Duration::ZERO) {
            return Err(StabilityError::configuration(
                "Timeout must be greater than 0",
            ));
        }

        Ok(StabilityConfig {
            api_key: self.api_key.map(SecretString::new),
            api_version: self
                .api_version
                .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
            base_url,
            request_timeout: self.timeout.unwrap_or(DEFAULT_TIMEOUT),
            extra_headers: self.extra_headers,
            log_errors: self.log_errors,
            transport_customizer: self.transport_customizer,
        })
    }
}
