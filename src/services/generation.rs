//! Stable Image generation service.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;

use crate::errors::{StabilityError, StabilityResult};
use crate::transport::{ApiResponse, ApiTransport, ResponseNormalizer};
use crate::types::Parameters;

/// Path of the Stable Image Core endpoint.
pub const CORE_PATH: &str = "/stable-image/generate/core";

/// Path of the Stable Diffusion 3 endpoint.
pub const SD3_PATH: &str = "/stable-image/generate/sd3";

const IMAGE_TO_IMAGE: &str = "image-to-image";

/// Text-to-image and image-to-image generation.
#[derive(Debug, Clone)]
pub struct GenerationService {
    http: Arc<ApiTransport>,
    normalizer: ResponseNormalizer,
}

impl GenerationService {
    /// Creates a new generation service.
    pub fn new(http: Arc<ApiTransport>) -> Self {
        Self {
            http,
            normalizer: ResponseNormalizer::new(),
        }
    }

    /// Generates an image with Stable Image Core.
    ///
    /// With `json` set the response is a JSON document carrying a base64
    /// `image`; otherwise the image bytes are returned directly.
    #[instrument(skip(self, prompt, options))]
    pub async fn generate_core(
        &self,
        prompt: &str,
        options: impl Into<Parameters>,
        json: bool,
    ) -> StabilityResult<ApiResponse> {
        let params = with_prompt(prompt, options.into());
        self.generate(CORE_PATH, params, json).await
    }

    /// Generates an image with Stable Diffusion 3.
    ///
    /// In `image-to-image` mode both `image` and `strength` are required; a
    /// missing one fails before any request is made.
    #[instrument(skip(self, prompt, options))]
    pub async fn generate_sd3(
        &self,
        prompt: &str,
        options: impl Into<Parameters>,
        json: bool,
    ) -> StabilityResult<ApiResponse> {
        let params = with_prompt(prompt, options.into());
        validate_sd3(&params)?;
        self.generate(SD3_PATH, params, json).await
    }

    async fn generate(
        &self,
        path: &str,
        params: Parameters,
        json: bool,
    ) -> StabilityResult<ApiResponse> {
        let body = self
            .http
            .multipart_post(path, accept_header(json), Some(params))
            .await?;
        self.normalizer.normalize(body)
    }
}

fn with_prompt(prompt: &str, options: Parameters) -> Parameters {
    Parameters::new().with("prompt", prompt).merge(options)
}

fn accept_header(json: bool) -> HashMap<String, String> {
    let accept = if json { "application/json" } else { "image/*" };
    HashMap::from([("Accept".to_string(), accept.to_string())])
}

fn validate_sd3(params: &Parameters) -> StabilityResult<()> {
    if params.get_str("mode") != Some(IMAGE_TO_IMAGE) {
        return Ok(());
    }
    if !params.is_truthy("image") {
        return Err(StabilityError::argument_param(
            "image is required for image-to-image mode",
            "image",
        ));
    }
    if !params.is_truthy("strength") {
        return Err(StabilityError::argument_param(
            "strength is required for image-to-image mode",
            "strength",
        ));
    }
    Ok(())
}
