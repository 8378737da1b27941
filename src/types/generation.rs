//! Stable Image generation options.

use serde::{Deserialize, Serialize};

use super::params::{FileRef, Parameters};

/// Aspect ratio of the generated image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AspectRatio {
    /// 16:9
    #[serde(rename = "16:9")]
    Landscape16x9,
    /// 1:1 (default)
    #[serde(rename = "1:1")]
    Square,
    /// 21:9
    #[serde(rename = "21:9")]
    Landscape21x9,
    /// 2:3
    #[serde(rename = "2:3")]
    Portrait2x3,
    /// 3:2
    #[serde(rename = "3:2")]
    Landscape3x2,
    /// 4:5
    #[serde(rename = "4:5")]
    Portrait4x5,
    /// 5:4
    #[serde(rename = "5:4")]
    Landscape5x4,
    /// 9:16
    #[serde(rename = "9:16")]
    Portrait9x16,
    /// 9:21
    #[serde(rename = "9:21")]
    Portrait9x21,
}

impl AspectRatio {
    /// Returns the wire value.
    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Landscape16x9 => "16:9",
            AspectRatio::Square => "1:1",
            AspectRatio::Landscape21x9 => "21:9",
            AspectRatio::Portrait2x3 => "2:3",
            AspectRatio::Landscape3x2 => "3:2",
            AspectRatio::Portrait4x5 => "4:5",
            AspectRatio::Landscape5x4 => "5:4",
            AspectRatio::Portrait9x16 => "9:16",
            AspectRatio::Portrait9x21 => "9:21",
        }
    }
}

/// Visual style the model is guided towards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StylePreset {
    /// 3d-model
    #[serde(rename = "3d-model")]
    ThreeDModel,
    /// analog-film
    AnalogFilm,
    /// anime
    Anime,
    /// cinematic
    Cinematic,
    /// comic-book
    ComicBook,
    /// digital-art
    DigitalArt,
    /// enhance
    Enhance,
    /// fantasy-art
    FantasyArt,
    /// isometric
    Isometric,
    /// line-art
    LineArt,
    /// low-poly
    LowPoly,
    /// modeling-compound
    ModelingCompound,
    /// neon-punk
    NeonPunk,
    /// origami
    Origami,
    /// photographic
    Photographic,
    /// pixel-art
    PixelArt,
    /// tile-texture
    TileTexture,
}

impl StylePreset {
    /// Returns the wire value.
    pub fn as_str(&self) -> &'static str {
        match self {
            StylePreset::ThreeDModel => "3d-model",
            StylePreset::AnalogFilm => "analog-film",
            StylePreset::Anime => "anime",
            StylePreset::Cinematic => "cinematic",
            StylePreset::ComicBook => "comic-book",
            StylePreset::DigitalArt => "digital-art",
            StylePreset::Enhance => "enhance",
            StylePreset::FantasyArt => "fantasy-art",
            StylePreset::Isometric => "isometric",
            StylePreset::LineArt => "line-art",
            StylePreset::LowPoly => "low-poly",
            StylePreset::ModelingCompound => "modeling-compound",
            StylePreset::NeonPunk => "neon-punk",
            StylePreset::Origami => "origami",
            StylePreset::Photographic => "photographic",
            StylePreset::PixelArt => "pixel-art",
            StylePreset::TileTexture => "tile-texture",
        }
    }
}

/// Output image format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// JPEG
    Jpeg,
    /// PNG (default)
    Png,
    /// WebP; not accepted by sd3.
    Webp,
}

impl OutputFormat {
    /// Returns the wire value.
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpeg",
            OutputFormat::Png => "png",
            OutputFormat::Webp => "webp",
        }
    }
}

/// sd3 generation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GenerationMode {
    /// text-to-image (default)
    TextToImage,
    /// image-to-image; requires an image and a strength.
    ImageToImage,
}

impl GenerationMode {
    /// Returns the wire value.
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationMode::TextToImage => "text-to-image",
            GenerationMode::ImageToImage => "image-to-image",
        }
    }
}

/// sd3 model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Sd3Model {
    /// sd3 (default)
    Sd3,
    /// sd3-turbo
    Sd3Turbo,
}

impl Sd3Model {
    /// Returns the wire value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Sd3Model::Sd3 => "sd3",
            Sd3Model::Sd3Turbo => "sd3-turbo",
        }
    }
}

/// Typed options for the generate endpoints.
///
/// Unset options are omitted so the API applies its own defaults. Anything
/// not covered here can be added to the resulting [`Parameters`] directly.
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    /// Aspect ratio.
    pub aspect_ratio: Option<AspectRatio>,
    /// Elements to keep out of the image.
    pub negative_prompt: Option<String>,
    /// Seed; 0 picks a random one.
    pub seed: Option<u32>,
    /// Style preset (core only).
    pub style_preset: Option<StylePreset>,
    /// Output format.
    pub output_format: Option<OutputFormat>,
    /// Generation mode (sd3 only).
    pub mode: Option<GenerationMode>,
    /// Input image for image-to-image.
    pub image: Option<FileRef>,
    /// Transformation strength for image-to-image.
    pub strength: Option<f64>,
    /// Model (sd3 only).
    pub model: Option<Sd3Model>,
}

impl GenerateOptions {
    /// Creates empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder.
    pub fn builder() -> GenerateOptionsBuilder {
        GenerateOptionsBuilder::default()
    }

    /// Converts into request parameters.
    pub fn into_parameters(self) -> Parameters {
        let mut params = Parameters::new();
        if let Some(aspect_ratio) = self.aspect_ratio {
            params.insert("aspect_ratio", aspect_ratio.as_str());
        }
        if let Some(negative_prompt) = self.negative_prompt {
            params.insert("negative_prompt", negative_prompt);
        }
        if let Some(seed) = self.seed {
            params.insert("seed", seed);
        }
        if let Some(style_preset) = self.style_preset {
            params.insert("style_preset", style_preset.as_str());
        }
        if let Some(output_format) = self.output_format {
            params.insert("output_format", output_format.as_str());
        }
        if let Some(mode) = self.mode {
            params.insert("mode", mode.as_str());
        }
        if let Some(image) = self.image {
            params.insert("image", image);
        }
        if let Some(strength) = self.strength {
            params.insert("strength", strength);
        }
        if let Some(model) = self.model {
            params.insert("model", model.as_str());
        }
        params
    }
}

impl From<GenerateOptions> for Parameters {
    fn from(options: GenerateOptions) -> Self {
        options.into_parameters()
    }
}

/// Builder for [`GenerateOptions`].
#[derive(Debug, Default)]
pub struct GenerateOptionsBuilder {
    options: GenerateOptions,
}

impl GenerateOptionsBuilder {
    /// Sets the aspect ratio.
    pub fn aspect_ratio(mut self, aspect_ratio: AspectRatio) -> Self {
        self.options.aspect_ratio = Some(aspect_ratio);
        self
    }

    /// Sets the negative prompt.
    pub fn negative_prompt(mut self, negative_prompt: impl Into<String>) -> Self {
        self.options.negative_prompt = Some(negative_prompt.into());
        self
    }

    /// Sets the seed.
    pub fn seed(mut self, seed: u32) -> Self {
        self.options.seed = Some(seed);
        self
    }

    /// Sets the style preset.
    pub fn style_preset(mut self, style_preset: StylePreset) -> Self {
        self.options.style_preset = Some(style_preset);
        self
    }

    /// Sets the output format.
    pub fn output_format(mut self, output_format: OutputFormat) -> Self {
        self.options.output_format = Some(output_format);
        self
    }

    /// Sets the generation mode.
    pub fn mode(mut self, mode: GenerationMode) -> Self {
        self.options.mode = Some(mode);
        self
    }

    /// Sets the input image.
    pub fn image(mut self, image: FileRef) -> Self {
        self.options.image = Some(image);
        self
    }

    /// Sets the image-to-image strength.
    pub fn strength(mut self, strength: f64) -> Self {
        self.options.strength = Some(strength);
        self
    }

    /// Sets the sd3 model.
    pub fn model(mut self, model: Sd3Model) -> Self {
        self.options.model = Some(model);
        self
    }

    /// Builds the options.
    pub fn build(self) -> GenerateOptions {
        self.options
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use test_case::test_case;

    #[test]
    fn test_unset_options_are_omitted() {
        let params: Parameters = GenerateOptions::new().into();
        assert!(params.is_empty());
    }

    #[test]
    fn test_options_become_parameters() {
        let params: Parameters = GenerateOptions::builder()
            .aspect_ratio(AspectRatio::Landscape16x9)
            .negative_prompt("blurry")
            .seed(42)
            .style_preset(StylePreset::ThreeDModel)
            .output_format(OutputFormat::Webp)
            .build()
            .into();

        assert_eq!(
            params.into_json().unwrap(),
            json!({
                "aspect_ratio": "16:9",
                "negative_prompt": "blurry",
                "seed": 42,
                "style_preset": "3d-model",
                "output_format": "webp"
            })
        );
    }

    #[test]
    fn test_image_to_image_options() {
        let params: Parameters = GenerateOptions::builder()
            .mode(GenerationMode::ImageToImage)
            .image(FileRef::new("init.png"))
            .strength(0.6)
            .model(Sd3Model::Sd3Turbo)
            .build()
            .into();

        assert_eq!(params.get_str("mode"), Some("image-to-image"));
        assert_eq!(params.get_str("model"), Some("sd3-turbo"));
        assert!(params.is_truthy("image"));
        assert!(params.is_truthy("strength"));
    }

    #[test_case(StylePreset::ThreeDModel, "\"3d-model\"")]
    #[test_case(StylePreset::NeonPunk, "\"neon-punk\"")]
    #[test_case(StylePreset::ModelingCompound, "\"modeling-compound\"")]
    fn test_style_preset_serde_matches_wire_value(preset: StylePreset, expected: &str) {
        assert_eq!(serde_json::to_string(&preset).unwrap(), expected);
        assert_eq!(format!("\"{}\"", preset.as_str()), expected);
    }

    #[test]
    fn test_aspect_ratio_serde() {
        let parsed: AspectRatio = serde_json::from_str("\"9:21\"").unwrap();
        assert_eq!(parsed, AspectRatio::Portrait9x21);
        assert_eq!(parsed.as_str(), "9:21");
    }
}
