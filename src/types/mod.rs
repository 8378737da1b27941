//! Type definitions for the Stability API.
//!
//! [`Parameters`] carries request options, including files to upload and the
//! streaming callback. [`GenerateOptions`] is a typed front end for the
//! generate endpoints.

pub mod generation;
pub mod params;

pub use generation::{
    AspectRatio, GenerateOptions, GenerateOptionsBuilder, GenerationMode, OutputFormat, Sd3Model,
    StylePreset,
};
pub use params::{FileRef, ParamValue, Parameters, STREAM_KEY};
