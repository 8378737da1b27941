//! Service implementations for the Stability API.

mod generation;

pub use generation::{GenerationService, CORE_PATH, SD3_PATH};
