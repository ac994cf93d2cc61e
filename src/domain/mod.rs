//! Domain layer with the pipeline's value types and port definitions.

/// Entity definitions.
pub mod entities;
/// Error types.
pub mod errors;
/// Port definitions.
pub mod ports;

pub use entities::{Data, ImageRequest, ImageResult};
pub use errors::ImageError;
