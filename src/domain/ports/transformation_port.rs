use async_trait::async_trait;

use crate::domain::entities::{Bitmap, Size};
use crate::domain::errors::ImageError;

/// A bitmap-to-bitmap step applied after decoding.
#[async_trait]
pub trait Transformation: Send + Sync {
    /// Stable identity of this transformation and its parameters.
    fn cache_key(&self) -> String;

    async fn transform(&self, input: Bitmap, size: Size) -> Result<Bitmap, ImageError>;
}
