//! Decoder built on the `image` crate.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use image::DynamicImage;
use image::imageops::FilterType;
use tokio::sync::Semaphore;
use tracing::{debug, trace};

use crate::domain::entities::{
    Bitmap, BitmapConfig, Drawable, Options, Scale, Size, compute_size_multiplier,
};
use crate::domain::errors::ImageError;
use crate::domain::ports::{DecodeResult, Decoder, DecoderFactory, ImageSource, SourceResult};

/// Default number of images decoded at the same time.
pub const DEFAULT_DECODER_PARALLELISM: usize = 4;

/// Number of leading bytes inspected to recognize a format.
const SNIFF_LEN: usize = 32;

/// Creates decoders for every format the `image` crate recognizes.
///
/// Decoding is CPU bound; it runs on the blocking pool and at most
/// `parallelism` decodes run concurrently.
#[derive(Clone)]
pub struct ImageDecoderFactory {
    permits: Arc<Semaphore>,
}

impl ImageDecoderFactory {
    #[must_use]
    pub fn new(parallelism: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(parallelism.max(1))),
        }
    }

    // Looks at the header without consuming the source.
    fn is_supported(result: &SourceResult) -> bool {
        if result
            .mime_type
            .as_deref()
            .is_some_and(|mime| image::ImageFormat::from_mime_type(mime).is_some())
        {
            return true;
        }
        if let Some(bytes) = result.source.bytes() {
            let header = &bytes[..bytes.len().min(SNIFF_LEN)];
            return image::guess_format(header).is_ok();
        }
        result
            .source
            .file()
            .is_some_and(|path| image::ImageFormat::from_path(path).is_ok())
    }
}

impl Default for ImageDecoderFactory {
    fn default() -> Self {
        Self::new(DEFAULT_DECODER_PARALLELISM)
    }
}

impl DecoderFactory for ImageDecoderFactory {
    fn create(&self, result: &SourceResult, options: &Options) -> Option<Box<dyn Decoder>> {
        Self::is_supported(result).then(|| {
            Box::new(ImageDecoder {
                source: result.source.clone(),
                permits: Arc::clone(&self.permits),
                size: options.size,
                scale: options.scale,
                allow_inexact_size: options.allow_inexact_size,
                config: options.config,
            }) as Box<dyn Decoder>
        })
    }
}

struct ImageDecoder {
    source: ImageSource,
    permits: Arc<Semaphore>,
    size: Size,
    scale: Scale,
    allow_inexact_size: bool,
    config: BitmapConfig,
}

#[async_trait]
impl Decoder for ImageDecoder {
    async fn decode(&self) -> Result<Option<DecodeResult>, ImageError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| ImageError::component("decoder pool closed"))?;
        let bytes = self.source.read().await?;
        let (size, scale, allow_inexact_size, config) =
            (self.size, self.scale, self.allow_inexact_size, self.config);

        let result = tokio::task::spawn_blocking(move || {
            decode_bytes(&bytes, size, scale, allow_inexact_size, config)
        })
        .await
        .map_err(|e| ImageError::decode(format!("decode task failed: {e}")))??;

        Ok(Some(result))
    }
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn decode_bytes(
    bytes: &Bytes,
    size: Size,
    scale: Scale,
    allow_inexact_size: bool,
    config: BitmapConfig,
) -> Result<DecodeResult, ImageError> {
    let image = image::load_from_memory(bytes)?;
    let (src_width, src_height) = (image.width(), image.height());

    let (image, is_sampled) = match size {
        Size::Original => (image, false),
        Size::Pixels { width, height } => {
            let multiplier = compute_size_multiplier(src_width, src_height, width, height, scale);
            let scaled = |edge: u32| ((f64::from(edge) * multiplier).round() as u32).max(1);
            if multiplier < 1.0 {
                let resized = image.resize_exact(scaled(src_width), scaled(src_height), FilterType::Triangle);
                (resized, true)
            } else if multiplier > 1.0 && !allow_inexact_size {
                let resized = image.resize_exact(scaled(src_width), scaled(src_height), FilterType::Triangle);
                (resized, false)
            } else {
                (image, false)
            }
        }
    };
    trace!(
        src_width,
        src_height,
        width = image.width(),
        height = image.height(),
        is_sampled,
        "Decoded image"
    );

    let bitmap = match config {
        BitmapConfig::Alpha8 => Bitmap::with_config(
            DynamicImage::ImageLuma8(image.to_luma8()),
            BitmapConfig::Alpha8,
        ),
        BitmapConfig::RgbaF16 => Bitmap::with_config(
            DynamicImage::ImageRgba32F(image.to_rgba32f()),
            BitmapConfig::RgbaF16,
        ),
        BitmapConfig::Hardware => Bitmap::with_config(
            DynamicImage::ImageRgba8(image.to_rgba8()),
            BitmapConfig::Hardware,
        ),
        BitmapConfig::Argb8888 | BitmapConfig::Rgb565 => Bitmap::with_config(
            DynamicImage::ImageRgba8(image.to_rgba8()),
            BitmapConfig::Argb8888,
        ),
    };
    if config == BitmapConfig::Rgb565 {
        debug!("RGB_565 is decoded as ARGB_8888");
    }

    Ok(DecodeResult {
        drawable: Drawable::Bitmap(bitmap),
        is_sampled,
    })
}
