//! Port definitions for decoding fetched bytes.

use async_trait::async_trait;

use super::fetcher_port::SourceResult;
use crate::domain::entities::{Drawable, Options};
use crate::domain::errors::ImageError;

/// A decoded drawable and whether it was sampled below native resolution.
#[derive(Debug, Clone)]
pub struct DecodeResult {
    pub drawable: Drawable,
    pub is_sampled: bool,
}

/// Decodes one fetched source.
#[async_trait]
pub trait Decoder: Send + Sync {
    /// Returns `None` to decline and let the next factory try.
    async fn decode(&self) -> Result<Option<DecodeResult>, ImageError>;
}

/// Creates a [`Decoder`] for sources it understands.
pub trait DecoderFactory: Send + Sync {
    fn create(&self, result: &SourceResult, options: &Options) -> Option<Box<dyn Decoder>>;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use crate::domain::entities::{Bitmap, Size};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Decoder factory that produces a blank bitmap at the requested size.
    pub struct MockDecoderFactory {
        decoded: Arc<AtomicUsize>,
        native: (u32, u32),
    }

    impl MockDecoderFactory {
        /// Creates a factory that pretends sources are `width` x `height`.
        pub fn new(width: u32, height: u32) -> Self {
            Self {
                decoded: Arc::new(AtomicUsize::new(0)),
                native: (width, height),
            }
        }

        /// Number of completed decodes.
        pub fn decoded(&self) -> usize {
            self.decoded.load(Ordering::SeqCst)
        }
    }

    struct MockDecoder {
        decoded: Arc<AtomicUsize>,
        native: (u32, u32),
        size: Size,
    }

    #[async_trait]
    impl Decoder for MockDecoder {
        async fn decode(&self) -> Result<Option<DecodeResult>, ImageError> {
            self.decoded.fetch_add(1, Ordering::SeqCst);
            let (width, height, is_sampled) = match self.size {
                Size::Pixels { width, height } if width < self.native.0 => (width, height, true),
                _ => (self.native.0, self.native.1, false),
            };
            Ok(Some(DecodeResult {
                drawable: Drawable::Bitmap(Bitmap::filled(width, height, [0, 0, 0, 255])),
                is_sampled,
            }))
        }
    }

    impl DecoderFactory for MockDecoderFactory {
        fn create(&self, _result: &SourceResult, options: &Options) -> Option<Box<dyn Decoder>> {
            Some(Box::new(MockDecoder {
                decoded: Arc::clone(&self.decoded),
                native: self.native,
                size: options.size,
            }))
        }
    }
}
