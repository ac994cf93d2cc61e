//! Decoded bitmaps and the drawables that wrap them.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use image::{DynamicImage, Rgba, RgbaImage};

use super::size::Size;

/// Fallback edge length used when rasterizing a drawable without any size hint.
pub const DEFAULT_DRAWABLE_SIZE: u32 = 512;

static NEXT_BITMAP_ID: AtomicU64 = AtomicU64::new(1);
static LIVE_HARDWARE_BITMAPS: AtomicUsize = AtomicUsize::new(0);

/// Pixel storage format of a bitmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BitmapConfig {
    /// Single channel alpha mask.
    Alpha8,
    /// 16-bit color without alpha.
    Rgb565,
    /// 32-bit software color with alpha.
    #[default]
    Argb8888,
    /// Wide gamut floating point color.
    RgbaF16,
    /// Pixels live in graphics memory and cannot be addressed directly.
    Hardware,
}

impl BitmapConfig {
    /// Returns true if the pixels are hardware-backed.
    #[must_use]
    pub const fn is_hardware(self) -> bool {
        matches!(self, Self::Hardware)
    }

    /// Returns true if transformations can operate on this format directly.
    #[must_use]
    pub const fn is_valid_for_transformations(self) -> bool {
        matches!(self, Self::Argb8888 | Self::RgbaF16)
    }

    fn infer(image: &DynamicImage) -> Self {
        match image {
            DynamicImage::ImageRgb16(_)
            | DynamicImage::ImageRgba16(_)
            | DynamicImage::ImageRgb32F(_)
            | DynamicImage::ImageRgba32F(_) => Self::RgbaF16,
            _ => Self::Argb8888,
        }
    }
}

impl std::fmt::Display for BitmapConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Alpha8 => write!(f, "ALPHA_8"),
            Self::Rgb565 => write!(f, "RGB_565"),
            Self::Argb8888 => write!(f, "ARGB_8888"),
            Self::RgbaF16 => write!(f, "RGBA_F16"),
            Self::Hardware => write!(f, "HARDWARE"),
        }
    }
}

/// Returns the number of hardware bitmaps currently alive in this process.
#[must_use]
pub fn live_hardware_bitmaps() -> usize {
    LIVE_HARDWARE_BITMAPS.load(Ordering::Acquire)
}

struct BitmapInner {
    id: u64,
    image: DynamicImage,
    config: BitmapConfig,
}

impl Drop for BitmapInner {
    fn drop(&mut self) {
        if self.config.is_hardware() {
            LIVE_HARDWARE_BITMAPS.fetch_sub(1, Ordering::AcqRel);
        }
    }
}

/// A decoded image shared by reference.
///
/// Clones share the same pixel buffer. Equality is identity: two bitmaps are
/// equal only if they point at the same allocation, which is also the unit of
/// memory accounting for the caches.
#[derive(Clone)]
pub struct Bitmap {
    inner: Arc<BitmapInner>,
}

impl Bitmap {
    /// Wraps a decoded image, inferring its config from the pixel layout.
    #[must_use]
    pub fn new(image: DynamicImage) -> Self {
        let config = BitmapConfig::infer(&image);
        Self::with_config(image, config)
    }

    /// Wraps a decoded image with an explicit config.
    #[must_use]
    pub fn with_config(image: DynamicImage, config: BitmapConfig) -> Self {
        if config.is_hardware() {
            LIVE_HARDWARE_BITMAPS.fetch_add(1, Ordering::AcqRel);
        }
        Self {
            inner: Arc::new(BitmapInner {
                id: NEXT_BITMAP_ID.fetch_add(1, Ordering::Relaxed),
                image,
                config,
            }),
        }
    }

    /// Creates a bitmap filled with a single color.
    #[must_use]
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let image = RgbaImage::from_pixel(width.max(1), height.max(1), Rgba(rgba));
        Self::with_config(DynamicImage::ImageRgba8(image), BitmapConfig::Argb8888)
    }

    /// Process-unique identity of the underlying allocation.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.inner.image.width()
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.inner.image.height()
    }

    #[must_use]
    pub fn config(&self) -> BitmapConfig {
        self.inner.config
    }

    /// Borrows the decoded pixels.
    #[must_use]
    pub fn image(&self) -> &DynamicImage {
        &self.inner.image
    }

    /// Size in bytes of the pixel buffer.
    #[must_use]
    pub fn allocation_byte_count(&self) -> usize {
        self.inner.image.as_bytes().len()
    }

    /// Returns a weak handle that does not keep the pixels alive.
    #[must_use]
    pub fn downgrade(&self) -> WeakBitmap {
        WeakBitmap {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Returns true if both handles share the same allocation.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Copies the pixels into a software `ARGB_8888` bitmap.
    #[must_use]
    pub fn to_software(&self) -> Self {
        Self::with_config(
            DynamicImage::ImageRgba8(self.inner.image.to_rgba8()),
            BitmapConfig::Argb8888,
        )
    }
}

impl PartialEq for Bitmap {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Bitmap {}

impl std::fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bitmap")
            .field("id", &self.inner.id)
            .field("width", &self.width())
            .field("height", &self.height())
            .field("config", &self.inner.config)
            .finish()
    }
}

/// Weak counterpart of [`Bitmap`].
#[derive(Clone)]
pub struct WeakBitmap {
    inner: Weak<BitmapInner>,
}

impl WeakBitmap {
    /// Returns the bitmap if something still holds it strongly.
    #[must_use]
    pub fn upgrade(&self) -> Option<Bitmap> {
        self.inner.upgrade().map(|inner| Bitmap { inner })
    }

    /// Returns true if the pixels have not been reclaimed.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }

    /// Returns true if this handle refers to `bitmap`'s allocation.
    #[must_use]
    pub fn points_to(&self, bitmap: &Bitmap) -> bool {
        std::ptr::eq(self.inner.as_ptr(), Arc::as_ptr(&bitmap.inner))
    }
}

impl std::fmt::Debug for WeakBitmap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeakBitmap")
            .field("alive", &self.is_alive())
            .finish()
    }
}

/// Something that can be displayed by a target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Drawable {
    /// A decoded bitmap.
    Bitmap(Bitmap),
    /// A solid color, optionally with an intrinsic size.
    Color {
        /// Color in RGBA order.
        rgba: [u8; 4],
        /// Intrinsic width and height if the drawable has one.
        intrinsic_size: Option<(u32, u32)>,
    },
}

impl Drawable {
    /// Creates a solid color drawable without intrinsic size.
    #[must_use]
    pub const fn color(rgba: [u8; 4]) -> Self {
        Self::Color {
            rgba,
            intrinsic_size: None,
        }
    }

    /// Returns the bitmap if this drawable is bitmap-backed.
    #[must_use]
    pub const fn as_bitmap(&self) -> Option<&Bitmap> {
        match self {
            Self::Bitmap(bitmap) => Some(bitmap),
            Self::Color { .. } => None,
        }
    }

    /// Rasterizes this drawable into a software bitmap.
    ///
    /// Intrinsic dimensions win, then the requested size, then
    /// [`DEFAULT_DRAWABLE_SIZE`].
    #[must_use]
    pub fn to_bitmap(&self, size: Size) -> Bitmap {
        match self {
            Self::Bitmap(bitmap) => bitmap.to_software(),
            Self::Color {
                rgba,
                intrinsic_size,
            } => {
                let (width, height) = intrinsic_size.unwrap_or(match size {
                    Size::Pixels { width, height } => (width, height),
                    Size::Original => (DEFAULT_DRAWABLE_SIZE, DEFAULT_DRAWABLE_SIZE),
                });
                Bitmap::filled(width, height, *rgba)
            }
        }
    }
}

impl From<Bitmap> for Drawable {
    fn from(bitmap: Bitmap) -> Self {
        Self::Bitmap(bitmap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocation_size_matches_pixels() {
        let bitmap = Bitmap::new(DynamicImage::new_rgba8(10, 20));
        assert_eq!(bitmap.allocation_byte_count(), 10 * 20 * 4);
        assert_eq!(bitmap.config(), BitmapConfig::Argb8888);
    }

    #[test]
    fn test_identity_equality() {
        let a = Bitmap::new(DynamicImage::new_rgba8(1, 1));
        let b = Bitmap::new(DynamicImage::new_rgba8(1, 1));
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn test_weak_handle_dies_with_last_strong() {
        let bitmap = Bitmap::new(DynamicImage::new_rgba8(2, 2));
        let weak = bitmap.downgrade();
        assert!(weak.points_to(&bitmap));
        assert!(weak.upgrade().is_some());

        drop(bitmap);
        assert!(!weak.is_alive());
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn test_color_drawable_uses_requested_size() {
        let drawable = Drawable::color([255, 0, 0, 255]);
        let bitmap = drawable.to_bitmap(Size::pixels(30, 40));
        assert_eq!((bitmap.width(), bitmap.height()), (30, 40));

        let bitmap = drawable.to_bitmap(Size::Original);
        assert_eq!(bitmap.width(), DEFAULT_DRAWABLE_SIZE);
    }

    #[test]
    fn test_to_software_converts_hardware() {
        let hardware =
            Bitmap::with_config(DynamicImage::new_rgba8(4, 4), BitmapConfig::Hardware);
        let software = hardware.to_software();
        assert_eq!(software.config(), BitmapConfig::Argb8888);
        assert!(!software.ptr_eq(&hardware));
    }
}
