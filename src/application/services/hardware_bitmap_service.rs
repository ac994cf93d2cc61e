use tracing::debug;

use crate::domain::entities::{Size, live_hardware_bitmaps};

/// Hardware bitmaps smaller than this in either dimension are never allocated.
pub const MIN_HARDWARE_DIMENSION: u32 = 100;

/// Default upper bound on hardware bitmaps alive at the same time.
pub const DEFAULT_HARDWARE_BITMAP_LIMIT: usize = 750;

/// Decides when hardware bitmaps may be allocated.
#[derive(Debug, Clone, Copy)]
pub struct HardwareBitmapService {
    limit: usize,
}

impl HardwareBitmapService {
    #[must_use]
    pub const fn new(limit: usize) -> Self {
        Self { limit }
    }

    /// Checked while building options. Small targets gain nothing from
    /// hardware storage.
    #[must_use]
    pub fn allow_hardware_main_thread(&self, size: Size) -> bool {
        match size {
            Size::Original => true,
            Size::Pixels { width, height } => {
                width >= MIN_HARDWARE_DIMENSION && height >= MIN_HARDWARE_DIMENSION
            }
        }
    }

    /// Checked right before decoding. Fails once too many hardware bitmaps
    /// are alive.
    #[must_use]
    pub fn allow_hardware_worker_thread(&self) -> bool {
        let live = live_hardware_bitmaps();
        let allowed = live < self.limit;
        if !allowed {
            debug!(live, limit = self.limit, "Hardware bitmap limit reached");
        }
        allowed
    }
}

impl Default for HardwareBitmapService {
    fn default() -> Self {
        Self::new(DEFAULT_HARDWARE_BITMAP_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{Bitmap, BitmapConfig};
    use image::DynamicImage;

    #[test]
    fn test_small_sizes_never_get_hardware() {
        let service = HardwareBitmapService::default();
        assert!(service.allow_hardware_main_thread(Size::Original));
        assert!(service.allow_hardware_main_thread(Size::pixels(100, 100)));
        assert!(!service.allow_hardware_main_thread(Size::pixels(99, 500)));
        assert!(!service.allow_hardware_main_thread(Size::pixels(500, 99)));
    }

    #[test]
    fn test_worker_thread_respects_limit() {
        assert!(!HardwareBitmapService::new(0).allow_hardware_worker_thread());

        let held = Bitmap::with_config(DynamicImage::new_rgba8(1, 1), BitmapConfig::Hardware);
        let service = HardwareBitmapService::new(usize::MAX);
        assert!(service.allow_hardware_worker_thread());
        drop(held);
    }
}
