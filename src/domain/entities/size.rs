/// Requested output size of a load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Size {
    /// Load at the source's native resolution.
    #[default]
    Original,
    /// Load at (roughly) these pixel dimensions.
    Pixels { width: u32, height: u32 },
}

impl Size {
    /// Creates a pixel size; zero dimensions are clamped to one.
    #[must_use]
    pub fn pixels(width: u32, height: u32) -> Self {
        Self::Pixels {
            width: width.max(1),
            height: height.max(1),
        }
    }

    #[must_use]
    pub const fn is_original(self) -> bool {
        matches!(self, Self::Original)
    }
}

impl std::fmt::Display for Size {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Original => write!(f, "original"),
            Self::Pixels { width, height } => write!(f, "{width}x{height}"),
        }
    }
}

/// How a source is fitted into the requested size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Scale {
    /// Scale so the whole source fits inside the bounds.
    #[default]
    Fit,
    /// Scale so the source covers the bounds.
    Fill,
}

/// Multiplier that maps the source dimensions onto the destination.
#[must_use]
pub fn compute_size_multiplier(
    src_width: u32,
    src_height: u32,
    dst_width: u32,
    dst_height: u32,
    scale: Scale,
) -> f64 {
    let width_percent = f64::from(dst_width) / f64::from(src_width.max(1));
    let height_percent = f64::from(dst_height) / f64::from(src_height.max(1));
    match scale {
        Scale::Fit => width_percent.min(height_percent),
        Scale::Fill => width_percent.max(height_percent),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multiplier_fit_and_fill() {
        let fit = compute_size_multiplier(200, 100, 100, 100, Scale::Fit);
        let fill = compute_size_multiplier(200, 100, 100, 100, Scale::Fill);
        assert!((fit - 0.5).abs() < f64::EPSILON);
        assert!((fill - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_pixels_clamps_zero() {
        assert_eq!(Size::pixels(0, 5), Size::Pixels { width: 1, height: 5 });
    }
}
