//! Memory cache keys, values and policies.

use std::collections::BTreeMap;
use std::fmt;

use super::bitmap::Bitmap;

/// Key of a memory cache entry.
///
/// `extras` captures everything beyond the data identity that changes the
/// output: parameter keys, transformation keys and the target size.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    base: String,
    extras: BTreeMap<String, String>,
}

impl CacheKey {
    #[must_use]
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            extras: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_extras(base: impl Into<String>, extras: BTreeMap<String, String>) -> Self {
        Self {
            base: base.into(),
            extras,
        }
    }

    #[must_use]
    pub fn base(&self) -> &str {
        &self.base
    }

    #[must_use]
    pub const fn extras(&self) -> &BTreeMap<String, String> {
        &self.extras
    }

    /// Parses an extra as a pixel dimension.
    #[must_use]
    pub fn extra_dimension(&self, name: &str) -> Option<u32> {
        self.extras.get(name).and_then(|value| value.parse().ok())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base)?;
        if !self.extras.is_empty() {
            write!(f, " {:?}", self.extras)?;
        }
        Ok(())
    }
}

impl From<&str> for CacheKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A cached bitmap and whether it was sampled below native resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheValue {
    pub bitmap: Bitmap,
    pub is_sampled: bool,
}

impl CacheValue {
    #[must_use]
    pub const fn new(bitmap: Bitmap, is_sampled: bool) -> Self {
        Self { bitmap, is_sampled }
    }
}

/// Read and write permissions for one cache tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CachePolicy {
    #[default]
    Enabled,
    ReadOnly,
    WriteOnly,
    Disabled,
}

impl CachePolicy {
    #[must_use]
    pub const fn read_enabled(self) -> bool {
        matches!(self, Self::Enabled | Self::ReadOnly)
    }

    #[must_use]
    pub const fn write_enabled(self) -> bool {
        matches!(self, Self::Enabled | Self::WriteOnly)
    }
}

/// Memory pressure severity, ordered from mild to severe.
///
/// The numeric values follow the platform's trim levels so that ranges like
/// "at least `RunningLow` but below `UiHidden`" compare as expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TrimLevel {
    RunningModerate = 5,
    RunningLow = 10,
    RunningCritical = 15,
    UiHidden = 20,
    Background = 40,
    Moderate = 60,
    Complete = 80,
}

impl fmt::Display for TrimLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::RunningModerate => "running_moderate",
            Self::RunningLow => "running_low",
            Self::RunningCritical => "running_critical",
            Self::UiHidden => "ui_hidden",
            Self::Background => "background",
            Self::Moderate => "moderate",
            Self::Complete => "complete",
        };
        f.write_str(name)
    }
}
