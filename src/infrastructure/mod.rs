//! Infrastructure layer: caches, default components and platform adapters.

/// Memory and disk caches.
pub mod cache;
/// Default mappers, keyers, fetchers and decoders.
pub mod components;
/// Loader configuration.
pub mod config;
pub mod lifecycle;
pub mod system_callbacks;

pub use cache::{DiskCache, MemoryCacheBuilder, RealMemoryCache};
pub use config::{CliArgs, ConfigStorage, LoaderConfig, LogLevel};
pub use lifecycle::{LifecycleState, ManualLifecycle};
pub use system_callbacks::SystemCallbacks;
