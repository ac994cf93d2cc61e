//! Loader configuration.

pub mod args;
pub mod loader_config;
pub mod storage;

pub use args::CliArgs;
pub use loader_config::{DiskConfig, LoaderConfig, LogLevel, MemoryConfig, NetworkConfig};
pub use storage::{ConfigError, ConfigStorage};
