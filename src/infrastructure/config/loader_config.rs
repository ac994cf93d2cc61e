//! Loader configuration file.

use std::path::PathBuf;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use super::args::CliArgs;
use crate::infrastructure::cache::{
    DEFAULT_AVAILABLE_MEMORY, DEFAULT_MAX_DISK_CACHE_SIZE, DEFAULT_MAX_SIZE_PERCENT,
    MemoryCacheBuilder, default_directory,
};
use crate::infrastructure::components::{DEFAULT_DECODER_PARALLELISM, DEFAULT_HTTP_TIMEOUT};

const APP_NAME: &str = "imago";
const APP_QUALIFIER: &str = "dev";
const APP_ORGANIZATION: &str = "imago";

/// Log level configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl LogLevel {
    /// Converts to tracing level.
    #[must_use]
    pub const fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trace => write!(f, "trace"),
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Settings for building an image loader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Configuration file path.
    #[serde(skip)]
    pub config: Option<PathBuf>,

    /// Log file path.
    #[serde(skip)]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Memory cache settings.
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Disk cache settings.
    #[serde(default)]
    pub disk: DiskConfig,

    /// HTTP settings.
    #[serde(default)]
    pub network: NetworkConfig,

    /// Maximum number of images decoded at once.
    #[serde(default = "default_decoder_parallelism")]
    pub decoder_parallelism: usize,

    /// Add file modification times to cache keys of local files.
    #[serde(default = "default_true")]
    pub add_last_modified_to_file_cache_key: bool,
}

/// Memory cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Share of available memory given to the strong tier, in `0.0..=1.0`.
    #[serde(default = "default_max_size_percent")]
    pub max_size_percent: f64,

    /// Memory assumed to be available to the process, in bytes.
    #[serde(default = "default_available_memory")]
    pub available_memory_bytes: usize,

    /// Fixed strong tier size in bytes. Overrides the percentage.
    #[serde(default)]
    pub max_size_bytes: Option<usize>,

    /// Keep recently used images alive in the strong tier.
    #[serde(default = "default_true")]
    pub strong_references: bool,

    /// Track evicted images that are still in use elsewhere.
    #[serde(default = "default_true")]
    pub weak_references: bool,
}

impl MemoryConfig {
    /// Memory cache builder with these settings.
    #[must_use]
    pub fn to_builder(&self) -> MemoryCacheBuilder {
        let builder = MemoryCacheBuilder::default()
            .available_memory(self.available_memory_bytes)
            .max_size_percent(self.max_size_percent)
            .strong_references_enabled(self.strong_references)
            .weak_references_enabled(self.weak_references);
        match self.max_size_bytes {
            Some(bytes) => builder.max_size_bytes(bytes),
            None => builder,
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_size_percent: DEFAULT_MAX_SIZE_PERCENT,
            available_memory_bytes: DEFAULT_AVAILABLE_MEMORY,
            max_size_bytes: None,
            strong_references: true,
            weak_references: true,
        }
    }
}

/// Disk cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiskConfig {
    /// Cache downloaded bytes on disk.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Cache directory. Defaults to the platform cache directory.
    #[serde(default)]
    pub dir: Option<PathBuf>,

    /// Maximum cache size in bytes.
    #[serde(default = "default_max_disk_size")]
    pub max_size: u64,
}

impl DiskConfig {
    /// Returns effective cache directory.
    #[must_use]
    pub fn effective_dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(default_directory)
    }
}

impl Default for DiskConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: None,
            max_size: DEFAULT_MAX_DISK_CACHE_SIZE,
        }
    }
}

/// HTTP settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_decoder_parallelism() -> usize {
    DEFAULT_DECODER_PARALLELISM
}

fn default_max_size_percent() -> f64 {
    DEFAULT_MAX_SIZE_PERCENT
}

fn default_available_memory() -> usize {
    DEFAULT_AVAILABLE_MEMORY
}

fn default_max_disk_size() -> u64 {
    DEFAULT_MAX_DISK_CACHE_SIZE
}

fn default_timeout_secs() -> u64 {
    DEFAULT_HTTP_TIMEOUT.as_secs()
}

impl LoaderConfig {
    /// Merges CLI arguments into the configuration.
    pub fn merge_with_args(&mut self, args: &CliArgs) {
        if let Some(config_path) = &args.config {
            self.config = Some(config_path.clone());
        }
        if let Some(log_path) = &args.log_path {
            self.log_path = Some(log_path.clone());
        }
        if let Some(log_level) = args.log_level {
            self.log_level = log_level;
        }
        if let Some(dir) = &args.cache_dir {
            self.disk.dir = Some(dir.clone());
        }
        if args.no_disk_cache {
            self.disk.enabled = false;
        }
    }

    /// Returns default config directory.
    #[must_use]
    pub fn default_config_dir() -> Option<PathBuf> {
        ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Returns default config file path.
    #[must_use]
    pub fn default_config_path() -> Option<PathBuf> {
        Self::default_config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Returns default log file path.
    #[must_use]
    pub fn default_log_path() -> Option<PathBuf> {
        ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| dirs.data_dir().join("imago.log"))
    }

    /// Returns effective config path.
    #[must_use]
    pub fn effective_config_path(&self) -> Option<PathBuf> {
        self.config.clone().or_else(Self::default_config_path)
    }

    /// Returns effective log path.
    #[must_use]
    pub fn effective_log_path(&self) -> Option<PathBuf> {
        self.log_path.clone().or_else(Self::default_log_path)
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            config: None,
            log_path: None,
            log_level: LogLevel::Info,
            memory: MemoryConfig::default(),
            disk: DiskConfig::default(),
            network: NetworkConfig::default(),
            decoder_parallelism: DEFAULT_DECODER_PARALLELISM,
            add_last_modified_to_file_cache_key: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_partial_config() {
        let toml_content = r#"
            log_level = "debug"
            decoder_parallelism = 2

            [memory]
            max_size_bytes = 1048576
            weak_references = false

            [disk]
            enabled = false
        "#;

        let config: LoaderConfig = toml::from_str(toml_content).expect("Failed to parse config");

        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.decoder_parallelism, 2);
        assert_eq!(config.memory.max_size_bytes, Some(1_048_576));
        assert!(!config.memory.weak_references);
        assert!(config.memory.strong_references);
        assert!(!config.disk.enabled);
        assert_eq!(config.disk.max_size, DEFAULT_MAX_DISK_CACHE_SIZE);
        assert_eq!(config.network.timeout_secs, 30);
        assert!(config.add_last_modified_to_file_cache_key);
    }

    #[test]
    fn test_default_config() {
        let config: LoaderConfig = toml::from_str("").expect("Failed to parse config");

        assert_eq!(config.log_level, LogLevel::Info);
        assert_eq!(config.decoder_parallelism, DEFAULT_DECODER_PARALLELISM);
        assert!(config.disk.enabled);
        assert!((config.memory.max_size_percent - DEFAULT_MAX_SIZE_PERCENT).abs() < f64::EPSILON);
    }

    #[test]
    fn test_merge_with_args() {
        let mut config = LoaderConfig::default();
        let args = CliArgs {
            log_level: Some(LogLevel::Trace),
            no_disk_cache: true,
            cache_dir: Some(PathBuf::from("/tmp/imago-test")),
            ..CliArgs::default()
        };

        config.merge_with_args(&args);

        assert_eq!(config.log_level, LogLevel::Trace);
        assert!(!config.disk.enabled);
        assert_eq!(config.disk.effective_dir(), PathBuf::from("/tmp/imago-test"));
    }
}
