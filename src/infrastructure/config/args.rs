use super::loader_config::LogLevel;
use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Default, Parser)]
#[command(
    name = "imago",
    version,
    about = "Load images through a cached, cancellable pipeline",
    long_about = None
)]
pub struct CliArgs {
    /// Images to load: URLs, `file://` URIs or paths.
    #[arg(value_name = "DATA", required = true)]
    pub data: Vec<String>,

    /// Configuration file path.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log file path.
    #[arg(long, value_name = "PATH")]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Disk cache directory.
    #[arg(long, value_name = "PATH")]
    pub cache_dir: Option<PathBuf>,

    /// Do not use the disk cache.
    #[arg(long)]
    pub no_disk_cache: bool,

    /// Target width in pixels. Loads at original size when omitted.
    #[arg(long, requires = "height")]
    pub width: Option<u32>,

    /// Target height in pixels.
    #[arg(long, requires = "width")]
    pub height: Option<u32>,
}
