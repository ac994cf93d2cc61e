use std::sync::Arc;

use clap::Parser;
use color_eyre::eyre::Result;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use imago::application::ImageLoaderBuilder;
use imago::domain::entities::{ImageRequest, ImageResult, Size};
use imago::infrastructure::{CliArgs, ConfigStorage, DiskCache, LoaderConfig};

fn init_logging(config: &LoaderConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_string()));

    if let Some(log_path) = config.effective_log_path() {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        let file_layer = fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .init();

        info!(path = %log_path.display(), "Logging initialized");
    } else {
        tracing_subscriber::registry().with(filter).init();
    }

    Ok(())
}

fn load_config(args: &CliArgs) -> Result<LoaderConfig> {
    let storage = ConfigStorage::new()?;
    let mut config = storage.load_config(args.config.as_deref())?;
    config.merge_with_args(args);
    Ok(config)
}

async fn open_disk_cache(config: &LoaderConfig) -> Option<Arc<DiskCache>> {
    if !config.disk.enabled {
        return None;
    }
    match DiskCache::open(config.disk.effective_dir(), config.disk.max_size).await {
        Ok(cache) => Some(Arc::new(cache)),
        Err(e) => {
            warn!(error = %e, "Disk cache unavailable, continuing without it");
            None
        }
    }
}

fn describe(result: &ImageResult) -> String {
    match result {
        ImageResult::Success(success) => {
            let size = success
                .drawable
                .as_bitmap()
                .map_or_else(|| "n/a".to_string(), |b| format!("{}x{}", b.width(), b.height()));
            format!(
                "{} from {} (sampled: {})",
                size, success.data_source, success.is_sampled
            )
        }
        ImageResult::Error(error) => format!("error: {}", error.error),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = CliArgs::parse();
    let config = load_config(&args)?;
    init_logging(&config)?;

    info!(version = imago::VERSION, "Starting imago");

    let mut builder = ImageLoaderBuilder::from_config(&config);
    if let Some(disk_cache) = open_disk_cache(&config).await {
        builder = builder.disk_cache(disk_cache);
    }
    let loader = builder.build()?;

    let size = match (args.width, args.height) {
        (Some(width), Some(height)) => Size::pixels(width, height),
        _ => Size::Original,
    };

    for data in &args.data {
        let request = ImageRequest::builder(data.as_str()).size(size).build();
        // The second load shows whether the memory cache served the image.
        for attempt in 1..=2 {
            let result = loader.execute(request.clone()).await?;
            println!("{data} [{attempt}]: {}", describe(&result));
        }
    }

    loader.shutdown();
    Ok(())
}
