//! Fetchers for data that is already on this machine.

use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;

use crate::domain::entities::{Bitmap, Data, DataSource, Drawable, Options};
use crate::domain::errors::ImageError;
use crate::domain::ports::{
    DrawableResult, FetchResult, Fetcher, FetcherFactory, ImageSource, SourceResult,
};

/// Guesses a MIME type from a file extension.
fn mime_type_for(path: &std::path::Path) -> Option<String> {
    image::ImageFormat::from_path(path)
        .ok()
        .map(|format| format.to_mime_type().to_owned())
}

/// Reads [`Data::Path`] from the local file system.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileFetcherFactory;

struct FileFetcher {
    path: PathBuf,
}

#[async_trait]
impl Fetcher for FileFetcher {
    async fn fetch(&self) -> Result<Option<FetchResult>, ImageError> {
        let meta = tokio::fs::metadata(&self.path)
            .await
            .map_err(|e| ImageError::io(format!("{}: {e}", self.path.display())))?;
        if !meta.is_file() {
            return Err(ImageError::io(format!("{} is not a file", self.path.display())));
        }
        Ok(Some(FetchResult::Source(SourceResult {
            source: ImageSource::from_file(&self.path),
            mime_type: mime_type_for(&self.path),
            data_source: DataSource::Disk,
            disk_cache_file: None,
        })))
    }

    fn cache_key(&self) -> Option<String> {
        Some(self.path.display().to_string())
    }
}

impl FetcherFactory for FileFetcherFactory {
    fn create(&self, data: &Data, _options: &Options) -> Option<Box<dyn Fetcher>> {
        match data {
            Data::Path(path) => Some(Box::new(FileFetcher { path: path.clone() })),
            _ => None,
        }
    }
}

/// Serves [`Data::Bytes`] as an in-memory source.
#[derive(Debug, Default, Clone, Copy)]
pub struct BytesFetcherFactory;

struct BytesFetcher {
    bytes: Bytes,
}

#[async_trait]
impl Fetcher for BytesFetcher {
    async fn fetch(&self) -> Result<Option<FetchResult>, ImageError> {
        Ok(Some(FetchResult::Source(SourceResult {
            source: ImageSource::from_bytes(self.bytes.clone()),
            mime_type: None,
            data_source: DataSource::Memory,
            disk_cache_file: None,
        })))
    }
}

impl FetcherFactory for BytesFetcherFactory {
    fn create(&self, data: &Data, _options: &Options) -> Option<Box<dyn Fetcher>> {
        match data {
            Data::Bytes(bytes) => Some(Box::new(BytesFetcher {
                bytes: bytes.clone(),
            })),
            _ => None,
        }
    }
}

/// Wraps an in-memory [`Bitmap`] without decoding.
#[derive(Debug, Default, Clone, Copy)]
pub struct BitmapFetcherFactory;

struct BitmapFetcher {
    bitmap: Bitmap,
}

#[async_trait]
impl Fetcher for BitmapFetcher {
    async fn fetch(&self) -> Result<Option<FetchResult>, ImageError> {
        Ok(Some(FetchResult::Drawable(DrawableResult {
            drawable: Drawable::Bitmap(self.bitmap.clone()),
            is_sampled: false,
            data_source: DataSource::Memory,
        })))
    }

    fn cache_key(&self) -> Option<String> {
        Some(format!("bitmap:{}", self.bitmap.id()))
    }
}

impl FetcherFactory for BitmapFetcherFactory {
    fn create(&self, data: &Data, _options: &Options) -> Option<Box<dyn Fetcher>> {
        match data {
            Data::Bitmap(bitmap) => Some(Box::new(BitmapFetcher {
                bitmap: bitmap.clone(),
            })),
            _ => None,
        }
    }
}

/// Passes a [`Drawable`] straight through.
#[derive(Debug, Default, Clone, Copy)]
pub struct DrawableFetcherFactory;

struct DrawableFetcher {
    drawable: Drawable,
}

#[async_trait]
impl Fetcher for DrawableFetcher {
    async fn fetch(&self) -> Result<Option<FetchResult>, ImageError> {
        Ok(Some(FetchResult::Drawable(DrawableResult {
            drawable: self.drawable.clone(),
            is_sampled: false,
            data_source: DataSource::Memory,
        })))
    }
}

impl FetcherFactory for DrawableFetcherFactory {
    fn create(&self, data: &Data, _options: &Options) -> Option<Box<dyn Fetcher>> {
        match data {
            Data::Drawable(drawable) => Some(Box::new(DrawableFetcher {
                drawable: drawable.clone(),
            })),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::DynamicImage;

    #[tokio::test]
    async fn test_file_fetcher_reports_disk_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.png");
        std::fs::write(&path, b"not really a png").unwrap();

        let fetcher = FileFetcherFactory
            .create(&Data::Path(path.clone()), &Options::default())
            .unwrap();
        let Some(FetchResult::Source(result)) = fetcher.fetch().await.unwrap() else {
            panic!("expected a source result");
        };

        assert_eq!(result.data_source, DataSource::Disk);
        assert_eq!(result.mime_type.as_deref(), Some("image/png"));
        assert_eq!(result.source.file(), Some(path.as_path()));
    }

    #[tokio::test]
    async fn test_file_fetcher_fails_for_missing_file() {
        let fetcher = FileFetcherFactory
            .create(&Data::Path(PathBuf::from("/definitely/missing.png")), &Options::default())
            .unwrap();
        assert!(matches!(fetcher.fetch().await, Err(ImageError::Io(_))));
    }

    #[tokio::test]
    async fn test_bitmap_fetcher_skips_decoding() {
        let bitmap = Bitmap::new(DynamicImage::new_rgba8(2, 2));
        let fetcher = BitmapFetcherFactory
            .create(&Data::Bitmap(bitmap.clone()), &Options::default())
            .unwrap();

        let Some(FetchResult::Drawable(result)) = fetcher.fetch().await.unwrap() else {
            panic!("expected a drawable result");
        };
        assert_eq!(result.drawable, Drawable::Bitmap(bitmap));
        assert_eq!(result.data_source, DataSource::Memory);
    }

    #[test]
    fn test_factories_reject_other_kinds() {
        let options = Options::default();
        let data = Data::from("x");
        assert!(FileFetcherFactory.create(&data, &options).is_none());
        assert!(BytesFetcherFactory.create(&data, &options).is_none());
        assert!(BitmapFetcherFactory.create(&data, &options).is_none());
        assert!(DrawableFetcherFactory.create(&data, &options).is_none());
    }
}
