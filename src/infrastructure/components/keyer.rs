use std::time::UNIX_EPOCH;

use sha2::{Digest, Sha256};

use crate::domain::entities::{Data, Drawable, Options};
use crate::domain::ports::Keyer;

/// Keyer for the built-in data kinds.
///
/// URIs key on their text, paths on the path (plus modification time when
/// enabled), bytes on a content hash and bitmaps on their identity.
#[derive(Debug, Clone, Copy)]
pub struct CompositeKeyer {
    add_last_modified_to_file_cache_key: bool,
}

impl CompositeKeyer {
    #[must_use]
    pub const fn new(add_last_modified_to_file_cache_key: bool) -> Self {
        Self {
            add_last_modified_to_file_cache_key,
        }
    }
}

impl Default for CompositeKeyer {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Keyer for CompositeKeyer {
    fn key(&self, data: &Data, _options: &Options) -> Option<String> {
        match data {
            Data::Uri(uri) => Some(uri.to_string()),
            Data::Path(path) => {
                let base = path.display().to_string();
                if !self.add_last_modified_to_file_cache_key {
                    return Some(base);
                }
                let modified = std::fs::metadata(path)
                    .and_then(|meta| meta.modified())
                    .ok()
                    .and_then(|time| time.duration_since(UNIX_EPOCH).ok());
                Some(match modified {
                    Some(since_epoch) => format!("{base}:{}", since_epoch.as_millis()),
                    None => base,
                })
            }
            Data::Bytes(bytes) => {
                let digest = Sha256::digest(bytes);
                Some(format!("bytes:{}", hex::encode(&digest[..16])))
            }
            Data::Bitmap(bitmap) | Data::Drawable(Drawable::Bitmap(bitmap)) => {
                Some(format!("bitmap:{}", bitmap.id()))
            }
            Data::Null
            | Data::String(_)
            | Data::Drawable(Drawable::Color { .. })
            | Data::Custom { .. } => None,
        }
    }
}
