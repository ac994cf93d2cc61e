//! Port definitions for normalizing data and deriving its cache identity.

use crate::domain::entities::{Data, Options};

/// Converts data of one kind into another, e.g. a string into a URI.
pub trait Mapper: Send + Sync {
    /// Returns `None` if this mapper does not apply to `data`.
    fn map(&self, data: &Data, options: &Options) -> Option<Data>;
}

/// Derives the base memory cache key for mapped data.
pub trait Keyer: Send + Sync {
    /// Returns `None` if `data` should not be memory cached by this keyer.
    fn key(&self, data: &Data, options: &Options) -> Option<String>;
}
