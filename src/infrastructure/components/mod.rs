//! Default mappers, keyers, fetchers and decoders.

mod http_fetcher;
mod image_decoder;
mod keyer;
mod local_fetchers;
mod mappers;

pub use http_fetcher::{DEFAULT_HTTP_TIMEOUT, HttpFetcherFactory};
pub use image_decoder::{DEFAULT_DECODER_PARALLELISM, ImageDecoderFactory};
pub use keyer::CompositeKeyer;
pub use local_fetchers::{
    BitmapFetcherFactory, BytesFetcherFactory, DrawableFetcherFactory, FileFetcherFactory,
};
pub use mappers::{FileUriMapper, StringMapper};
