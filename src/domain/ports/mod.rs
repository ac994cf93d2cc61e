mod decoder_port;
mod fetcher_port;
mod lifecycle_port;
mod listener_port;
mod mapper_port;
mod memory_cache_port;
mod target_port;
mod transformation_port;

pub use decoder_port::{DecodeResult, Decoder, DecoderFactory};
pub use fetcher_port::{
    DrawableResult, FetchResult, Fetcher, FetcherFactory, ImageSource, SourceResult,
};
pub use lifecycle_port::{GlobalLifecycle, Lifecycle, LifecycleObserver, ObserverId};
pub use listener_port::{EventListener, Listener, NoopEventListener};
pub use mapper_port::{Keyer, Mapper};
pub use memory_cache_port::MemoryCache;
pub use target_port::{SizeResolver, Target};
pub use transformation_port::Transformation;
