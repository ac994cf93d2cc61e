//! Application layer: request orchestration and the services behind it.

/// The image loader, jobs and disposables.
pub mod loader;
/// The interceptor chain and the engine at its end.
pub mod pipeline;
/// Component registry, request rules and view bookkeeping.
pub mod services;

pub use loader::{Disposable, ImageLoader, ImageLoaderBuilder, Job};
pub use pipeline::{Chain, Interceptor};
pub use services::ComponentRegistry;
