//! Imago - A lifecycle-aware image loading pipeline.
//!
//! Requests are mapped, keyed, fetched, decoded and transformed through an
//! interceptor chain, with results held in a two-tier memory cache. Requests
//! bound to a view follow the view's attachment and lifecycle.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Application layer containing the loader, the interceptor chain and request services.
pub mod application;
/// Domain layer containing entities, errors, and port definitions.
pub mod domain;
/// Infrastructure layer containing caches, components and configuration.
pub mod infrastructure;

/// Current version of the library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = "imago";
