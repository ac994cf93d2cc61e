//! The interceptor chain every request runs through.

mod chain;
mod engine_interceptor;

pub use chain::{Chain, Interceptor};
pub use engine_interceptor::{EXTRA_HEIGHT, EXTRA_TRANSFORMATIONS, EXTRA_WIDTH, EngineInterceptor};
