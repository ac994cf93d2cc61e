//! The image loader and the handles it returns.

mod builder;
mod disposable;
mod image_loader;
mod job;

pub use builder::ImageLoaderBuilder;
pub use disposable::{Disposable, OneShotDisposable, ViewTargetDisposable};
pub use image_loader::{ImageLoader, WeakImageLoader};
pub use job::{Job, JobOutcome};
