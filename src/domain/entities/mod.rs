//! Domain entity definitions.

mod bitmap;
mod cache;
mod data;
mod dispatcher;
mod options;
mod request;
mod result;
mod size;
mod view;

pub use bitmap::{
    Bitmap, BitmapConfig, DEFAULT_DRAWABLE_SIZE, Drawable, WeakBitmap, live_hardware_bitmaps,
};
pub use cache::{CacheKey, CachePolicy, CacheValue, TrimLevel};
pub use data::{Data, DataKind, Uri};
pub use dispatcher::Dispatcher;
pub use options::{ColorSpace, Options, Parameter, Parameters};
pub use request::{ImageRequest, ImageRequestBuilder};
pub use result::{DataSource, ErrorResult, ImageResult, SuccessResult};
pub use size::{Scale, Size, compute_size_multiplier};
pub use view::{View, ViewAttachListener, ViewId};
