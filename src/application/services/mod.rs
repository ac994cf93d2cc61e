mod component_registry;
mod hardware_bitmap_service;
mod request_delegate;
mod request_service;
mod view_request_manager;

pub use component_registry::{ComponentRegistry, RegistryBuilder};
pub use hardware_bitmap_service::{
    DEFAULT_HARDWARE_BITMAP_LIMIT, HardwareBitmapService, MIN_HARDWARE_DIMENSION,
};
pub use request_delegate::{BaseRequestDelegate, RequestDelegate, ViewTargetRequestDelegate};
pub use request_service::RequestService;
pub use view_request_manager::{ViewRegistry, ViewTargetRequestManager};
