//! Callbacks for observing requests.

use crate::domain::entities::{Bitmap, Data, ErrorResult, ImageRequest, Options, Size, SuccessResult};

use super::decoder_port::DecodeResult;
use super::fetcher_port::FetchResult;

/// Per-request callbacks. Every method defaults to a no-op.
pub trait Listener: Send + Sync {
    fn on_start(&self, _request: &ImageRequest) {}

    fn on_cancel(&self, _request: &ImageRequest) {}

    fn on_error(&self, _request: &ImageRequest, _result: &ErrorResult) {}

    fn on_success(&self, _request: &ImageRequest, _result: &SuccessResult) {}
}

/// Loader-wide hooks for every pipeline stage. Every method defaults to a
/// no-op.
#[allow(unused_variables)]
pub trait EventListener: Listener {
    fn resolve_size_start(&self, request: &ImageRequest) {}

    fn resolve_size_end(&self, request: &ImageRequest, size: Size) {}

    fn map_start(&self, request: &ImageRequest, input: &Data) {}

    fn map_end(&self, request: &ImageRequest, output: &Data) {}

    fn key_start(&self, request: &ImageRequest, input: &Data) {}

    fn key_end(&self, request: &ImageRequest, output: Option<&str>) {}

    fn fetch_start(&self, request: &ImageRequest, options: &Options) {}

    fn fetch_end(&self, request: &ImageRequest, options: &Options, result: Option<&FetchResult>) {}

    fn decode_start(&self, request: &ImageRequest, options: &Options) {}

    fn decode_end(&self, request: &ImageRequest, options: &Options, result: Option<&DecodeResult>) {}

    fn transform_start(&self, request: &ImageRequest, input: &Bitmap) {}

    fn transform_end(&self, request: &ImageRequest, output: &Bitmap) {}
}

/// Event listener that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEventListener;

impl Listener for NoopEventListener {}

impl EventListener for NoopEventListener {}

#[cfg(test)]
pub mod mock {
    use super::*;
    use parking_lot::Mutex;

    /// Event listener that records the names of the hooks it saw.
    #[derive(Default)]
    pub struct RecordingEventListener {
        events: Mutex<Vec<&'static str>>,
    }

    impl RecordingEventListener {
        /// Returns the hook names in call order.
        pub fn events(&self) -> Vec<&'static str> {
            self.events.lock().clone()
        }

        fn record(&self, event: &'static str) {
            self.events.lock().push(event);
        }
    }

    impl Listener for RecordingEventListener {
        fn on_start(&self, _request: &ImageRequest) {
            self.record("start");
        }

        fn on_cancel(&self, _request: &ImageRequest) {
            self.record("cancel");
        }

        fn on_error(&self, _request: &ImageRequest, _result: &ErrorResult) {
            self.record("error");
        }

        fn on_success(&self, _request: &ImageRequest, _result: &SuccessResult) {
            self.record("success");
        }
    }

    impl EventListener for RecordingEventListener {
        fn map_start(&self, _request: &ImageRequest, _input: &Data) {
            self.record("map_start");
        }

        fn key_start(&self, _request: &ImageRequest, _input: &Data) {
            self.record("key_start");
        }

        fn fetch_start(&self, _request: &ImageRequest, _options: &Options) {
            self.record("fetch_start");
        }

        fn decode_start(&self, _request: &ImageRequest, _options: &Options) {
            self.record("decode_start");
        }

        fn transform_start(&self, _request: &ImageRequest, _input: &Bitmap) {
            self.record("transform_start");
        }
    }
}
