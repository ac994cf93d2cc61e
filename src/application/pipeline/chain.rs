use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::domain::entities::{ImageRequest, ImageResult, Size};
use crate::domain::errors::ImageError;
use crate::domain::ports::EventListener;

/// One link of the interceptor chain.
///
/// An interceptor may short-circuit with its own result, or call
/// [`Chain::proceed`] to hand the (possibly rewritten) request to the next one.
/// The last interceptor of every chain produces the result itself.
#[async_trait]
pub trait Interceptor: Send + Sync {
    /// # Errors
    /// Returns [`ImageError::Cancelled`] if the request was cancelled. Other
    /// failures should be reported as [`ImageResult::Error`].
    async fn intercept(&self, chain: Chain) -> Result<ImageResult, ImageError>;
}

/// The state handed to an interceptor.
#[derive(Clone)]
pub struct Chain {
    request: ImageRequest,
    interceptors: Arc<[Arc<dyn Interceptor>]>,
    index: usize,
    size: Size,
    is_placeholder_cached: bool,
    event_listener: Arc<dyn EventListener>,
    cancellation: CancellationToken,
}

impl Chain {
    #[must_use]
    pub fn new(
        request: ImageRequest,
        interceptors: Arc<[Arc<dyn Interceptor>]>,
        size: Size,
        is_placeholder_cached: bool,
        event_listener: Arc<dyn EventListener>,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            request,
            interceptors,
            index: 0,
            size,
            is_placeholder_cached,
            event_listener,
            cancellation,
        }
    }

    #[must_use]
    pub fn request(&self) -> &ImageRequest {
        &self.request
    }

    /// The resolved size of the request.
    #[must_use]
    pub fn size(&self) -> Size {
        self.size
    }

    /// Returns a copy of this chain that proceeds with `size`.
    #[must_use]
    pub fn with_size(&self, size: Size) -> Self {
        Self {
            size,
            ..self.clone()
        }
    }

    /// Whether the placeholder shown for this request came from the memory cache.
    #[must_use]
    pub fn is_placeholder_cached(&self) -> bool {
        self.is_placeholder_cached
    }

    #[must_use]
    pub fn event_listener(&self) -> &Arc<dyn EventListener> {
        &self.event_listener
    }

    /// Token cancelled when the request's job is cancelled.
    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Runs the next interceptor with `request`.
    ///
    /// # Errors
    /// Returns [`ImageError::Component`] if the request's target or lifecycle
    /// was swapped, or if the chain ran out of interceptors.
    pub async fn proceed(&self, request: ImageRequest) -> Result<ImageResult, ImageError> {
        if self.index > 0 {
            self.check_request(&request)?;
        }
        let Some(interceptor) = self.interceptors.get(self.index).cloned() else {
            return Err(ImageError::component(
                "interceptor chain ended without producing a result",
            ));
        };
        let next = Self {
            request,
            index: self.index + 1,
            ..self.clone()
        };
        interceptor.intercept(next).await
    }

    fn check_request(&self, request: &ImageRequest) -> Result<(), ImageError> {
        let same_target = match (self.request.target(), request.target()) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        };
        if !same_target {
            return Err(ImageError::component(format!(
                "interceptor {} cannot modify the request's target",
                self.index - 1
            )));
        }
        if !Arc::ptr_eq(self.request.lifecycle(), request.lifecycle()) {
            return Err(ImageError::component(format!(
                "interceptor {} cannot modify the request's lifecycle",
                self.index - 1
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{Drawable, ErrorResult};
    use crate::domain::ports::NoopEventListener;
    use crate::domain::ports::mocks::RecordingTarget;

    struct Terminal;

    #[async_trait]
    impl Interceptor for Terminal {
        async fn intercept(&self, chain: Chain) -> Result<ImageResult, ImageError> {
            Ok(ImageResult::Error(ErrorResult {
                drawable: Some(Drawable::color([0, 0, 0, 255])),
                request: chain.request().clone(),
                error: ImageError::component(chain.size().to_string()),
            }))
        }
    }

    struct Resize;

    #[async_trait]
    impl Interceptor for Resize {
        async fn intercept(&self, chain: Chain) -> Result<ImageResult, ImageError> {
            let request = chain.request().clone();
            chain.with_size(Size::pixels(10, 10)).proceed(request).await
        }
    }

    struct SwapTarget;

    #[async_trait]
    impl Interceptor for SwapTarget {
        async fn intercept(&self, chain: Chain) -> Result<ImageResult, ImageError> {
            let request = chain
                .request()
                .new_builder()
                .target(Arc::new(RecordingTarget::default()))
                .build();
            chain.proceed(request).await
        }
    }

    fn chain(interceptors: Vec<Arc<dyn Interceptor>>) -> Chain {
        Chain::new(
            ImageRequest::builder("x").build(),
            interceptors.into(),
            Size::Original,
            false,
            Arc::new(NoopEventListener),
            CancellationToken::new(),
        )
    }

    #[tokio::test]
    async fn test_interceptors_see_updated_size() {
        let chain = chain(vec![Arc::new(Resize), Arc::new(Terminal)]);
        let request = chain.request().clone();

        let result = chain.proceed(request).await.unwrap();

        let error = &result.as_error().unwrap().error;
        assert_eq!(error, &ImageError::component("10x10"));
    }

    #[tokio::test]
    async fn test_target_swap_is_rejected() {
        let chain = chain(vec![Arc::new(SwapTarget), Arc::new(Terminal)]);
        let request = chain.request().clone();

        let result = chain.proceed(request).await;

        assert!(matches!(result, Err(ImageError::Component(message)) if message.contains("target")));
    }

    #[tokio::test]
    async fn test_exhausted_chain_fails() {
        let chain = chain(Vec::new());
        let request = chain.request().clone();
        assert!(matches!(chain.proceed(request).await, Err(ImageError::Component(_))));
    }
}
