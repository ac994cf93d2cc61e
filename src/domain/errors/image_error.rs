//! Image pipeline error types.

use thiserror::Error;

/// Errors raised while loading an image.
///
/// Payloads are strings so results carrying an error stay `Clone`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum ImageError {
    #[error("the request's data is null")]
    NullRequestData,

    #[error("unable to create a fetcher that supports: {data}")]
    NoFetcher { data: String },

    #[error("unable to create a decoder that supports: {data}")]
    NoDecoder { data: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("HTTP {status}: {url}")]
    Http { status: u16, url: String },

    #[error("network reads are disabled and {url} is not cached on disk")]
    NetworkDisabled { url: String },

    #[error("IO error: {0}")]
    Io(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("transformation failed: {0}")]
    Transformation(String),

    #[error("the image loader is shut down")]
    Shutdown,

    #[error("the request was cancelled")]
    Cancelled,

    #[error("{0}")]
    Component(String),
}

impl ImageError {
    /// Creates decode error.
    #[must_use]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    /// Creates IO error.
    #[must_use]
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io(message.into())
    }

    /// Creates network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    /// Creates transformation error.
    #[must_use]
    pub fn transformation(message: impl Into<String>) -> Self {
        Self::Transformation(message.into())
    }

    /// Creates a generic component error.
    #[must_use]
    pub fn component(message: impl Into<String>) -> Self {
        Self::Component(message.into())
    }

    /// Returns whether this is cooperative cancellation rather than a fault.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns whether error is network related.
    #[must_use]
    pub const fn is_network_error(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Http { .. } | Self::NetworkDisabled { .. }
        )
    }
}

impl From<std::io::Error> for ImageError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

impl From<image::ImageError> for ImageError {
    fn from(error: image::ImageError) -> Self {
        Self::Decode(error.to_string())
    }
}

impl From<reqwest::Error> for ImageError {
    fn from(error: reqwest::Error) -> Self {
        match error.status() {
            Some(status) => Self::Http {
                status: status.as_u16(),
                url: error.url().map(ToString::to_string).unwrap_or_default(),
            },
            None => Self::Network(error.to_string()),
        }
    }
}
