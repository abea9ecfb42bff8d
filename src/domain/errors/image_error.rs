//! Image loading error types.

use thiserror::Error;

/// Result type for image operations.
pub type ImageResult<T> = std::result::Result<T, ImageError>;

/// Image loading error variants.
///
/// `Clone` so one failed fetch can be handed to every waiter of a shared
/// in-flight request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[allow(missing_docs)]
pub enum ImageError {
    #[error("failed to fetch {url}: {message}")]
    FetchFailure { url: String, message: String },

    #[error("failed to decode image from {url}: {message}")]
    DecodeFailure { url: String, message: String },

    #[error("image not available: {reference}")]
    ExhaustedFallback { reference: String },
}

impl ImageError {
    /// Creates fetch failure.
    #[must_use]
    pub fn fetch(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::FetchFailure {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Creates decode failure.
    #[must_use]
    pub fn decode(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DecodeFailure {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Creates exhausted fallback error.
    #[must_use]
    pub fn exhausted(reference: impl Into<String>) -> Self {
        Self::ExhaustedFallback {
            reference: reference.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhausted_names_reference() {
        assert_eq!(
            ImageError::exhausted("mugs/a.jpg").to_string(),
            "image not available: mugs/a.jpg"
        );
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            ImageError::fetch("https://a/b.png", "HTTP 500").to_string(),
            "failed to fetch https://a/b.png: HTTP 500"
        );
    }
}
