//! Error types for bindery operations.
//!
//! This module defines the main error type [`BinderyError`] which represents
//! all possible errors that can occur while extracting articles, relocating
//! images, rendering the cover, and packaging the final book.
//!
//! # Example
//!
//! ```rust
//! use bindery_core::{BinderyError, Result};
//!
//! fn check_articles(urls: &[String]) -> Result<()> {
//!     if urls.is_empty() {
//!         return Err(BinderyError::EmptyRequest);
//!     }
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// Main error type for book generation.
///
/// Every failure in any concurrent sub-task propagates as one of these
/// variants and aborts the whole book-generation request; there is no
/// partial book output.
#[derive(Error, Debug)]
pub enum BinderyError {
    /// HTTP request errors from reqwest.
    ///
    /// Wraps network errors, DNS failures, connection issues, and other
    /// HTTP-level problems.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Request timeout.
    ///
    /// Returned when an HTTP request exceeds the configured timeout duration.
    #[error("Request timed out after {timeout} seconds")]
    Timeout { timeout: u64 },

    /// Invalid URL provided.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The source page could not be turned into an article.
    ///
    /// Returned for non-HTML content, pages with no usable body, and
    /// parser failures.
    #[error("Extraction failed: {0}")]
    Extraction(String),

    /// A single image download failed.
    ///
    /// One failed fetch fails the whole relocation for that article;
    /// there is no partial-success path and no retry.
    #[error("Failed to fetch image {url}: {reason}")]
    ImageFetch { url: String, reason: String },

    /// Rendering failed.
    ///
    /// Covers the image-pass re-serialization producing empty output and
    /// cover titles that cannot be fit at the minimum font size.
    #[error("Render failed: {0}")]
    Render(String),

    /// The package writer rejected the assembled book.
    ///
    /// Returned when required metadata fields are missing or an asset
    /// path is unreadable.
    #[error("Packaging failed: {0}")]
    Packaging(String),

    /// No articles were supplied.
    #[error("At least one article URL is required")]
    EmptyRequest,

    /// File I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for BinderyError.
pub type Result<T> = std::result::Result<T, BinderyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BinderyError::InvalidUrl("not a url".to_string());
        assert!(err.to_string().contains("Invalid URL"));
    }

    #[test]
    fn test_image_fetch_error() {
        let err = BinderyError::ImageFetch {
            url: "https://example.com/a.png".to_string(),
            reason: "status 404".to_string(),
        };
        assert!(err.to_string().contains("a.png"));
        assert!(err.to_string().contains("404"));
    }

    #[test]
    fn test_timeout_error() {
        let err = BinderyError::Timeout { timeout: 30 };
        assert!(err.to_string().contains("30"));
    }

    #[test]
    fn test_from_io_error() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = BinderyError::from(io);
        assert!(matches!(err, BinderyError::Io(_)));
    }
}
