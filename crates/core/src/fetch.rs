//! HTTP fetching for article pages and image assets.
//!
//! This module provides the shared [`FetchConfig`] plus functions for
//! retrieving HTML documents and raw image bytes. Every network operation
//! in the pipeline goes through here, so the configured timeout applies
//! uniformly; a hung remote server fails the request instead of hanging it.

use std::time::Duration;

use reqwest::Client;
use url::Url;

use crate::{BinderyError, Result};

/// HTTP client configuration shared by page and image fetches.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Request timeout in seconds.
    pub timeout: u64,
    /// Custom User-Agent string.
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: 30,
            user_agent: "Mozilla/5.0 (compatible; Bindery/0.3; +https://github.com/bindery/bindery)".to_string(),
        }
    }
}

impl FetchConfig {
    /// Builds a reqwest client with this configuration applied.
    pub(crate) fn client(&self) -> Result<Client> {
        Client::builder()
            .timeout(Duration::from_secs(self.timeout))
            .user_agent(&self.user_agent)
            .build()
            .map_err(BinderyError::Http)
    }

    fn map_send_error(&self, e: reqwest::Error) -> BinderyError {
        if e.is_timeout() {
            BinderyError::Timeout { timeout: self.timeout }
        } else {
            BinderyError::Http(e)
        }
    }
}

/// Parses and validates a URL string.
pub fn parse_url(url: &str) -> Result<Url> {
    let parsed = Url::parse(url).map_err(|e| BinderyError::InvalidUrl(format!("{}: {}", url, e)))?;

    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(BinderyError::InvalidUrl(format!(
            "{}: only http and https URLs are supported",
            url
        )));
    }

    Ok(parsed)
}

/// Fetches an HTML document from a URL.
///
/// Performs an HTTP GET and returns the response body as text. Redirects
/// are followed and a non-success status is an error.
pub async fn fetch_html(url: &Url, config: &FetchConfig) -> Result<String> {
    let client = config.client()?;

    let response = client
        .get(url.clone())
        .header(
            "Accept",
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        )
        .header("Accept-Language", "en-US,en;q=0.9")
        .send()
        .await
        .map_err(|e| config.map_send_error(e))?;

    if !response.status().is_success() {
        return Err(BinderyError::Extraction(format!(
            "{} returned status {}",
            url,
            response.status()
        )));
    }

    Ok(response.text().await?)
}

/// Fetches raw bytes from a URL.
///
/// Used for image assets. A non-success status or any transport error maps
/// to [`BinderyError::ImageFetch`] so a single bad image fails fast.
pub async fn fetch_bytes(url: &str, config: &FetchConfig) -> Result<Vec<u8>> {
    let client = config.client()?;

    let response = client.get(url).send().await.map_err(|e| BinderyError::ImageFetch {
        url: url.to_string(),
        reason: if e.is_timeout() {
            format!("timed out after {} seconds", config.timeout)
        } else {
            e.to_string()
        },
    })?;

    if !response.status().is_success() {
        return Err(BinderyError::ImageFetch {
            url: url.to_string(),
            reason: format!("status {}", response.status()),
        });
    }

    let bytes = response.bytes().await.map_err(|e| BinderyError::ImageFetch {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    Ok(bytes.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_config_default() {
        let config = FetchConfig::default();
        assert_eq!(config.timeout, 30);
        assert!(config.user_agent.contains("Bindery"));
    }

    #[test]
    fn test_parse_url_valid() {
        assert!(parse_url("https://example.com/post").is_ok());
        assert!(parse_url("http://example.com").is_ok());
    }

    #[test]
    fn test_parse_url_invalid() {
        assert!(matches!(parse_url("not-a-url"), Err(BinderyError::InvalidUrl(_))));
        assert!(matches!(parse_url("example.com"), Err(BinderyError::InvalidUrl(_))));
    }

    #[test]
    fn test_parse_url_rejects_other_schemes() {
        assert!(matches!(
            parse_url("ftp://example.com/file"),
            Err(BinderyError::InvalidUrl(_))
        ));
        assert!(matches!(
            parse_url("file:///etc/passwd"),
            Err(BinderyError::InvalidUrl(_))
        ));
    }
}
