//! HTTP fetching for the scanner
//!
//! This module builds the blocking HTTP client shared by the login step and
//! the crawl, and loads pages into parsed documents. Every fetch is awaited
//! to completion and followed by the bandwidth throttle's delay before the
//! body is parsed or another request is issued.

use std::time::Duration;

use reqwest::blocking::Client;
use scraper::Html;

use crate::scanner::Throttle;
use crate::ScanError;

/// Builds the HTTP client used for a forum's entire scan
///
/// The cookie store is enabled so a login-form submission carries its
/// session into the crawl that follows.
pub fn build_http_client() -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(concat!("forum-scanner/", env!("CARGO_PKG_VERSION")))
        .cookie_store(true)
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches a page and parses it, applying the throttle in between
///
/// # Arguments
///
/// * `client` - The HTTP client to use
/// * `url` - The URL to fetch
/// * `throttle` - The bandwidth throttle consulted after the body is read
///
/// # Returns
///
/// * `Ok(Html)` - The parsed document
/// * `Err(ScanError)` - Transport failure or a non-success status
pub fn fetch_document(client: &Client, url: &str, throttle: &Throttle) -> Result<Html, ScanError> {
    let response = client.get(url).send().map_err(|source| ScanError::Fetch {
        url: url.to_string(),
        source,
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(ScanError::HttpStatus {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let content_length = response.content_length();
    let body = response.text().map_err(|source| ScanError::Fetch {
        url: url.to_string(),
        source,
    })?;

    let delay = throttle.delay_for(content_length);
    if !delay.is_zero() {
        tracing::trace!("Throttling {:?} after fetching {}", delay, url);
        std::thread::sleep(delay);
    }

    Ok(Html::parse_document(&body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_http_client() {
        let client = build_http_client();
        assert!(client.is_ok());
    }
}
