//! Scanner module: fetching, throttling, and the recursive traversal
//!
//! This module contains the crawl itself:
//! - Blocking HTTP client construction and page loading
//! - The bandwidth-aware fetch throttle
//! - The recursive, paginated, freshness-checking traversal engine

mod fetcher;
mod throttle;
mod traversal;

pub use fetcher::{build_http_client, fetch_document};
pub use throttle::{Throttle, DEFAULT_MAX_BYTES_PER_SEC};
pub use traversal::{ScanSummary, Scanner};
