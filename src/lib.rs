//! Forum-Scanner: an incremental forum watcher
//!
//! This crate crawls forum-style paginated hierarchies (forum → topic → post),
//! extracts structured records using declarative, configuration-driven rules,
//! tracks which items have already been seen in SQLite, and emails
//! notifications for newly observed posts.

pub mod config;
pub mod extract;
pub mod forms;
pub mod item;
pub mod notify;
pub mod scanner;
pub mod storage;

use thiserror::Error;

use crate::item::ItemKind;

/// Main error type for Forum-Scanner operations
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP error for {url}: {source}")]
    Fetch { url: String, source: reqwest::Error },

    #[error("HTTP status {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    #[error("Extraction error: {0}")]
    Extract(#[from] extract::ExtractError),

    #[error("Cannot derive {kind:?} id: {detail}")]
    IdExtraction { kind: ItemKind, detail: String },

    #[error("Unsupported form method: {0}")]
    UnsupportedFormMethod(String),

    #[error("Unsupported form enctype: {0}")]
    UnsupportedFormEncoding(String),

    /// Planned early stop once the per-run send cap is reached, not a failure.
    #[error("Maximum email limit reached for this run")]
    EmailLimitReached,

    #[error("Notification error: {0}")]
    Notify(#[from] notify::NotifyError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result type alias for Forum-Scanner operations
pub type Result<T> = std::result::Result<T, ScanError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use extract::{Extracted, ExtractionRule};
pub use item::{ItemRef, PostDetails};
pub use scanner::{ScanSummary, Scanner};
pub use storage::ScanStorage;
