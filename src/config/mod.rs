//! Configuration module for Forum-Scanner
//!
//! This module handles loading, parsing, and validating TOML configuration
//! files. A configuration names one or more forums; each carries the
//! extraction rules for its three hierarchy levels plus optional login-form
//! and notification settings.

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    AddressConfig, Config, EmailConfig, ForumConfig, LevelRules, LoginFormConfig, PostRules,
};

// Re-export parser functions
pub use parser::load_config;
