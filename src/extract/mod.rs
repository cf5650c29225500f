//! Declarative value extraction
//!
//! This module interprets the small configuration-driven grammar that pulls
//! typed values out of one HTML node:
//! - Rule evaluation with the "default" sentinel for optional locations
//! - Typed coercion to integers, timestamps and markup fragments

mod rule;
mod value;

pub use rule::{Extracted, ExtractionRule};
pub use value::{coerce, eval_fragment, eval_integer, eval_timestamp, TypedValue, ValueKind};

use thiserror::Error;

/// Errors raised while evaluating extraction rules
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    #[error("No node matches required selector: {selector}")]
    MissingNode { selector: String },

    #[error("Cannot parse {value:?} as {wanted}")]
    FieldParse { value: String, wanted: &'static str },

    #[error("Invalid field type: {0}")]
    InvalidFieldType(String),
}

/// Result type alias for extraction operations
pub type ExtractResult<T> = std::result::Result<T, ExtractError>;
