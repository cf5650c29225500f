//! Typed coercion of extracted strings
//!
//! Extraction always produces a string first; the coercions here turn that
//! string into the semantic type a field calls for.

use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDateTime};
use scraper::{ElementRef, Html};

use crate::extract::{ExtractError, ExtractResult, ExtractionRule};

/// The semantic types a field can be coerced to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Text,
    Integer,
    Timestamp,
    Fragment,
}

impl FromStr for ValueKind {
    type Err = ExtractError;

    fn from_str(s: &str) -> ExtractResult<Self> {
        match s {
            "text" => Ok(Self::Text),
            "integer" => Ok(Self::Integer),
            "timestamp" => Ok(Self::Timestamp),
            "fragment" => Ok(Self::Fragment),
            other => Err(ExtractError::InvalidFieldType(other.to_string())),
        }
    }
}

/// A coerced field value
#[derive(Debug, Clone)]
pub enum TypedValue {
    Text(String),
    Integer(i64),
    Timestamp(DateTime<FixedOffset>),

    /// The value re-parsed as a standalone fragment document, so it can be
    /// transformed independently of the page it came from
    Fragment(Html),
}

/// Coerces an extracted string to the requested kind
///
/// `date_format` is consulted only for timestamp coercion.
pub fn coerce(
    value: String,
    kind: ValueKind,
    date_format: Option<&str>,
) -> ExtractResult<TypedValue> {
    match kind {
        ValueKind::Text => Ok(TypedValue::Text(value)),
        ValueKind::Integer => parse_integer(&value).map(TypedValue::Integer),
        ValueKind::Timestamp => parse_timestamp(&value, date_format).map(TypedValue::Timestamp),
        ValueKind::Fragment => Ok(TypedValue::Fragment(Html::parse_fragment(&value))),
    }
}

/// Evaluates a rule and coerces the result to an integer
///
/// A leading `#` marker (forum post anchors render indexes as `#12`) is
/// stripped before parsing.
pub fn eval_integer(rule: &ExtractionRule, node: ElementRef) -> ExtractResult<i64> {
    parse_integer(&rule.eval(node)?.into_string())
}

/// Evaluates a rule and coerces the result to a timestamp
pub fn eval_timestamp(
    rule: &ExtractionRule,
    node: ElementRef,
    date_format: Option<&str>,
) -> ExtractResult<DateTime<FixedOffset>> {
    parse_timestamp(&rule.eval(node)?.into_string(), date_format)
}

/// Evaluates a rule and re-parses the result as a fragment document
pub fn eval_fragment(rule: &ExtractionRule, node: ElementRef) -> ExtractResult<Html> {
    Ok(Html::parse_fragment(&rule.eval(node)?.into_string()))
}

fn parse_integer(value: &str) -> ExtractResult<i64> {
    let trimmed = value.trim();
    let digits = trimmed.strip_prefix('#').unwrap_or(trimmed);
    digits.parse().map_err(|_| ExtractError::FieldParse {
        value: value.to_string(),
        wanted: "integer",
    })
}

/// Parses a timestamp using the configured format, or a small set of
/// locale-independent defaults when none is configured
fn parse_timestamp(value: &str, format: Option<&str>) -> ExtractResult<DateTime<FixedOffset>> {
    let trimmed = value.trim();
    let parsed = match format {
        Some(fmt) => DateTime::parse_from_str(trimmed, fmt).ok().or_else(|| {
            NaiveDateTime::parse_from_str(trimmed, fmt)
                .ok()
                .map(|naive| naive.and_utc().fixed_offset())
        }),
        None => DateTime::parse_from_rfc3339(trimmed)
            .ok()
            .or_else(|| DateTime::parse_from_rfc2822(trimmed).ok())
            .or_else(|| {
                NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S")
                    .ok()
                    .map(|naive| naive.and_utc().fixed_offset())
            }),
    };

    parsed.ok_or_else(|| ExtractError::FieldParse {
        value: value.to_string(),
        wanted: "timestamp",
    })
}
