//! Positional record extraction with three independent regex scans.
//!
//! Each field pattern is scanned over the whole document on its own, left
//! to right and non-overlapping, collecting capture group 1 of every match.
//! The three match lists are then zipped by position and truncated to the
//! shortest list. Nothing checks that the i-th name, price, and market cap
//! belong to the same row: if the page layout drifts, rows come out
//! misaligned without any error.

use coinwatch_core::config::PatternSet;
use coinwatch_core::error::AppError;
use coinwatch_core::models::{Record, RecordList};
use coinwatch_core::traits::Extractor;
use regex::Regex;

/// [`Extractor`] backed by three compiled field patterns.
#[derive(Debug, Clone)]
pub struct PatternExtractor {
    name: Regex,
    price: Regex,
    market_cap: Regex,
}

impl PatternExtractor {
    /// Compile a pattern set. Each pattern needs exactly one capturing group.
    pub fn new(patterns: &PatternSet) -> Result<Self, AppError> {
        Ok(Self {
            name: compile_field("name", &patterns.name)?,
            price: compile_field("price", &patterns.price)?,
            market_cap: compile_field("market_cap", &patterns.market_cap)?,
        })
    }

    pub fn with_defaults() -> Result<Self, AppError> {
        Self::new(&PatternSet::default())
    }
}

impl Extractor for PatternExtractor {
    fn extract(&self, document: &str) -> Result<RecordList, AppError> {
        extract_records(document, &self.name, &self.price, &self.market_cap)
    }
}

fn compile_field(field: &str, pattern: &str) -> Result<Regex, AppError> {
    let regex = Regex::new(pattern)
        .map_err(|e| AppError::InvalidPattern(format!("{field} pattern: {e}")))?;

    // Group 0 is the whole match.
    let groups = regex.captures_len() - 1;
    if groups != 1 {
        return Err(AppError::InvalidPattern(format!(
            "{field} pattern must have exactly one capturing group, found {groups}"
        )));
    }

    Ok(regex)
}

/// Capture group 1 of every non-overlapping match, in document order.
///
/// A match where the group did not participate contributes an empty string.
pub fn scan<'d>(document: &'d str, pattern: &Regex) -> Vec<&'d str> {
    pattern
        .captures_iter(document)
        .map(|caps| caps.get(1).map_or("", |m| m.as_str()))
        .collect()
}

/// Scan `document` with each field pattern and zip the results by position.
///
/// Returns [`AppError::ParseError`] when no complete record can be formed.
pub fn extract_records(
    document: &str,
    name_pattern: &Regex,
    price_pattern: &Regex,
    market_cap_pattern: &Regex,
) -> Result<RecordList, AppError> {
    let names = scan(document, name_pattern);
    let prices = scan(document, price_pattern);
    let market_caps = scan(document, market_cap_pattern);

    if names.len() != prices.len() || names.len() != market_caps.len() {
        tracing::debug!(
            names = names.len(),
            prices = prices.len(),
            market_caps = market_caps.len(),
            "Field match counts differ, surplus matches dropped"
        );
    }

    let records: RecordList = names
        .iter()
        .zip(&prices)
        .zip(&market_caps)
        .map(|((name, price), market_cap)| Record::new(*name, *price, *market_cap))
        .collect();

    if records.is_empty() {
        return Err(AppError::ParseError("no structured data found".into()));
    }

    Ok(records)
}
