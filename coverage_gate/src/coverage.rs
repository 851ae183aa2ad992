//! Coverage extraction from free-form test output.

use once_cell::sync::Lazy;
use regex::Regex;

/// First `<digits>.<digits>%` literal in the output, e.g. `coverage: 85.3% of statements`.
static COVERAGE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[0-9]*\.[0-9]*%").expect("coverage pattern is valid"));

#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    /// No percentage literal anywhere in the output.
    NoTests,
    /// The pattern matched but the text is not a number (e.g. `.%`).
    Unparseable { matched: String, reason: String },
    Measured(f64),
}

pub fn extract_coverage(output: &str) -> Extraction {
    let Some(found) = COVERAGE_PATTERN.find(output) else {
        return Extraction::NoTests;
    };

    let matched = found.as_str();
    let number = matched.strip_suffix('%').unwrap_or(matched);
    match number.parse::<f64>() {
        Ok(coverage) => Extraction::Measured(coverage),
        Err(err) => Extraction::Unparseable {
            matched: matched.to_string(),
            reason: err.to_string(),
        },
    }
}
