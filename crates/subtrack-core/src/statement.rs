//! Bank statement (document) support
//!
//! The document variant of the pipeline has no structured transactions to
//! lean on, so dates are recovered directly from the extracted text: each
//! line is scanned for a leading date token, the date is stripped, and the
//! normalized remainder maps to the latest date seen for that description.
//! The resulting index substitutes for "the group's most recent transaction
//! date" during renewal resolution.

use std::collections::HashMap;
use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::error::{Error, Result};
use crate::normalize::{normalize_description, UNKNOWN_DESCRIPTION};

/// Date tokens like 15/01/2024, 1.2.24 or 15-01-2024
fn date_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d{1,2}[./-]\d{1,2}[./-]\d{2,4})").expect("hardcoded pattern"))
}

/// Extract linearized text from a PDF statement.
///
/// Page order is preserved with page breaks as newlines. Undecodable
/// documents are rejected before the pipeline runs.
pub fn extract_statement_text(data: &[u8]) -> Result<String> {
    pdf_extract::extract_text_from_mem(data)
        .map_err(|e| Error::Document(format!("failed to extract statement text: {}", e)))
}

/// Scan statement text and build a map from normalized description
/// (lowercased) to the latest transaction date seen for it.
pub fn index_statement_dates(text: &str) -> HashMap<String, NaiveDate> {
    let mut latest: HashMap<String, NaiveDate> = HashMap::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Some(token) = date_token_re().find(line) else {
            continue;
        };
        let Some(date) = parse_statement_date(token.as_str()) else {
            continue;
        };

        let remainder = line.replacen(token.as_str(), "", 1);
        let description = normalize_description(remainder.trim());
        if description == UNKNOWN_DESCRIPTION {
            continue;
        }

        let key = description.to_lowercase();
        latest
            .entry(key)
            .and_modify(|seen| {
                if date > *seen {
                    *seen = date;
                }
            })
            .or_insert(date);
    }

    latest
}

/// Parse a statement date token as day/month/year.
///
/// Separators are normalized to `/` first; the year may be 2 or 4 digits.
fn parse_statement_date(token: &str) -> Option<NaiveDate> {
    let normalized = token.replace(['.', '-'], "/");
    let year_len = normalized.rsplit('/').next().map(str::len)?;
    let format = if year_len == 4 { "%d/%m/%Y" } else { "%d/%m/%y" };
    NaiveDate::parse_from_str(&normalized, format).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_statement_date_separators() {
        assert_eq!(parse_statement_date("15/01/2024"), Some(date(2024, 1, 15)));
        assert_eq!(parse_statement_date("15.01.2024"), Some(date(2024, 1, 15)));
        assert_eq!(parse_statement_date("15-01-2024"), Some(date(2024, 1, 15)));
    }

    #[test]
    fn test_parse_statement_date_two_digit_year() {
        assert_eq!(parse_statement_date("1/2/24"), Some(date(2024, 2, 1)));
    }

    #[test]
    fn test_parse_statement_date_rejects_invalid() {
        assert_eq!(parse_statement_date("32/01/2024"), None);
        assert_eq!(parse_statement_date("15/13/2024"), None);
    }

    #[test]
    fn test_index_keeps_latest_date_per_description() {
        let text = "\
15/01/2024 NETFLIX.COM
15/02/2024 NETFLIX.COM
01.02.2024 Spotify
Some line without a date
";
        let index = index_statement_dates(text);
        assert_eq!(index.len(), 2);
        assert_eq!(index.get("netflix"), Some(&date(2024, 2, 15)));
        assert_eq!(index.get("spotify"), Some(&date(2024, 2, 1)));
    }

    #[test]
    fn test_index_skips_dateless_and_empty_lines() {
        let text = "\n\nNo dates anywhere\n";
        assert!(index_statement_dates(text).is_empty());
    }

    #[test]
    fn test_index_skips_lines_that_are_only_a_date() {
        let text = "15/01/2024\n";
        assert!(index_statement_dates(text).is_empty());
    }
}
