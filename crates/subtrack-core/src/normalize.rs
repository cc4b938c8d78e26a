//! Merchant description normalization
//!
//! Turns raw bank descriptions into readable subscription titles. The
//! function is pure and deterministic because its output doubles as a
//! grouping key for the statement pipeline.

use std::sync::OnceLock;

use regex::Regex;

/// Sentinel for descriptions that cannot be normalized.
///
/// Title-cased so the sentinel is a fixed point of `normalize_description`,
/// which keeps the function idempotent.
pub const UNKNOWN_DESCRIPTION: &str = "Unknown";

fn delimiter_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[*/_-]").expect("hardcoded pattern"))
}

fn protocol_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"https?://").expect("hardcoded pattern"))
}

fn domain_suffix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b([a-z0-9]+)\.(?:com|dk|io|net|org|se|co)\b").expect("hardcoded pattern")
    })
}

fn non_alphanumeric_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Danish letters are kept so local merchant names stay readable
    RE.get_or_init(|| Regex::new(r"[^a-z0-9æøå\s]").expect("hardcoded pattern"))
}

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("hardcoded pattern"))
}

/// Normalize a merchant/transaction description into a display title.
///
/// Examples:
/// - `"SPLICE.COM* CREATOR"` -> `"Splice Creator"`
/// - `"www.netflix.com"` -> `"Netflix"`
/// - `"DISNEYPLUS.COM  DK"` -> `"Disneyplus Dk"`
/// - `"TRYG FORSIKRING A/S"` -> `"Tryg Forsikring A S"`
pub fn normalize_description(raw: &str) -> String {
    if raw.trim().is_empty() {
        return UNKNOWN_DESCRIPTION.to_string();
    }

    let text = raw.to_lowercase();
    let text = protocol_re().replace_all(&text, "");
    let text = text.strip_prefix("www.").unwrap_or(&text).to_string();
    let text = delimiter_re().replace_all(&text, " ");
    let text = domain_suffix_re().replace_all(&text, "$1");
    let text = non_alphanumeric_re().replace_all(&text, "");
    let text = whitespace_re().replace_all(&text, " ");
    let text = text.trim();

    if text.is_empty() {
        return UNKNOWN_DESCRIPTION.to_string();
    }

    title_case(text)
}

/// Uppercase the first character of each whitespace-separated word.
///
/// Input is already lowercased, so only the leading character changes.
fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
