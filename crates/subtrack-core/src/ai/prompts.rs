//! Prompt construction for the subscription classifier
//!
//! Builders are stateless and never mutate their inputs: the same summaries
//! always render the same prompt.

use std::fmt::Write;

use super::types::GroupSummary;

/// System message for both classification variants
pub const SYSTEM_PROMPT: &str = "You are an expert on Danish bank transactions and \
subscription services. Analyze transactions and identify subscriptions precisely.";

/// Statement text beyond this many characters is truncated to bound the
/// request size.
pub const STATEMENT_TEXT_LIMIT: usize = 8000;

/// Render the prompt for classifying recurring transaction groups.
///
/// One line per group: identifier, raw description, occurrence count,
/// average amount, and the most recent booking dates.
pub fn transaction_groups_prompt(summaries: &[GroupSummary]) -> String {
    let mut lines = String::new();
    for summary in summaries {
        let _ = writeln!(
            lines,
            "- [{}] {}: {} occurrences, average {:.2} {}, range {:.2}-{:.2}, recent dates: {}",
            summary.group_id,
            summary.description,
            summary.occurrences,
            summary.average_amount,
            summary.currency,
            summary.min_amount,
            summary.max_amount,
            summary.recent_dates.join(", "),
        );
    }

    format!(
        r#"Analyze the following Danish bank transaction groups and identify which of them are subscriptions.

For each group, determine:
1. Is it a subscription? (yes/no)
2. Confidence score (0-100)
3. A clean company name (shorten and clean - e.g. "SPLICE.COM* CREATOR" -> "Splice", "DISNEYPLUS.COM DK" -> "Disney+")
4. Category (Streaming & Entertainment, Insurance & Pension, Telecom & Internet, Software & Tools, etc.)
5. Billing frequency (monthly/quarterly/semiannual/annual)
6. Next renewal date (based on the frequency and the most recent payment)

Transaction groups:
{lines}
Return a JSON array in exactly this format:
[
  {{
    "group_id": "g1",
    "original_description": "SPLICE.COM* CREATOR",
    "clean_name": "Splice",
    "is_subscription": true,
    "confidence": 95,
    "category": "Software & Tools",
    "frequency": "monthly",
    "next_renewal_date": "2024-02-15",
    "reasoning": "Known music software subscription with regular monthly payments"
  }}
]

Important rules:
- Echo the group_id and original_description of the group each entry refers to, unchanged
- Clean company names: remove .COM, *, CREATOR etc. and make them readable
- Compute the next renewal date from the frequency and the most recent payment
- Focus on Danish services and be conservative
- Only classify as a subscription when you are certain"#
    )
}

/// Render the prompt for classifying an extracted bank statement.
///
/// The statement text is embedded directly; the classifier has to find the
/// recurring charges itself, including their amounts.
pub fn statement_prompt(text: &str) -> String {
    let excerpt: String = text.chars().take(STATEMENT_TEXT_LIMIT).collect();

    format!(
        r#"Analyze the following Danish bank statement and identify all subscriptions.

Statement content:
{excerpt}

For each potential subscription, determine:
1. Is it a subscription? (yes/no)
2. Confidence score (0-100)
3. A clean company name (shorten and clean - e.g. "SPLICE.COM* CREATOR" -> "Splice", "DISNEYPLUS.COM DK" -> "Disney+")
4. Amount (DKK)
5. Category (Streaming & Entertainment, Insurance & Pension, Telecom & Internet, Software & Tools, etc.)
6. Billing frequency (monthly/quarterly/semiannual/annual)
7. Next renewal date (based on the frequency and the most recent payment on the statement)

Return a JSON array in exactly this format:
[
  {{
    "original_description": "SPLICE.COM* CREATOR",
    "clean_name": "Splice",
    "amount": 199.0,
    "is_subscription": true,
    "confidence": 95,
    "category": "Software & Tools",
    "frequency": "monthly",
    "next_renewal_date": "2024-02-15",
    "reasoning": "Known music software subscription with regular monthly payments"
  }}
]

Important rules:
- Clean company names: remove .COM, *, CREATOR etc. and make them readable
- Compute the next renewal date from the frequency and the most recent payment, so if the last payment was 2024-02-15 and the frequency is monthly, the next renewal date is 2024-03-15
- Focus on regular payments (same amount, same payee)
- Known subscription services (Netflix, Spotify, insurance etc.)
- Amounts between 20-1000 DKK
- Avoid one-off purchases, fuel, restaurants
- Be conservative - only classify as a subscription when you are certain"#
    )
}
