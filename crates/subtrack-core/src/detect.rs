//! Subscription detection pipeline
//!
//! Detects recurring subscriptions in bank data:
//! - groups raw transactions by description and keeps only recurring groups
//! - summarizes each group and asks the external classifier to judge it
//! - filters the reply by confidence and joins it back to the source groups
//! - resolves renewal dates and assembles the final subscription records
//!
//! The classifier is a single synchronous call per invocation; there is no
//! retry policy and no shared state across invocations.

use std::collections::HashMap;

use chrono::{Duration, NaiveDate, Utc};
use tracing::{debug, info};

use crate::ai::{ClassificationResult, ClassifierBackend, ClassifierClient, GroupSummary};
use crate::error::Result;
use crate::models::{DetectedSubscription, Frequency, RawTransaction, SubscriptionSource};
use crate::normalize::{normalize_description, UNKNOWN_DESCRIPTION};
use crate::statement;

/// Minimum classifier confidence (inclusive) to accept a detection
pub const MIN_CONFIDENCE: f64 = 70.0;

/// Minimum occurrences of a description before a group is considered
/// recurring
pub const MIN_OCCURRENCES: usize = 2;

/// At most this many groups are presented to the classifier per request
pub const MAX_GROUPS: usize = 20;

/// Category assigned when the classifier supplies none
pub const DEFAULT_CATEGORY: &str = "uncategorized";

/// Currency assumed when the feed supplies none
const DEFAULT_CURRENCY: &str = "DKK";

/// A bucket of transactions sharing the same raw description
#[derive(Debug)]
pub struct TransactionGroup<'a> {
    /// Stable opaque identifier, assigned in encounter order
    pub id: String,
    /// Raw description, the legacy join key
    pub description: String,
    /// Members in encounter order
    pub transactions: Vec<&'a RawTransaction>,
}

/// Subscription detector around a classifier client
pub struct SubscriptionDetector<'a> {
    classifier: &'a ClassifierClient,
}

impl<'a> SubscriptionDetector<'a> {
    pub fn new(classifier: &'a ClassifierClient) -> Self {
        Self { classifier }
    }

    /// Detect subscriptions in a list of feed transactions.
    ///
    /// Classifier transport failure propagates as an error; an unparseable
    /// reply yields zero detections.
    pub async fn detect_from_feed(
        &self,
        transactions: &[RawTransaction],
    ) -> Result<Vec<DetectedSubscription>> {
        let groups = group_recurring(transactions);
        debug!(
            transactions = transactions.len(),
            recurring_groups = groups.len(),
            "Grouped feed transactions"
        );
        if groups.is_empty() {
            return Ok(Vec::new());
        }

        let summaries: Vec<GroupSummary> = groups
            .iter()
            .filter_map(summarize_group)
            .take(MAX_GROUPS)
            .collect();
        if summaries.is_empty() {
            return Ok(Vec::new());
        }

        let results = self.classifier.classify_groups(&summaries).await?;

        let by_id: HashMap<&str, &TransactionGroup> =
            groups.iter().map(|g| (g.id.as_str(), g)).collect();
        let by_description: HashMap<&str, &TransactionGroup> =
            groups.iter().map(|g| (g.description.as_str(), g)).collect();

        let mut subscriptions = Vec::new();
        for result in &results {
            if !is_accepted(result) {
                continue;
            }

            // Join on the echoed group id first; fall back to the exact raw
            // description for classifiers that drop the id.
            let group = result
                .group_id
                .as_deref()
                .and_then(|id| by_id.get(id))
                .or_else(|| {
                    result
                        .original_description
                        .as_deref()
                        .and_then(|desc| by_description.get(desc))
                });

            let Some(group) = group else {
                debug!(
                    group_id = ?result.group_id,
                    description = ?result.original_description,
                    "Dropping classification that matches no known group"
                );
                continue;
            };

            if let Some(subscription) = assemble_feed_subscription(result, group) {
                subscriptions.push(subscription);
            }
        }

        info!(
            detected = subscriptions.len(),
            judged = results.len(),
            "Feed subscription detection complete"
        );
        Ok(subscriptions)
    }

    /// Detect subscriptions in extracted statement text.
    ///
    /// Dates are recovered by scanning the statement lines; the classifier
    /// supplies names, amounts and frequencies.
    pub async fn detect_from_statement(&self, text: &str) -> Result<Vec<DetectedSubscription>> {
        let latest_dates = statement::index_statement_dates(text);
        debug!(
            indexed_descriptions = latest_dates.len(),
            "Indexed statement dates"
        );

        let results = self.classifier.classify_statement(text).await?;

        let subscriptions: Vec<DetectedSubscription> = results
            .iter()
            .filter(|result| is_accepted(result))
            .filter_map(|result| assemble_statement_subscription(result, &latest_dates))
            .collect();

        info!(
            detected = subscriptions.len(),
            judged = results.len(),
            "Statement subscription detection complete"
        );
        Ok(subscriptions)
    }
}

/// Group transactions by raw description, keeping only recurring groups.
///
/// Transactions with no resolvable description (or the sentinel) are
/// discarded entirely. Buckets preserve encounter order, and group ids are
/// assigned in encounter order after the size filter.
pub fn group_recurring(transactions: &[RawTransaction]) -> Vec<TransactionGroup<'_>> {
    let mut order: Vec<&str> = Vec::new();
    let mut buckets: HashMap<&str, Vec<&RawTransaction>> = HashMap::new();

    for tx in transactions {
        let Some(description) = tx.description() else {
            continue;
        };
        if description == UNKNOWN_DESCRIPTION {
            continue;
        }
        if !buckets.contains_key(description) {
            order.push(description);
        }
        buckets.entry(description).or_default().push(tx);
    }

    let mut groups = Vec::new();
    for description in order {
        let members = buckets.remove(description).expect("bucket exists for ordered key");
        if members.len() < MIN_OCCURRENCES {
            continue;
        }
        groups.push(TransactionGroup {
            id: format!("g{}", groups.len() + 1),
            description: description.to_string(),
            transactions: members,
        });
    }
    groups
}

/// Summarize a group for the classifier prompt.
///
/// Returns None when no amount in the group can be decoded; such groups are
/// excluded from classification entirely.
pub fn summarize_group(group: &TransactionGroup<'_>) -> Option<GroupSummary> {
    let amounts: Vec<f64> = group
        .transactions
        .iter()
        .filter_map(|tx| tx.decoded_amount())
        .collect();
    if amounts.is_empty() {
        return None;
    }

    let mut dates: Vec<String> = group
        .transactions
        .iter()
        .filter_map(|tx| tx.booked_date())
        .map(str::to_string)
        .collect();
    dates.sort();
    let recent_start = dates.len().saturating_sub(3);
    let recent_dates = dates[recent_start..].to_vec();

    let average_amount = amounts.iter().sum::<f64>() / amounts.len() as f64;
    let min_amount = amounts.iter().cloned().fold(f64::INFINITY, f64::min);
    let max_amount = amounts.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let currency = group
        .transactions
        .iter()
        .filter_map(|tx| tx.currency())
        .next()
        .unwrap_or(DEFAULT_CURRENCY)
        .to_string();

    Some(GroupSummary {
        group_id: group.id.clone(),
        description: group.description.clone(),
        occurrences: group.transactions.len(),
        average_amount,
        min_amount,
        max_amount,
        currency,
        recent_dates,
    })
}

/// Acceptance filter: subscription flag set and confidence at or above the
/// threshold. Everything else is silently dropped.
fn is_accepted(result: &ClassificationResult) -> bool {
    result.is_subscription && result.confidence >= MIN_CONFIDENCE
}

/// Parse a booking date string as an ISO date, tolerating a time component
/// and a trailing `Z` offset marker.
pub fn parse_iso_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim().trim_end_matches('Z');
    let date_part = value.split('T').next().unwrap_or(value);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

/// Most recent parseable booking date of a group
fn latest_transaction_date(group: &TransactionGroup<'_>) -> Option<NaiveDate> {
    group
        .transactions
        .iter()
        .filter_map(|tx| tx.booked_date())
        .filter_map(parse_iso_date)
        .max()
}

/// Resolve the next renewal date for an accepted classification.
///
/// The classifier's explicit date wins. Otherwise the frequency day-offset
/// is added to the last known transaction date, or to the current date as a
/// last resort. Calendar-day addition throughout.
fn resolve_renewal_date(result: &ClassificationResult, last_date: Option<NaiveDate>) -> String {
    if let Some(explicit) = result.next_renewal_date.as_deref() {
        let explicit = explicit.trim();
        if !explicit.is_empty() {
            return explicit.to_string();
        }
    }

    let frequency = resolve_frequency(result);
    let base = last_date.unwrap_or_else(|| Utc::now().date_naive());
    (base + Duration::days(frequency.renewal_days()))
        .format("%Y-%m-%d")
        .to_string()
}

/// Frequency from the classifier label, defaulting to monthly
fn resolve_frequency(result: &ClassificationResult) -> Frequency {
    result
        .frequency
        .as_deref()
        .and_then(Frequency::from_label)
        .unwrap_or_default()
}

/// Round a currency amount to 2 decimal places
fn round_currency(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// Assemble the final subscription record for a feed group.
///
/// Returns None when the group has no decodable amounts.
fn assemble_feed_subscription(
    result: &ClassificationResult,
    group: &TransactionGroup<'_>,
) -> Option<DetectedSubscription> {
    let amounts: Vec<f64> = group
        .transactions
        .iter()
        .filter_map(|tx| tx.decoded_amount())
        .collect();
    if amounts.is_empty() {
        return None;
    }
    let average = amounts.iter().sum::<f64>() / amounts.len() as f64;
    let last_date = latest_transaction_date(group);

    let name = result
        .clean_name
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| normalize_description(&group.description));

    Some(DetectedSubscription {
        name,
        amount: round_currency(average),
        category: result
            .category
            .clone()
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
        frequency: resolve_frequency(result),
        confidence: result.confidence,
        renewal_date: resolve_renewal_date(result, last_date),
        transaction_date: last_date.map(|d| d.format("%Y-%m-%d").to_string()),
        reasoning: result
            .reasoning
            .clone()
            .unwrap_or_else(|| "AI detected subscription".to_string()),
        source: SubscriptionSource::ApiFeed,
    })
}

/// Assemble the final subscription record for a statement detection.
///
/// The date index substitutes for the group's most recent transaction date.
fn assemble_statement_subscription(
    result: &ClassificationResult,
    latest_dates: &HashMap<String, NaiveDate>,
) -> Option<DetectedSubscription> {
    let name = result
        .clean_name
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| {
            normalize_description(result.original_description.as_deref().unwrap_or(""))
        });
    if name == UNKNOWN_DESCRIPTION {
        return None;
    }

    let last_date = latest_dates.get(&name.to_lowercase()).copied();

    Some(DetectedSubscription {
        amount: round_currency(result.amount.unwrap_or(0.0)),
        category: result
            .category
            .clone()
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
        frequency: resolve_frequency(result),
        confidence: result.confidence,
        renewal_date: resolve_renewal_date(result, last_date),
        transaction_date: last_date.map(|d| d.format("%Y-%m-%d").to_string()),
        reasoning: result
            .reasoning
            .clone()
            .unwrap_or_else(|| "AI detected subscription".to_string()),
        source: SubscriptionSource::Document,
        name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        ScaledValue, TransactionAmount, TransactionDates, TransactionDescriptions,
    };

    fn tx(description: &str, unscaled: i64, scale: i64, booked: &str) -> RawTransaction {
        RawTransaction {
            descriptions: Some(TransactionDescriptions {
                display: Some(description.to_string()),
                original: None,
            }),
            amount: Some(TransactionAmount {
                value: Some(ScaledValue {
                    unscaled_value: Some(serde_json::json!(unscaled)),
                    scale: Some(serde_json::json!(scale)),
                }),
                currency_code: Some("DKK".to_string()),
            }),
            dates: Some(TransactionDates {
                booked: Some(booked.to_string()),
            }),
        }
    }

    #[test]
    fn test_group_recurring_drops_singletons() {
        let transactions = vec![
            tx("NETFLIX.COM", 9900, 2, "2024-01-15"),
            tx("ONE OFF STORE", 45000, 2, "2024-01-16"),
            tx("NETFLIX.COM", 9900, 2, "2024-02-15"),
        ];
        let groups = group_recurring(&transactions);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].description, "NETFLIX.COM");
        assert_eq!(groups[0].transactions.len(), 2);
        assert_eq!(groups[0].id, "g1");
    }

    #[test]
    fn test_group_recurring_discards_unusable_descriptions() {
        let blank = RawTransaction {
            descriptions: Some(TransactionDescriptions {
                display: Some("  ".to_string()),
                original: None,
            }),
            ..Default::default()
        };
        let unknown = RawTransaction {
            descriptions: Some(TransactionDescriptions {
                display: Some(UNKNOWN_DESCRIPTION.to_string()),
                original: None,
            }),
            ..Default::default()
        };
        let transactions = vec![
            blank.clone(),
            blank,
            unknown.clone(),
            unknown,
            tx("SPOTIFY", 9900, 2, "2024-01-01"),
            tx("SPOTIFY", 9900, 2, "2024-02-01"),
        ];
        let groups = group_recurring(&transactions);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].description, "SPOTIFY");
    }

    #[test]
    fn test_group_ids_follow_encounter_order() {
        let transactions = vec![
            tx("SPOTIFY", 9900, 2, "2024-01-01"),
            tx("NETFLIX.COM", 9900, 2, "2024-01-02"),
            tx("SPOTIFY", 9900, 2, "2024-02-01"),
            tx("NETFLIX.COM", 9900, 2, "2024-02-02"),
        ];
        let groups = group_recurring(&transactions);
        assert_eq!(groups.len(), 2);
        assert_eq!((groups[0].id.as_str(), groups[0].description.as_str()), ("g1", "SPOTIFY"));
        assert_eq!((groups[1].id.as_str(), groups[1].description.as_str()), ("g2", "NETFLIX.COM"));
    }

    #[test]
    fn test_summarize_group_statistics() {
        let transactions = vec![
            tx("SPLICE.COM* CREATOR", 19900, 2, "2024-01-15"),
            tx("SPLICE.COM* CREATOR", 19900, 2, "2024-03-15"),
            tx("SPLICE.COM* CREATOR", 20900, 2, "2024-02-15"),
        ];
        let groups = group_recurring(&transactions);
        let summary = summarize_group(&groups[0]).unwrap();
        assert_eq!(summary.occurrences, 3);
        assert!((summary.average_amount - 202.333333).abs() < 0.001);
        assert_eq!(summary.min_amount, 199.0);
        assert_eq!(summary.max_amount, 209.0);
        assert_eq!(summary.currency, "DKK");
        // Most recent three dates, ascending
        assert_eq!(
            summary.recent_dates,
            vec!["2024-01-15", "2024-02-15", "2024-03-15"]
        );
    }

    #[test]
    fn test_summarize_group_skips_undecodable_members() {
        let mut broken = tx("NETFLIX.COM", 9900, 2, "2024-01-15");
        broken.amount = Some(TransactionAmount {
            value: Some(ScaledValue {
                unscaled_value: Some(serde_json::json!("n/a")),
                scale: Some(serde_json::json!(2)),
            }),
            currency_code: Some("DKK".to_string()),
        });
        let transactions = vec![broken, tx("NETFLIX.COM", 9900, 2, "2024-02-15")];
        let groups = group_recurring(&transactions);
        let summary = summarize_group(&groups[0]).unwrap();
        // The malformed member is excluded from statistics, not fatal
        assert_eq!(summary.occurrences, 2);
        assert_eq!(summary.average_amount, 99.0);
    }

    #[test]
    fn test_summarize_group_without_amounts_is_excluded() {
        let mut a = tx("NETFLIX.COM", 0, 0, "2024-01-15");
        a.amount = None;
        let mut b = tx("NETFLIX.COM", 0, 0, "2024-02-15");
        b.amount = None;
        let transactions = vec![a, b];
        let groups = group_recurring(&transactions);
        assert!(summarize_group(&groups[0]).is_none());
    }

    #[test]
    fn test_confidence_threshold_is_inclusive() {
        let at_threshold = ClassificationResult {
            is_subscription: true,
            confidence: 70.0,
            ..Default::default()
        };
        let below = ClassificationResult {
            is_subscription: true,
            confidence: 69.0,
            ..Default::default()
        };
        let not_subscription = ClassificationResult {
            is_subscription: false,
            confidence: 99.0,
            ..Default::default()
        };
        assert!(is_accepted(&at_threshold));
        assert!(!is_accepted(&below));
        assert!(!is_accepted(&not_subscription));
    }

    #[test]
    fn test_renewal_date_calendar_day_addition() {
        let result = ClassificationResult {
            frequency: Some("monthly".to_string()),
            ..Default::default()
        };
        let last = NaiveDate::from_ymd_opt(2024, 2, 15).unwrap();
        // 30 calendar days, not "same day next month"
        assert_eq!(resolve_renewal_date(&result, Some(last)), "2024-03-16");
    }

    #[test]
    fn test_renewal_date_explicit_wins() {
        let result = ClassificationResult {
            frequency: Some("monthly".to_string()),
            next_renewal_date: Some("2024-04-01".to_string()),
            ..Default::default()
        };
        let last = NaiveDate::from_ymd_opt(2024, 2, 15).unwrap();
        assert_eq!(resolve_renewal_date(&result, Some(last)), "2024-04-01");
    }

    #[test]
    fn test_renewal_date_unknown_frequency_defaults_to_monthly() {
        let result = ClassificationResult {
            frequency: Some("fortnightly".to_string()),
            ..Default::default()
        };
        let last = NaiveDate::from_ymd_opt(2024, 2, 15).unwrap();
        assert_eq!(resolve_renewal_date(&result, Some(last)), "2024-03-16");
    }

    #[test]
    fn test_renewal_date_falls_back_to_now() {
        let result = ClassificationResult {
            frequency: Some("annual".to_string()),
            ..Default::default()
        };
        let expected = (Utc::now().date_naive() + Duration::days(365))
            .format("%Y-%m-%d")
            .to_string();
        assert_eq!(resolve_renewal_date(&result, None), expected);
    }

    #[test]
    fn test_parse_iso_date_variants() {
        let expected = NaiveDate::from_ymd_opt(2024, 2, 15).unwrap();
        assert_eq!(parse_iso_date("2024-02-15"), Some(expected));
        assert_eq!(parse_iso_date("2024-02-15T10:30:00Z"), Some(expected));
        assert_eq!(parse_iso_date("2024-02-15Z"), Some(expected));
        assert_eq!(parse_iso_date("15/02/2024"), None);
        assert_eq!(parse_iso_date(""), None);
    }

    #[tokio::test]
    async fn test_detect_from_feed_end_to_end() {
        let transactions = vec![
            tx("OPENAI *CHATGPT", 9900, 2, "2024-01-15"),
            tx("OPENAI *CHATGPT", 9900, 2, "2024-02-15"),
        ];
        let classifier = ClassifierClient::mock();
        let detector = SubscriptionDetector::new(&classifier);

        let subscriptions = detector.detect_from_feed(&transactions).await.unwrap();
        assert_eq!(subscriptions.len(), 1);

        let sub = &subscriptions[0];
        assert_eq!(sub.name, "OpenAI");
        assert_eq!(sub.amount, 99.00);
        assert_eq!(sub.confidence, 95.0);
        assert_eq!(sub.frequency, Frequency::Monthly);
        assert_eq!(sub.source, SubscriptionSource::ApiFeed);
        assert_eq!(sub.transaction_date.as_deref(), Some("2024-02-15"));
        // No explicit renewal date from the classifier: later date + 30 days
        assert_eq!(sub.renewal_date, "2024-03-16");
    }

    #[tokio::test]
    async fn test_detect_from_feed_drops_unknown_join() {
        // Classifier echoes neither a known group id nor a known description
        let transactions = vec![
            tx("OPENAI *CHATGPT", 9900, 2, "2024-01-15"),
            tx("OPENAI *CHATGPT", 9900, 2, "2024-02-15"),
        ];
        let groups = group_recurring(&transactions);
        let orphan = ClassificationResult {
            group_id: Some("g99".to_string()),
            original_description: Some("OpenAI ChatGPT subscription".to_string()),
            is_subscription: true,
            confidence: 95.0,
            ..Default::default()
        };
        let by_id: HashMap<&str, &TransactionGroup> =
            groups.iter().map(|g| (g.id.as_str(), g)).collect();
        let by_description: HashMap<&str, &TransactionGroup> =
            groups.iter().map(|g| (g.description.as_str(), g)).collect();
        let joined = orphan
            .group_id
            .as_deref()
            .and_then(|id| by_id.get(id))
            .or_else(|| {
                orphan
                    .original_description
                    .as_deref()
                    .and_then(|d| by_description.get(d))
            });
        assert!(joined.is_none());
    }

    #[tokio::test]
    async fn test_detect_from_feed_unknown_merchant_rejected() {
        let transactions = vec![
            tx("CORNER BAKERY", 4500, 2, "2024-01-15"),
            tx("CORNER BAKERY", 5200, 2, "2024-02-15"),
        ];
        let classifier = ClassifierClient::mock();
        let detector = SubscriptionDetector::new(&classifier);

        let subscriptions = detector.detect_from_feed(&transactions).await.unwrap();
        assert!(subscriptions.is_empty());
    }

    #[tokio::test]
    async fn test_detect_from_statement_uses_date_index() {
        let text = "01/01/2024 Netflix\n15/02/2024 Netflix\n";
        let classifier = ClassifierClient::mock();
        let detector = SubscriptionDetector::new(&classifier);

        let subscriptions = detector.detect_from_statement(text).await.unwrap();
        assert_eq!(subscriptions.len(), 1);

        let sub = &subscriptions[0];
        assert_eq!(sub.name, "Netflix");
        assert_eq!(sub.source, SubscriptionSource::Document);
        assert_eq!(sub.transaction_date.as_deref(), Some("2024-02-15"));
        assert_eq!(sub.renewal_date, "2024-03-16");
    }
}
