//! Classifier request/response types
//!
//! These types are backend-agnostic and used across all classifier
//! implementations.

use serde::{Deserialize, Serialize};

/// Aggregate statistics for one recurring transaction group, as presented
/// to the classifier
#[derive(Debug, Clone, Serialize)]
pub struct GroupSummary {
    /// Stable opaque identifier assigned before prompt construction.
    /// The classifier is instructed to echo it back.
    pub group_id: String,
    /// Raw (un-normalized) description, the legacy join key
    pub description: String,
    /// Number of transactions in the group
    pub occurrences: usize,
    /// Mean of the decoded amounts, unrounded
    pub average_amount: f64,
    pub min_amount: f64,
    pub max_amount: f64,
    pub currency: String,
    /// Up to three most recent booking dates, ascending
    pub recent_dates: Vec<String>,
}

/// One entry of the classifier's reply
///
/// The classifier is not schema-constrained, so every field defaults:
/// a missing `is_subscription` or `confidence` simply fails the acceptance
/// filter instead of failing the parse.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// Echo of the group identifier from the prompt
    #[serde(default)]
    pub group_id: Option<String>,
    /// The raw description the entry refers to
    #[serde(default)]
    pub original_description: Option<String>,
    /// Cleaned display name suggested by the classifier
    #[serde(default)]
    pub clean_name: Option<String>,
    #[serde(default)]
    pub is_subscription: bool,
    /// Certainty in [0, 100]
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub category: Option<String>,
    /// Frequency label; resolved against the closed vocabulary downstream
    #[serde(default)]
    pub frequency: Option<String>,
    /// Explicit next renewal date, trusted verbatim when present
    #[serde(default)]
    pub next_renewal_date: Option<String>,
    /// Charge amount; only populated by the statement variant, where no
    /// structured amounts exist
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub reasoning: Option<String>,
}
