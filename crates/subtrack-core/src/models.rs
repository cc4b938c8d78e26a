//! Domain models for SubTrack

use serde::{Deserialize, Serialize};

/// Billing frequency of a subscription
///
/// Closed vocabulary; unrecognized labels from the classifier fall back to
/// `Monthly` at the call sites that resolve renewal dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    #[default]
    Monthly,
    Quarterly,
    Semiannual,
    Annual,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
            Self::Quarterly => "quarterly",
            Self::Semiannual => "semiannual",
            Self::Annual => "annual",
        }
    }

    /// Day offset used to project the next renewal from the last payment.
    ///
    /// Plain calendar-day addition, not a month increment: monthly renewals
    /// land 30 days after the last charge.
    pub fn renewal_days(&self) -> i64 {
        match self {
            Self::Monthly => 30,
            Self::Quarterly => 90,
            Self::Semiannual => 180,
            Self::Annual => 365,
        }
    }

    /// Parse a frequency label from classifier output (case-insensitive)
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "monthly" => Some(Self::Monthly),
            "quarterly" => Some(Self::Quarterly),
            "semiannual" => Some(Self::Semiannual),
            "annual" => Some(Self::Annual),
            _ => None,
        }
    }
}

impl std::str::FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::from_label(s).ok_or_else(|| format!("Unknown frequency: {}", s))
    }
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Provenance of a subscription record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SubscriptionSource {
    /// Manually entered by the user
    #[default]
    Manual,
    /// Detected from the open-banking transaction feed
    ApiFeed,
    /// Detected from an uploaded statement document
    Document,
}

impl SubscriptionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::ApiFeed => "api-feed",
            Self::Document => "document",
        }
    }
}

impl std::str::FromStr for SubscriptionSource {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "manual" => Ok(Self::Manual),
            "api-feed" => Ok(Self::ApiFeed),
            "document" => Ok(Self::Document),
            _ => Err(format!("Unknown subscription source: {}", s)),
        }
    }
}

impl std::fmt::Display for SubscriptionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A raw transaction as delivered by the open-banking feed
///
/// The feed is lenient about shape, so every field is optional and the
/// monetary value tolerates numbers encoded as JSON numbers or strings.
/// Unusable transactions are skipped by the pipeline, never fatal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawTransaction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub descriptions: Option<TransactionDescriptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<TransactionAmount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dates: Option<TransactionDates>,
}

/// Display and original description variants of a transaction
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionDescriptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original: Option<String>,
}

/// Monetary amount with currency
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionAmount {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<ScaledValue>,
    #[serde(
        default,
        rename = "currencyCode",
        skip_serializing_if = "Option::is_none"
    )]
    pub currency_code: Option<String>,
}

/// Scaled-integer monetary value: amount = unscaled_value / 10^scale
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScaledValue {
    #[serde(
        default,
        rename = "unscaledValue",
        skip_serializing_if = "Option::is_none"
    )]
    pub unscaled_value: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<serde_json::Value>,
}

/// Transaction date fields
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionDates {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booked: Option<String>,
}

impl RawTransaction {
    /// Resolve the transaction description: display first, then original.
    ///
    /// Returns None when neither variant carries a non-empty value.
    pub fn description(&self) -> Option<&str> {
        let descriptions = self.descriptions.as_ref()?;
        descriptions
            .display
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .or_else(|| {
                descriptions
                    .original
                    .as_deref()
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
            })
    }

    /// Decode the scaled-integer amount as abs(unscaled / 10^scale).
    ///
    /// Returns None when either component is missing or non-numeric; callers
    /// skip such transactions rather than failing the group.
    pub fn decoded_amount(&self) -> Option<f64> {
        let value = self.amount.as_ref()?.value.as_ref()?;
        let unscaled = numeric_value(value.unscaled_value.as_ref()?)?;
        let scale = numeric_value(value.scale.as_ref()?)?;
        Some((unscaled / 10f64.powf(scale)).abs())
    }

    /// Booking date string, if present and non-empty
    pub fn booked_date(&self) -> Option<&str> {
        self.dates
            .as_ref()?
            .booked
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Currency code, if the feed supplied one
    pub fn currency(&self) -> Option<&str> {
        self.amount
            .as_ref()?
            .currency_code
            .as_deref()
            .filter(|s| !s.is_empty())
    }
}

/// Interpret a JSON value as a number, accepting numeric strings.
///
/// The feed serializes unscaledValue/scale as strings in some API versions.
fn numeric_value(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// A subscription detected by the classification pipeline
///
/// Transient output record handed to the persistence layer or returned to
/// the caller; never mutated after assembly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectedSubscription {
    pub name: String,
    /// Mean of the contributing amounts, rounded to 2 decimals
    pub amount: f64,
    pub category: String,
    pub frequency: Frequency,
    /// Classifier-reported certainty in [0, 100]
    pub confidence: f64,
    /// Next renewal date as YYYY-MM-DD
    pub renewal_date: String,
    /// Most recent contributing transaction date as YYYY-MM-DD
    pub transaction_date: Option<String>,
    pub reasoning: String,
    pub source: SubscriptionSource,
}

/// A registered user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub hashed_password: String,
    #[serde(default)]
    pub last_login: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// A stored subscription row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    pub id: i64,
    pub title: String,
    pub amount: f64,
    pub renewal_date: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub frequency: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub transaction_date: Option<String>,
    #[serde(default)]
    pub confidence_score: Option<f64>,
    #[serde(default)]
    pub notes: Option<String>,
    pub owner_id: i64,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub created_at: Option<String>,
}

fn default_true() -> bool {
    true
}

/// A subscription to be inserted (before the store assigns an id)
#[derive(Debug, Clone, Serialize)]
pub struct NewSubscription {
    pub title: String,
    pub amount: f64,
    pub renewal_date: String,
    pub category: String,
    pub currency: String,
    pub frequency: Frequency,
    pub source: SubscriptionSource,
    pub owner_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// A usage analytics event, logged best-effort alongside mutations
#[derive(Debug, Clone, Serialize)]
pub struct NewAnalyticsEvent {
    pub user_id: i64,
    pub event_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merchant_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_data: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_transaction(unscaled: serde_json::Value, scale: serde_json::Value) -> RawTransaction {
        RawTransaction {
            amount: Some(TransactionAmount {
                value: Some(ScaledValue {
                    unscaled_value: Some(unscaled),
                    scale: Some(scale),
                }),
                currency_code: Some("DKK".to_string()),
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_decode_scaled_amount() {
        let tx = feed_transaction(serde_json::json!(19900), serde_json::json!(2));
        assert_eq!(tx.decoded_amount(), Some(199.00));
    }

    #[test]
    fn test_decode_scaled_amount_from_strings() {
        // Some feed API versions serialize the numeric fields as strings
        let tx = feed_transaction(serde_json::json!("-9900"), serde_json::json!("2"));
        assert_eq!(tx.decoded_amount(), Some(99.00));
    }

    #[test]
    fn test_decode_rejects_non_numeric() {
        let tx = feed_transaction(serde_json::json!("n/a"), serde_json::json!(2));
        assert_eq!(tx.decoded_amount(), None);
        assert_eq!(RawTransaction::default().decoded_amount(), None);
    }

    #[test]
    fn test_description_prefers_display() {
        let tx = RawTransaction {
            descriptions: Some(TransactionDescriptions {
                display: Some("Netflix".to_string()),
                original: Some("NETFLIX.COM".to_string()),
            }),
            ..Default::default()
        };
        assert_eq!(tx.description(), Some("Netflix"));
    }

    #[test]
    fn test_description_falls_back_to_original() {
        let tx = RawTransaction {
            descriptions: Some(TransactionDescriptions {
                display: Some("  ".to_string()),
                original: Some("NETFLIX.COM".to_string()),
            }),
            ..Default::default()
        };
        assert_eq!(tx.description(), Some("NETFLIX.COM"));
    }

    #[test]
    fn test_frequency_labels() {
        assert_eq!(Frequency::from_label("Quarterly"), Some(Frequency::Quarterly));
        assert_eq!(Frequency::from_label("weekly"), None);
        assert_eq!(Frequency::Annual.renewal_days(), 365);
        assert_eq!(Frequency::default().renewal_days(), 30);
    }

    #[test]
    fn test_source_serialization() {
        assert_eq!(
            serde_json::to_string(&SubscriptionSource::ApiFeed).unwrap(),
            "\"api-feed\""
        );
        assert_eq!(SubscriptionSource::Document.as_str(), "document");
    }
}
