//! Mock classifier backend for testing
//!
//! Returns deterministic classifications for well-known merchants so the
//! detection pipeline can be exercised without a model server.

use async_trait::async_trait;

use crate::error::Result;

use super::types::{ClassificationResult, GroupSummary};
use super::ClassifierBackend;

/// Well-known subscription merchants and their cleaned names/categories
const KNOWN_SUBSCRIPTIONS: &[(&str, &str, &str)] = &[
    ("NETFLIX", "Netflix", "Streaming & Entertainment"),
    ("DISNEY", "Disney+", "Streaming & Entertainment"),
    ("HBO", "HBO Max", "Streaming & Entertainment"),
    ("SPOTIFY", "Spotify", "Streaming & Entertainment"),
    ("SPLICE", "Splice", "Software & Tools"),
    ("OPENAI", "OpenAI", "Software & Tools"),
    ("ADOBE", "Adobe", "Software & Tools"),
    ("TRYG", "Tryg", "Insurance & Pension"),
];

/// Mock classifier backend
///
/// Merchants from the known list are classified as subscriptions with high
/// confidence; everything else is rejected with low confidence, which keeps
/// the acceptance filter observable in tests.
#[derive(Clone, Default)]
pub struct MockBackend {
    /// Whether health_check should return true
    pub healthy: bool,
}

impl MockBackend {
    /// Create a new mock backend (healthy by default)
    pub fn new() -> Self {
        Self { healthy: true }
    }

    /// Create an unhealthy mock backend
    pub fn unhealthy() -> Self {
        Self { healthy: false }
    }

    fn known_subscription(description: &str) -> Option<(&'static str, &'static str)> {
        let upper = description.to_uppercase();
        KNOWN_SUBSCRIPTIONS
            .iter()
            .find(|(keyword, _, _)| upper.contains(keyword))
            .map(|(_, name, category)| (*name, *category))
    }
}

#[async_trait]
impl ClassifierBackend for MockBackend {
    async fn classify_groups(
        &self,
        summaries: &[GroupSummary],
    ) -> Result<Vec<ClassificationResult>> {
        let results = summaries
            .iter()
            .map(|summary| match Self::known_subscription(&summary.description) {
                Some((name, category)) => ClassificationResult {
                    group_id: Some(summary.group_id.clone()),
                    original_description: Some(summary.description.clone()),
                    clean_name: Some(name.to_string()),
                    is_subscription: true,
                    confidence: 95.0,
                    category: Some(category.to_string()),
                    frequency: Some("monthly".to_string()),
                    reasoning: Some("Known subscription service".to_string()),
                    ..Default::default()
                },
                None => ClassificationResult {
                    group_id: Some(summary.group_id.clone()),
                    original_description: Some(summary.description.clone()),
                    is_subscription: false,
                    confidence: 40.0,
                    reasoning: Some("Not a known subscription service".to_string()),
                    ..Default::default()
                },
            })
            .collect();
        Ok(results)
    }

    async fn classify_statement(&self, text: &str) -> Result<Vec<ClassificationResult>> {
        let upper = text.to_uppercase();
        let results = KNOWN_SUBSCRIPTIONS
            .iter()
            .filter(|(keyword, _, _)| upper.contains(keyword))
            .map(|(keyword, name, category)| ClassificationResult {
                original_description: Some((*keyword).to_string()),
                clean_name: Some((*name).to_string()),
                is_subscription: true,
                confidence: 95.0,
                category: Some((*category).to_string()),
                frequency: Some("monthly".to_string()),
                amount: Some(99.0),
                reasoning: Some("Known subscription service".to_string()),
                ..Default::default()
            })
            .collect();
        Ok(results)
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }

    fn model(&self) -> &str {
        "mock"
    }

    fn host(&self) -> &str {
        "mock://localhost"
    }
}
