//! Pluggable subscription-classifier abstraction
//!
//! The classifier is an opaque external model: it receives a prompt and
//! returns free-form text expected to contain a JSON array. This module
//! provides a backend-agnostic interface around that contract.
//!
//! # Architecture
//!
//! - `ClassifierBackend` trait: defines the classification operations
//! - `ClassifierClient` enum: concrete wrapper providing Clone +
//!   compile-time dispatch
//! - Backend implementations: `OpenAiBackend`, `MockBackend`
//!
//! # Error semantics
//!
//! Transport or API failures are returned as errors and are fatal for the
//! invocation. An unparseable reply is NOT an error: it yields an empty
//! result list (see `parsing`).

mod mock;
mod openai;
pub mod parsing;
pub mod prompts;
pub mod types;

pub use mock::MockBackend;
pub use openai::OpenAiBackend;
pub use types::{ClassificationResult, GroupSummary};

use async_trait::async_trait;

use crate::config::ClassifierConfig;
use crate::error::Result;

/// Trait defining the interface for subscription classifiers
#[async_trait]
pub trait ClassifierBackend: Send + Sync {
    /// Classify recurring transaction groups
    async fn classify_groups(
        &self,
        summaries: &[GroupSummary],
    ) -> Result<Vec<ClassificationResult>>;

    /// Classify subscriptions found in extracted statement text
    async fn classify_statement(&self, text: &str) -> Result<Vec<ClassificationResult>>;

    /// Check if the backend is available
    async fn health_check(&self) -> bool;

    /// Get the model name (for logging)
    fn model(&self) -> &str;

    /// Get the host URL (for logging)
    fn host(&self) -> &str;
}

/// Concrete classifier client enum
///
/// Provides Clone and compile-time dispatch without Box<dyn> overhead.
#[derive(Clone)]
pub enum ClassifierClient {
    /// OpenAI-compatible chat completions backend
    OpenAi(OpenAiBackend),
    /// Mock backend for testing
    Mock(MockBackend),
}

impl ClassifierClient {
    /// Create a classifier client from configuration
    ///
    /// Returns None when neither a mock backend is requested nor an API key
    /// is configured; callers treat a missing classifier as "detection
    /// unavailable" rather than an error.
    pub fn from_config(config: &ClassifierConfig) -> Option<Self> {
        match config.backend.as_str() {
            "mock" => Some(ClassifierClient::Mock(MockBackend::new())),
            _ => OpenAiBackend::from_config(config).map(ClassifierClient::OpenAi),
        }
    }

    /// Create a mock backend for testing
    pub fn mock() -> Self {
        ClassifierClient::Mock(MockBackend::new())
    }
}

#[async_trait]
impl ClassifierBackend for ClassifierClient {
    async fn classify_groups(
        &self,
        summaries: &[GroupSummary],
    ) -> Result<Vec<ClassificationResult>> {
        match self {
            ClassifierClient::OpenAi(b) => b.classify_groups(summaries).await,
            ClassifierClient::Mock(b) => b.classify_groups(summaries).await,
        }
    }

    async fn classify_statement(&self, text: &str) -> Result<Vec<ClassificationResult>> {
        match self {
            ClassifierClient::OpenAi(b) => b.classify_statement(text).await,
            ClassifierClient::Mock(b) => b.classify_statement(text).await,
        }
    }

    async fn health_check(&self) -> bool {
        match self {
            ClassifierClient::OpenAi(b) => b.health_check().await,
            ClassifierClient::Mock(b) => b.health_check().await,
        }
    }

    fn model(&self) -> &str {
        match self {
            ClassifierClient::OpenAi(b) => b.model(),
            ClassifierClient::Mock(b) => b.model(),
        }
    }

    fn host(&self) -> &str {
        match self {
            ClassifierClient::OpenAi(b) => b.host(),
            ClassifierClient::Mock(b) => b.host(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classifier_client_mock() {
        let client = ClassifierClient::mock();
        assert_eq!(client.model(), "mock");
        assert_eq!(client.host(), "mock://localhost");
    }

    #[tokio::test]
    async fn test_mock_health_check() {
        let client = ClassifierClient::mock();
        assert!(client.health_check().await);
        assert!(!MockBackend::unhealthy().health_check().await);
    }

    #[tokio::test]
    async fn test_mock_classifies_known_merchant() {
        let client = ClassifierClient::mock();
        let summaries = vec![GroupSummary {
            group_id: "g1".to_string(),
            description: "NETFLIX.COM".to_string(),
            occurrences: 2,
            average_amount: 99.0,
            min_amount: 99.0,
            max_amount: 99.0,
            currency: "DKK".to_string(),
            recent_dates: vec!["2024-01-15".to_string()],
        }];
        let results = client.classify_groups(&summaries).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].is_subscription);
        assert_eq!(results[0].clean_name.as_deref(), Some("Netflix"));
        assert_eq!(results[0].group_id.as_deref(), Some("g1"));
    }
}
