//! OpenAI chat-completions backend
//!
//! Works with api.openai.com and any server implementing the
//! `/v1/chat/completions` API. The base URL and model are configurable so
//! self-hosted OpenAI-compatible servers work unchanged.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ClassifierConfig;
use crate::error::{Error, Result};

use super::parsing::parse_classification_results;
use super::prompts;
use super::types::{ClassificationResult, GroupSummary};
use super::ClassifierBackend;

/// Sampling temperature for classification requests
const TEMPERATURE: f32 = 0.1;

/// Token budget for the transaction-group variant
const GROUP_MAX_TOKENS: u32 = 2000;

/// Token budget for the statement variant (larger reply, amounts included)
const STATEMENT_MAX_TOKENS: u32 = 3000;

/// OpenAI-compatible classifier backend
#[derive(Clone)]
pub struct OpenAiBackend {
    http_client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl OpenAiBackend {
    /// Create a new backend against an OpenAI-compatible endpoint
    pub fn new(base_url: &str, model: &str, api_key: &str) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
        }
    }

    /// Create from configuration; None when no API key is configured
    pub fn from_config(config: &ClassifierConfig) -> Option<Self> {
        config
            .api_key
            .as_deref()
            .map(|key| Self::new(&config.base_url, &config.model, key))
    }

    /// Make a chat completion request and return the reply text
    async fn chat_completion(&self, user_prompt: &str, max_tokens: u32) -> Result<String> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: prompts::SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user_prompt.to_string(),
                },
            ],
            temperature: TEMPERATURE,
            max_tokens,
        };

        let response = self
            .http_client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Classifier(format!(
                "classifier API error {}: {}",
                status, body
            )));
        }

        let chat_response: ChatCompletionResponse = response.json().await?;

        chat_response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| Error::Classifier("no choices in classifier response".into()))
    }
}

/// Request to the chat completions API
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

/// Response from the chat completions API
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[async_trait]
impl ClassifierBackend for OpenAiBackend {
    async fn classify_groups(
        &self,
        summaries: &[GroupSummary],
    ) -> Result<Vec<ClassificationResult>> {
        let prompt = prompts::transaction_groups_prompt(summaries);
        let reply = self.chat_completion(&prompt, GROUP_MAX_TOKENS).await?;
        debug!(reply_len = reply.len(), "Classifier reply for transaction groups");
        Ok(parse_classification_results(&reply))
    }

    async fn classify_statement(&self, text: &str) -> Result<Vec<ClassificationResult>> {
        let prompt = prompts::statement_prompt(text);
        let reply = self.chat_completion(&prompt, STATEMENT_MAX_TOKENS).await?;
        debug!(reply_len = reply.len(), "Classifier reply for statement");
        Ok(parse_classification_results(&reply))
    }

    async fn health_check(&self) -> bool {
        let response = self
            .http_client
            .get(format!("{}/v1/models", self.base_url))
            .bearer_auth(&self.api_key)
            .send()
            .await;
        matches!(response, Ok(r) if r.status().is_success())
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn host(&self) -> &str {
        &self.base_url
    }
}
