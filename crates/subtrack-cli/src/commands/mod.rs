//! Command implementations

use std::path::Path;

use anyhow::{bail, Context, Result};
use tracing::info;

use subtrack_core::ai::{ClassifierBackend, ClassifierClient};
use subtrack_core::config::{AppConfig, ClassifierConfig};
use subtrack_core::detect::SubscriptionDetector;
use subtrack_core::models::RawTransaction;
use subtrack_core::statement;

/// Start the REST API server
pub async fn cmd_serve(host: &str, port: u16) -> Result<()> {
    let config = AppConfig::from_env().context("loading configuration from environment")?;
    subtrack_server::serve(config, host, port).await
}

/// Build a classifier client: the mock one, or the configured backend
fn build_classifier(mock: bool) -> Result<ClassifierClient> {
    if mock {
        return Ok(ClassifierClient::mock());
    }
    let config = ClassifierConfig::from_env();
    match ClassifierClient::from_config(&config) {
        Some(client) => {
            info!(host = client.host(), model = client.model(), "Using classifier");
            Ok(client)
        }
        None => bail!("no classifier configured; set OPENAI_API_KEY or pass --mock"),
    }
}

/// Detect subscriptions in a JSON dump of feed transactions
pub async fn cmd_analyze(file: &Path, mock: bool) -> Result<()> {
    let data = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;
    let transactions: Vec<RawTransaction> =
        serde_json::from_str(&data).context("parsing transaction JSON")?;
    info!(count = transactions.len(), "Loaded transactions");

    let classifier = build_classifier(mock)?;
    let detector = SubscriptionDetector::new(&classifier);
    let subscriptions = detector.detect_from_feed(&transactions).await?;

    println!("{}", serde_json::to_string_pretty(&subscriptions)?);
    info!(detected = subscriptions.len(), "Analysis complete");
    Ok(())
}

/// Detect subscriptions in a PDF bank statement
pub async fn cmd_statement(file: &Path, mock: bool) -> Result<()> {
    let data =
        std::fs::read(file).with_context(|| format!("reading {}", file.display()))?;
    let text = statement::extract_statement_text(&data)?;
    info!(text_len = text.len(), "Extracted statement text");

    let classifier = build_classifier(mock)?;
    let detector = SubscriptionDetector::new(&classifier);
    let subscriptions = detector.detect_from_statement(&text).await?;

    println!("{}", serde_json::to_string_pretty(&subscriptions)?);
    info!(detected = subscriptions.len(), "Analysis complete");
    Ok(())
}
