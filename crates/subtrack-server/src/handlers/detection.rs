//! Subscription detection handlers
//!
//! Two variants: structured transactions from the feed, and uploaded PDF
//! statements. Both run the same classification pipeline; only the evidence
//! differs.

use std::sync::Arc;

use axum::{
    extract::{Multipart, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{AppError, AppState, AuthUser, MAX_UPLOAD_SIZE};
use subtrack_core::ai::ClassifierClient;
use subtrack_core::detect::SubscriptionDetector;
use subtrack_core::models::{DetectedSubscription, RawTransaction};
use subtrack_core::statement;

/// Minimum extracted text length for a statement to be analyzable
const MIN_STATEMENT_TEXT: usize = 100;

/// Request body with raw feed transactions to analyze
#[derive(Debug, Deserialize)]
pub struct AnalyzeTransactionsRequest {
    pub transactions: Vec<RawTransaction>,
}

/// Detected subscriptions for one analysis request
#[derive(Serialize)]
pub struct DetectionResponse {
    pub subscriptions: Vec<DetectedSubscription>,
}

fn classifier(state: &AppState) -> Result<&ClassifierClient, AppError> {
    state
        .classifier
        .as_ref()
        .ok_or_else(|| AppError::unavailable("Subscription classifier is not configured"))
}

/// POST /api/detect/transactions - Detect subscriptions in a transaction
/// list
pub async fn analyze_transactions(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(request): Json<AnalyzeTransactionsRequest>,
) -> Result<Json<DetectionResponse>, AppError> {
    info!(
        user = %user.email,
        transactions = request.transactions.len(),
        "Analyzing feed transactions"
    );

    let detector = SubscriptionDetector::new(classifier(&state)?);
    let subscriptions = detector.detect_from_feed(&request.transactions).await?;

    Ok(Json(DetectionResponse { subscriptions }))
}

/// POST /api/detect/statement - Detect subscriptions in an uploaded PDF
/// statement
///
/// Expects multipart form with:
/// - file: the PDF statement (required, max 10MB)
pub async fn analyze_statement(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    mut multipart: Multipart,
) -> Result<Json<DetectionResponse>, AppError> {
    let classifier = classifier(&state)?;

    let mut file_data: Option<Vec<u8>> = None;
    let mut filename: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(&format!("Failed to read form field: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        filename = field.file_name().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|_| AppError::bad_request("Failed to read file data"))?;

        if bytes.len() > MAX_UPLOAD_SIZE {
            return Err(AppError::bad_request(&format!(
                "File too large. Maximum size is {} MB",
                MAX_UPLOAD_SIZE / 1024 / 1024
            )));
        }
        file_data = Some(bytes.to_vec());
    }

    let file_data = file_data.ok_or_else(|| AppError::bad_request("Missing file field"))?;

    // Reject unsupported document types before any processing
    let is_pdf = filename
        .as_deref()
        .map(|name| name.to_lowercase().ends_with(".pdf"))
        .unwrap_or(false);
    if !is_pdf {
        return Err(AppError::bad_request("Only PDF files are supported"));
    }

    let text = statement::extract_statement_text(&file_data)
        .map_err(|e| AppError::bad_request(&format!("Could not read PDF: {}", e)))?;

    if text.trim().len() < MIN_STATEMENT_TEXT {
        return Err(AppError::bad_request(
            "PDF contains insufficient text content",
        ));
    }

    info!(
        user = %user.email,
        filename = filename.as_deref().unwrap_or("statement.pdf"),
        text_len = text.len(),
        "Analyzing statement"
    );

    let detector = SubscriptionDetector::new(classifier);
    let subscriptions = detector.detect_from_statement(&text).await?;

    Ok(Json(DetectionResponse { subscriptions }))
}
