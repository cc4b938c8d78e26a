//! Open-banking feed handlers

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::auth::TokenResponse;
use crate::{AppError, AppState};
use subtrack_core::models::RawTransaction;

/// Authorization-code exchange request
#[derive(Debug, Deserialize)]
pub struct TokenExchangeRequest {
    pub code: String,
}

/// POST /api/feed/token - Exchange an authorization code for a feed access
/// token
pub async fn exchange_feed_token(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TokenExchangeRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let credentials = state
        .config
        .feed
        .credentials
        .as_ref()
        .ok_or_else(|| AppError::unavailable("Bank feed is not configured"))?;

    let token = state
        .feed
        .exchange_code(credentials, &request.code)
        .await
        .map_err(|e| AppError::bad_request(&format!("Token exchange failed: {}", e)))?;

    info!("Feed token exchange succeeded");
    Ok(Json(TokenResponse::bearer(token)))
}

/// Query parameters for the transaction listing
#[derive(Debug, Deserialize)]
pub struct FeedTransactionsQuery {
    pub token: String,
}

/// Transactions across all accounts visible to the credential
#[derive(Serialize)]
pub struct FeedTransactionsResponse {
    pub transactions: Vec<RawTransaction>,
}

/// GET /api/feed/transactions - Fetch accounts and their transactions
pub async fn list_feed_transactions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FeedTransactionsQuery>,
) -> Result<Json<FeedTransactionsResponse>, AppError> {
    let transactions = state
        .feed
        .fetch_all_transactions(&query.token)
        .await
        .map_err(|e| AppError::bad_request(&format!("Feed fetch failed: {}", e)))?;

    info!(count = transactions.len(), "Fetched feed transactions");
    Ok(Json(FeedTransactionsResponse { transactions }))
}
