//! Subscription CRUD and summary handlers

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{AppError, AppState, AuthUser, SuccessResponse};
use subtrack_core::detect::DEFAULT_CATEGORY;
use subtrack_core::models::{
    Frequency, NewAnalyticsEvent, NewSubscription, SubscriptionRecord, SubscriptionSource,
};

/// Request body for creating a subscription
#[derive(Debug, Deserialize)]
pub struct CreateSubscriptionRequest {
    pub title: String,
    pub amount: f64,
    pub renewal_date: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub frequency: Option<Frequency>,
    #[serde(default)]
    pub source: Option<SubscriptionSource>,
    #[serde(default)]
    pub transaction_date: Option<String>,
    #[serde(default)]
    pub confidence_score: Option<f64>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// POST /api/subscriptions - Store a subscription for the caller
pub async fn create_subscription(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(request): Json<CreateSubscriptionRequest>,
) -> Result<Json<SubscriptionRecord>, AppError> {
    if request.title.trim().is_empty() {
        return Err(AppError::bad_request("Title must not be empty"));
    }

    let new = NewSubscription {
        title: request.title,
        amount: request.amount,
        renewal_date: request.renewal_date,
        category: request
            .category
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
        currency: request.currency.unwrap_or_else(|| "DKK".to_string()),
        frequency: request.frequency.unwrap_or_default(),
        source: request.source.unwrap_or_default(),
        owner_id: user.id,
        transaction_date: request.transaction_date,
        confidence_score: request.confidence_score,
        notes: request.notes,
    };

    let record = state.store.insert_subscription(&new).await?;

    let event = NewAnalyticsEvent {
        user_id: user.id,
        event_type: "subscription_added".to_string(),
        subscription_id: Some(record.id),
        merchant_name: Some(record.title.clone()),
        event_data: Some(serde_json::json!({
            "source": new.source.as_str(),
            "category": new.category,
        })),
    };
    if let Err(e) = state.store.record_event(&event).await {
        warn!(error = %e, "Failed to record analytics event");
    }

    Ok(Json(record))
}

/// GET /api/subscriptions - List the caller's active subscriptions
pub async fn list_subscriptions(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<Vec<SubscriptionRecord>>, AppError> {
    Ok(Json(state.store.subscriptions_by_owner(user.id).await?))
}

/// DELETE /api/subscriptions/:id - Soft-delete one of the caller's
/// subscriptions
pub async fn delete_subscription(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(subscription_id): Path<i64>,
) -> Result<Json<SuccessResponse>, AppError> {
    // Ownership check before the soft delete; the store itself runs with the
    // service-role key and would happily delete anything.
    let owned = state.store.subscriptions_by_owner(user.id).await?;
    let subscription = owned
        .iter()
        .find(|s| s.id == subscription_id)
        .ok_or_else(|| AppError::not_found("Subscription not found or not owned by user"))?;

    let event = NewAnalyticsEvent {
        user_id: user.id,
        event_type: "subscription_deleted".to_string(),
        subscription_id: Some(subscription.id),
        merchant_name: Some(subscription.title.clone()),
        event_data: None,
    };
    if let Err(e) = state.store.record_event(&event).await {
        warn!(error = %e, "Failed to record analytics event");
    }

    state.store.deactivate_subscription(subscription_id).await?;
    Ok(Json(SuccessResponse { success: true }))
}

/// Per-category spending aggregate
#[derive(Serialize)]
pub struct CategorySpending {
    pub category: String,
    pub total: f64,
}

/// Summary of the caller's subscription spending
#[derive(Serialize)]
pub struct UserSummary {
    pub monthly_total: f64,
    pub top3_expensive: Vec<SubscriptionRecord>,
    pub category_spending: Vec<CategorySpending>,
}

/// GET /api/user/summary - Spending summary for the caller
pub async fn user_summary(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<UserSummary>, AppError> {
    let subscriptions = state.store.subscriptions_by_owner(user.id).await?;

    let monthly_total = subscriptions.iter().map(|s| s.amount).sum();

    let mut sorted = subscriptions.clone();
    sorted.sort_by(|a, b| b.amount.partial_cmp(&a.amount).unwrap_or(std::cmp::Ordering::Equal));
    let top3_expensive = sorted.into_iter().take(3).collect();

    let mut by_category: HashMap<String, f64> = HashMap::new();
    for subscription in &subscriptions {
        let category = subscription
            .category
            .clone()
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());
        *by_category.entry(category).or_insert(0.0) += subscription.amount;
    }
    let mut category_spending: Vec<CategorySpending> = by_category
        .into_iter()
        .map(|(category, total)| CategorySpending { category, total })
        .collect();
    category_spending.sort_by(|a, b| {
        b.total
            .partial_cmp(&a.total)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    Ok(Json(UserSummary {
        monthly_total,
        top3_expensive,
        category_spending,
    }))
}
