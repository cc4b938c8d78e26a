//! SubTrack Web Server
//!
//! Axum-based REST API for the SubTrack subscription tracker.
//!
//! Security posture:
//! - Bearer JWT authentication on user-scoped routes (issued at login)
//! - Restrictive CORS policy
//! - Upload size limits for statement analysis
//! - Sanitized error responses (full errors only in the log)

use std::sync::Arc;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::{cors::CorsLayer, set_header::SetResponseHeaderLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use subtrack_core::ai::{ClassifierBackend, ClassifierClient};
use subtrack_core::auth;
use subtrack_core::config::AppConfig;
use subtrack_core::feed::FeedClient;
use subtrack_core::store::SupabaseStore;

mod handlers;

/// Maximum statement upload size (10 MB)
pub const MAX_UPLOAD_SIZE: usize = 10 * 1024 * 1024;

/// Shared application state
pub struct AppState {
    pub config: AppConfig,
    pub store: SupabaseStore,
    pub feed: FeedClient,
    pub classifier: Option<ClassifierClient>,
}

impl AppState {
    /// Build the state from configuration, constructing each collaborator
    /// client exactly once
    pub fn from_config(config: AppConfig) -> Self {
        let store = SupabaseStore::new(&config.supabase);
        let feed = FeedClient::new(&config.feed.base_url);
        let classifier = ClassifierClient::from_config(&config.classifier);
        Self {
            config,
            store,
            feed,
            classifier,
        }
    }
}

/// Authenticated caller, resolved from the bearer token
///
/// Decodes the JWT with the configured secret and looks the subject up in
/// the store; any failure along the way is a 401.
pub struct AuthUser {
    pub id: i64,
    pub email: String,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or_else(|| AppError::unauthorized("Could not validate credentials"))?;

        let email = auth::decode_subject(token, &state.config.auth.jwt_secret)
            .map_err(|_| AppError::unauthorized("Could not validate credentials"))?;

        let user = state
            .store
            .user_by_email(&email)
            .await?
            .ok_or_else(|| AppError::unauthorized("Could not validate credentials"))?;

        Ok(AuthUser {
            id: user.id,
            email: user.email,
        })
    }
}

/// Success response
#[derive(Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    match &state.classifier {
        Some(classifier) => info!(
            "Classifier configured: {} (model: {})",
            classifier.host(),
            classifier.model()
        ),
        None => info!("Classifier not configured (set OPENAI_API_KEY to enable detection)"),
    }

    let api_routes = Router::new()
        // Auth
        .route("/auth/signup", post(handlers::signup))
        .route("/auth/login", post(handlers::login))
        // Subscriptions
        .route(
            "/subscriptions",
            get(handlers::list_subscriptions).post(handlers::create_subscription),
        )
        .route("/subscriptions/:id", delete(handlers::delete_subscription))
        .route("/user/summary", get(handlers::user_summary))
        // Bank feed
        .route("/feed/token", post(handlers::exchange_feed_token))
        .route("/feed/transactions", get(handlers::list_feed_transactions))
        // Detection
        .route("/detect/transactions", post(handlers::analyze_transactions))
        .route("/detect/statement", post(handlers::analyze_statement));

    // Restrictive CORS: same-origin only, explicit methods and headers
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .nest("/api", api_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
}

/// Start the server
pub async fn serve(config: AppConfig, host: &str, port: u16) -> anyhow::Result<()> {
    let state = Arc::new(AppState::from_config(config));

    if let Some(classifier) = &state.classifier {
        if classifier.health_check().await {
            info!(
                "Classifier connected: {} (model: {})",
                classifier.host(),
                classifier.model()
            );
        } else {
            warn!(
                "Classifier configured but not responding: {}",
                classifier.host()
            );
        }
    }

    let app = create_router(state);
    let addr = format!("{}:{}", host, port);

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Error Handling
// ============================================================================

/// Application error type with proper HTTP status codes
pub struct AppError {
    status: StatusCode,
    message: String,
    internal: Option<anyhow::Error>,
}

impl AppError {
    pub fn bad_request(msg: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn unauthorized(msg: &str) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn not_found(msg: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn unavailable(msg: &str) -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            message: msg.to_string(),
            internal: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the full internal error if present
        if let Some(err) = &self.internal {
            error!(error = %err, "Internal error");
        }

        let body = Json(serde_json::json!({
            "error": self.message
        }));

        (self.status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        let err = err.into();
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            // Return generic message to client
            message: "An internal error occurred".to_string(),
            // Keep full error for logging
            internal: Some(err),
        }
    }
}

#[cfg(test)]
mod tests;
