//! Signup and login handlers

use std::sync::Arc;

use axum::{extract::State, Form, Json};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{AppError, AppState};
use subtrack_core::auth;

/// Signup request body
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
}

/// Public view of a user (never includes the password hash)
#[derive(Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub email: String,
}

/// OAuth2-style password login form
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

/// Issued access token
#[derive(Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

impl TokenResponse {
    pub fn bearer(access_token: String) -> Self {
        Self {
            access_token,
            token_type: "bearer".to_string(),
        }
    }
}

/// POST /api/auth/signup - Register a new user
pub async fn signup(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SignupRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let email = request.email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::bad_request("Invalid email address"));
    }
    if request.password.is_empty() {
        return Err(AppError::bad_request("Password must not be empty"));
    }

    if state.store.user_by_email(&email).await?.is_some() {
        return Err(AppError::bad_request("Email already registered"));
    }

    let hashed_password = auth::hash_password(&request.password)?;
    let user = state.store.create_user(&email, &hashed_password).await?;

    info!(user = %user.email, "User registered");
    Ok(Json(UserResponse {
        id: user.id,
        email: user.email,
    }))
}

/// POST /api/auth/login - Exchange credentials for an access token
pub async fn login(
    State(state): State<Arc<AppState>>,
    Form(form): Form<LoginForm>,
) -> Result<Json<TokenResponse>, AppError> {
    let email = form.username.trim().to_lowercase();

    let user = state.store.user_by_email(&email).await?;
    let Some(user) = user else {
        return Err(AppError::unauthorized("Incorrect email or password"));
    };

    if !auth::verify_password(&form.password, &user.hashed_password) {
        return Err(AppError::unauthorized("Incorrect email or password"));
    }

    if let Err(e) = state.store.touch_last_login(user.id).await {
        warn!(user = %user.email, error = %e, "Failed to update last login");
    }

    let token = auth::issue_access_token(&user.email, &state.config.auth)?;
    Ok(Json(TokenResponse::bearer(token)))
}
