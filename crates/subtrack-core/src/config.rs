//! Process-wide configuration
//!
//! All credentials and tunables are read from the environment exactly once
//! at startup and passed explicitly into component constructors. Pipeline
//! code never performs ambient environment lookups.

use crate::error::{Error, Result};

/// Default classifier model
const DEFAULT_CLASSIFIER_MODEL: &str = "gpt-4o-mini";

/// Default classifier endpoint
const DEFAULT_CLASSIFIER_URL: &str = "https://api.openai.com";

/// Default open-banking feed endpoint
const DEFAULT_FEED_URL: &str = "https://api.tink.com";

/// Default access-token lifetime in minutes
const DEFAULT_TOKEN_EXPIRE_MINUTES: i64 = 30;

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub auth: AuthConfig,
    pub classifier: ClassifierConfig,
    pub supabase: SupabaseConfig,
    pub feed: FeedConfig,
}

impl AppConfig {
    /// Load the full configuration from the environment.
    ///
    /// Required: `SECRET_JWT_KEY`, `SUPABASE_URL`, `SUPABASE_SERVICE_ROLE_KEY`.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            auth: AuthConfig::from_env()?,
            classifier: ClassifierConfig::from_env(),
            supabase: SupabaseConfig::from_env()?,
            feed: FeedConfig::from_env(),
        })
    }
}

/// Token issuance configuration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// HS256 signing secret for access tokens
    pub jwt_secret: String,
    /// Access-token lifetime in minutes
    pub token_expire_minutes: i64,
}

impl AuthConfig {
    pub fn from_env() -> Result<Self> {
        let jwt_secret = require_env("SECRET_JWT_KEY")?;
        let token_expire_minutes = std::env::var("ACCESS_TOKEN_EXPIRE_MINUTES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_TOKEN_EXPIRE_MINUTES);
        Ok(Self {
            jwt_secret,
            token_expire_minutes,
        })
    }
}

/// Classifier service configuration
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    /// Backend selector: "openai" (default) or "mock"
    pub backend: String,
    pub base_url: String,
    pub model: String,
    /// API key; without one the classifier is unavailable
    pub api_key: Option<String>,
}

impl ClassifierConfig {
    pub fn from_env() -> Self {
        Self {
            backend: std::env::var("CLASSIFIER_BACKEND").unwrap_or_else(|_| "openai".to_string()),
            base_url: std::env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_CLASSIFIER_URL.to_string()),
            model: std::env::var("OPENAI_MODEL")
                .unwrap_or_else(|_| DEFAULT_CLASSIFIER_MODEL.to_string()),
            api_key: std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()),
        }
    }

    /// Configuration for the mock backend (used by tests and the CLI)
    pub fn mock() -> Self {
        Self {
            backend: "mock".to_string(),
            base_url: DEFAULT_CLASSIFIER_URL.to_string(),
            model: DEFAULT_CLASSIFIER_MODEL.to_string(),
            api_key: None,
        }
    }
}

/// Supabase REST facade configuration
#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    pub url: String,
    /// Service-role key; bypasses row-level security
    pub service_role_key: String,
}

impl SupabaseConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            url: require_env("SUPABASE_URL")?,
            service_role_key: require_env("SUPABASE_SERVICE_ROLE_KEY")?,
        })
    }
}

/// Open-banking feed configuration
#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub base_url: String,
    /// OAuth client credentials; None when the feed integration is not set up
    pub credentials: Option<FeedCredentials>,
}

/// OAuth client credentials for the code-for-token exchange
#[derive(Debug, Clone)]
pub struct FeedCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

impl FeedConfig {
    pub fn from_env() -> Self {
        let credentials = match (
            std::env::var("TINK_CLIENT_ID").ok(),
            std::env::var("TINK_CLIENT_SECRET").ok(),
            std::env::var("TINK_REDIRECT_URI").ok(),
        ) {
            (Some(client_id), Some(client_secret), Some(redirect_uri)) => Some(FeedCredentials {
                client_id,
                client_secret,
                redirect_uri,
            }),
            _ => None,
        };

        Self {
            base_url: std::env::var("FEED_BASE_URL").unwrap_or_else(|_| DEFAULT_FEED_URL.to_string()),
            credentials,
        }
    }
}

fn require_env(name: &str) -> Result<String> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::Config(format!("{} not set in environment", name)))
}
