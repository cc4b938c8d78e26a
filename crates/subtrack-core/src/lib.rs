//! SubTrack Core Library
//!
//! Shared functionality for the SubTrack subscription tracker:
//! - Merchant description normalization
//! - AI-assisted subscription detection (transaction feed and statements)
//! - Pluggable classifier backends (OpenAI-compatible, mock)
//! - Supabase REST persistence client
//! - Open-banking feed client
//! - Password hashing and access tokens
//! - Process-wide configuration loaded once at startup

pub mod ai;
pub mod auth;
pub mod config;
pub mod detect;
pub mod error;
pub mod feed;
pub mod models;
pub mod normalize;
pub mod statement;
pub mod store;

/// Test utilities including mock Supabase/classifier servers
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use ai::{
    ClassificationResult, ClassifierBackend, ClassifierClient, GroupSummary, MockBackend,
    OpenAiBackend,
};
pub use config::{
    AppConfig, AuthConfig, ClassifierConfig, FeedConfig, FeedCredentials, SupabaseConfig,
};
pub use detect::SubscriptionDetector;
pub use error::{Error, Result};
pub use feed::FeedClient;
pub use models::{
    DetectedSubscription, Frequency, NewSubscription, RawTransaction, SubscriptionRecord,
    SubscriptionSource, User,
};
pub use normalize::normalize_description;
pub use store::SupabaseStore;
