//! HTTP request handlers organized by domain
//!
//! Each submodule contains handlers for a specific API area.

pub mod auth;
pub mod detection;
pub mod feed;
pub mod subscriptions;

// Re-export all handlers for use in router
pub use auth::*;
pub use detection::*;
pub use feed::*;
pub use subscriptions::*;
