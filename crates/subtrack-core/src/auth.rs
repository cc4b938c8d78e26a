//! Authentication primitives
//!
//! Argon2id password hashing (PHC string format) and HS256 access tokens.
//! The signing secret and token lifetime come from `AuthConfig`, loaded once
//! at startup.

use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::AuthConfig;
use crate::error::{Error, Result};

/// JWT claims for an access token
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user's email address
    pub sub: String,
    /// Expiry as a unix timestamp
    pub exp: usize,
}

/// Hash a password for storage
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| Error::Auth(format!("failed to hash password: {}", e)))
}

/// Verify a password against a stored hash.
///
/// A malformed stored hash counts as a failed verification, not an error.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    PasswordHash::new(stored_hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

/// Issue a signed access token for a user
pub fn issue_access_token(email: &str, config: &AuthConfig) -> Result<String> {
    let expires_at = Utc::now() + Duration::minutes(config.token_expire_minutes);
    let claims = Claims {
        sub: email.to_string(),
        exp: expires_at.timestamp() as usize,
    };
    Ok(encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )?)
}

/// Validate an access token and return its subject (the user's email)
pub fn decode_subject(token: &str, jwt_secret: &str) -> Result<String> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(data.claims.sub)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AuthConfig {
        AuthConfig {
            jwt_secret: "test-secret".to_string(),
            token_expire_minutes: 30,
        }
    }

    #[test]
    fn test_password_hash_roundtrip() {
        let hash = hash_password("hunter2").unwrap();
        assert!(verify_password("hunter2", &hash));
        assert!(!verify_password("hunter3", &hash));
    }

    #[test]
    fn test_verify_rejects_malformed_hash() {
        assert!(!verify_password("hunter2", "not-a-phc-string"));
    }

    #[test]
    fn test_token_roundtrip() {
        let token = issue_access_token("user@example.com", &config()).unwrap();
        let subject = decode_subject(&token, "test-secret").unwrap();
        assert_eq!(subject, "user@example.com");
    }

    #[test]
    fn test_token_rejects_wrong_secret() {
        let token = issue_access_token("user@example.com", &config()).unwrap();
        assert!(decode_subject(&token, "other-secret").is_err());
    }

    #[test]
    fn test_token_rejects_garbage() {
        assert!(decode_subject("not.a.token", "test-secret").is_err());
    }
}
