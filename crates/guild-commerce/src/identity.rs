//! # Identity
//!
//! Turns a bearer credential into a [`Principal`].
//!
//! ```text
//! Authorization: Bearer eyJhbGciOi...
//!        │
//!        ▼
//! extract_bearer_token ──► IdentityProvider::authenticate
//!                                  │
//!                     ┌────────────┴────────────┐
//!                     ▼                         ▼
//!           Some(Principal {            None (bad signature,
//!             user_id, is_of_age })      expired, malformed)
//! ```

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use guild_core::age::is_of_legal_age;

/// Default token lifetime (7 days).
pub const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 7 * 24 * 60 * 60;

/// An authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub user_id: String,
    /// Verified to be at or above the age of majority.
    pub is_of_age: bool,
}

impl Principal {
    pub fn new(user_id: impl Into<String>, is_of_age: bool) -> Self {
        Principal {
            user_id: user_id.into(),
            is_of_age,
        }
    }
}

/// Resolves bearer credentials to callers.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// `None` for any credential that does not identify a user.
    async fn authenticate(&self, bearer: &str) -> Option<Principal>;
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Failed to issue token: {0}")]
    Issue(String),

    #[error("Invalid token: {0}")]
    Invalid(String),
}

// =============================================================================
// JWT Provider
// =============================================================================

/// JWT claims structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration (Unix timestamp)
    pub exp: i64,

    /// Date of birth, if the user supplied one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dob: Option<NaiveDate>,
}

/// HS256 bearer tokens signed with a shared secret.
pub struct JwtIdentityProvider {
    secret: String,
    lifetime_secs: i64,
}

impl JwtIdentityProvider {
    pub fn new(secret: impl Into<String>) -> Self {
        JwtIdentityProvider {
            secret: secret.into(),
            lifetime_secs: DEFAULT_TOKEN_LIFETIME_SECS,
        }
    }

    pub fn with_lifetime(mut self, lifetime_secs: i64) -> Self {
        self.lifetime_secs = lifetime_secs;
        self
    }

    /// Signs a token for `user_id`.
    pub fn issue_token(&self, user_id: &str, dob: Option<NaiveDate>) -> Result<String, IdentityError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::seconds(self.lifetime_secs)).timestamp(),
            dob,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| IdentityError::Issue(e.to_string()))
    }

    /// Validate and decode a token.
    pub fn validate_token(&self, token: &str) -> Result<Claims, IdentityError> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(|e| IdentityError::Invalid(e.to_string()))
    }
}

#[async_trait]
impl IdentityProvider for JwtIdentityProvider {
    async fn authenticate(&self, bearer: &str) -> Option<Principal> {
        match self.validate_token(bearer) {
            Ok(claims) => Some(Principal {
                is_of_age: is_of_legal_age(claims.dob, Utc::now().date_naive()),
                user_id: claims.sub,
            }),
            Err(e) => {
                debug!(error = %e, "Rejected bearer token");
                None
            }
        }
    }
}

/// Extract bearer token from authorization header.
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
