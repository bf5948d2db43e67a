//! Outbound OAuth token record and the refresher trait.
//!
//! Exactly one token record exists per process. It is replaced in full on
//! every refresh; nothing ever patches individual fields.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// The stored token.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub access_token: String,
    pub refresh_token: String,
    /// Absolute expiry, seconds since the Unix epoch
    pub expires_at: i64,
}

impl TokenRecord {
    /// Build a record from a refresh response received at `now`.
    pub fn issued(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_in_secs: i64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            expires_at: now.timestamp() + expires_in_secs,
        }
    }

    /// A record that only carries a refresh token and is already expired,
    /// so the next `access_token()` call refreshes immediately.
    pub fn seed(refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: String::new(),
            refresh_token: refresh_token.into(),
            expires_at: 0,
        }
    }

    /// Expired once `now >= expires_at`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() >= self.expires_at
    }

    pub fn has_refresh_token(&self) -> bool {
        !self.refresh_token.trim().is_empty()
    }
}

impl std::fmt::Debug for TokenRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenRecord")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Exchanges a refresh token for a new [`TokenRecord`].
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenRecord, AuthError>;
}
