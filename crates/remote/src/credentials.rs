//! Credential cache: expiry-aware reuse of the outbound OAuth token.
//!
//! The token record lives in the document store so every process sharing
//! the store reuses it. `access_token()` returns the stored access token
//! while it is unexpired and otherwise exchanges the refresh token for a
//! new record. Refreshes are single-flight: concurrent callers wait on
//! one lock and re-check the record, so one expiry causes one refresh call.

use async_trait::async_trait;
use chrono::Utc;
use pickroute_core::error::AuthError;
use pickroute_core::store::{DocumentStore, DocumentStoreExt};
use pickroute_core::token::{TokenRecord, TokenRefresher};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Hands out access tokens that are never used at or past their expiry.
pub struct CredentialCache {
    store: Arc<dyn DocumentStore>,
    refresher: Arc<dyn TokenRefresher>,
    bootstrap_refresh_token: Option<String>,
    refresh_lock: Mutex<()>,
}

impl CredentialCache {
    pub fn new(store: Arc<dyn DocumentStore>, refresher: Arc<dyn TokenRefresher>) -> Self {
        Self {
            store,
            refresher,
            bootstrap_refresh_token: None,
            refresh_lock: Mutex::new(()),
        }
    }

    /// Refresh token to fall back on when the store holds no record yet.
    pub fn with_bootstrap_refresh_token(mut self, token: Option<String>) -> Self {
        self.bootstrap_refresh_token = token
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        self
    }

    /// A currently valid access token, refreshing first when needed.
    pub async fn access_token(&self) -> Result<String, AuthError> {
        if let Some(token) = self.valid_token().await? {
            return Ok(token);
        }

        let _guard = self.refresh_lock.lock().await;

        // Another caller may have refreshed while we waited
        let record = self.load().await?;
        if let Some(token) = record.as_ref().and_then(usable_access_token) {
            debug!("Token refreshed by a concurrent caller");
            return Ok(token);
        }

        let refresh_token = record
            .filter(TokenRecord::has_refresh_token)
            .map(|r| r.refresh_token)
            .or_else(|| self.bootstrap_refresh_token.clone())
            .ok_or(AuthError::NoRefreshToken)?;

        debug!("Access token missing or expired, refreshing");
        let fresh = self.refresher.refresh(&refresh_token).await?;
        self.store
            .save_token_record(&fresh)
            .await
            .map_err(|e| AuthError::Storage(e.to_string()))?;

        // Saved even when unusable so a rotated refresh token is not lost
        if fresh.access_token.is_empty() || fresh.is_expired(Utc::now()) {
            warn!(expires_at = fresh.expires_at, "Refreshed access token is already expired");
            return Err(AuthError::RefreshTransport(
                "Token endpoint issued an already expired access token".into(),
            ));
        }

        info!(expires_at = fresh.expires_at, "Access token refreshed");
        Ok(fresh.access_token)
    }

    /// Store an operator-provided refresh token. The record starts expired,
    /// so the next `access_token()` call refreshes immediately.
    pub async fn seed(&self, refresh_token: &str) -> Result<(), AuthError> {
        let refresh_token = refresh_token.trim();
        if refresh_token.is_empty() {
            return Err(AuthError::NoRefreshToken);
        }

        let _guard = self.refresh_lock.lock().await;
        self.store
            .save_token_record(&TokenRecord::seed(refresh_token))
            .await
            .map_err(|e| AuthError::Storage(e.to_string()))?;
        info!("Refresh token seeded");
        Ok(())
    }

    async fn valid_token(&self) -> Result<Option<String>, AuthError> {
        Ok(self.load().await?.as_ref().and_then(usable_access_token))
    }

    async fn load(&self) -> Result<Option<TokenRecord>, AuthError> {
        self.store
            .token_record()
            .await
            .map_err(|e| AuthError::Storage(e.to_string()))
    }
}

fn usable_access_token(record: &TokenRecord) -> Option<String> {
    (!record.access_token.is_empty() && !record.is_expired(Utc::now()))
        .then(|| record.access_token.clone())
}

/// Refresh response from the OAuth token endpoint.
#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    expires_in: i64,
}

/// Exchanges refresh tokens at an OAuth2 token endpoint
/// (`grant_type=refresh_token`, form encoded).
pub struct OAuthRefresher {
    refresh_url: String,
    client: reqwest::Client,
}

impl OAuthRefresher {
    pub fn new(refresh_url: impl Into<String>, timeout: Duration) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::RefreshTransport(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            refresh_url: refresh_url.into(),
            client,
        })
    }
}

#[async_trait]
impl TokenRefresher for OAuthRefresher {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenRecord, AuthError> {
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];

        let response = self
            .client
            .post(&self.refresh_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| AuthError::RefreshTransport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Token endpoint rejected refresh");
            return Err(AuthError::RefreshRejected {
                status_code: status.as_u16(),
                message: body,
            });
        }

        let parsed: RefreshResponse = response
            .json()
            .await
            .map_err(|e| AuthError::RefreshTransport(format!("Failed to parse token response: {e}")))?;

        if parsed.expires_in <= 0 {
            return Err(AuthError::RefreshTransport(format!(
                "Token response has non-positive expires_in: {}",
                parsed.expires_in
            )));
        }

        // Some providers do not rotate the refresh token
        let next_refresh = parsed
            .refresh_token
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| refresh_token.to_string());

        Ok(TokenRecord::issued(
            parsed.access_token,
            next_refresh,
            parsed.expires_in,
            Utc::now(),
        ))
    }
}
