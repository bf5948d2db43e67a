//! Error types for the pickroute domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context (store, remote catalog, auth) has its own enum,
//! folded into the top-level [`Error`].

use thiserror::Error;

/// The top-level error type for all pickroute operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Venue lookup ---
    #[error("Venue not found: {0}")]
    TenantNotFound(String),

    // --- Remote catalog ---
    #[error("Remote fetch failed: {0}")]
    RemoteFetch(RemoteError),

    // --- Outbound credentials ---
    #[error("Auth unavailable: {0}")]
    AuthUnavailable(#[from] AuthError),

    // --- Pipeline preconditions ---
    #[error("No picking areas available for venue {0}")]
    NoPickingAreas(String),

    #[error("No {collection} snapshot for venue {venue_id}")]
    NoSnapshot { collection: String, venue_id: String },

    // --- Storage ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Export failed for {path}: {reason}")]
    Export { path: String, reason: String },

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<RemoteError> for Error {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::Auth(auth) => Error::AuthUnavailable(auth),
            other => Error::RemoteFetch(other),
        }
    }
}

impl Error {
    /// Whether this error means "the thing you asked about does not exist".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::TenantNotFound(_) | Error::NoSnapshot { .. })
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    #[error("{endpoint} returned status {status_code}: {message}")]
    Status {
        endpoint: String,
        status_code: u16,
        message: String,
    },

    #[error("{endpoint} returned an empty payload")]
    EmptyPayload { endpoint: String },

    #[error("Network error calling {endpoint}: {reason}")]
    Network { endpoint: String, reason: String },

    #[error("Failed to decode {endpoint} response: {reason}")]
    Decode { endpoint: String, reason: String },

    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("No refresh token on record; seed one with `pickroute token seed`")]
    NoRefreshToken,

    #[error("Token refresh failed (status: {status_code}): {message}")]
    RefreshRejected { status_code: u16, message: String },

    #[error("Token refresh request failed: {0}")]
    RefreshTransport(String),

    #[error("Token record unavailable: {0}")]
    Storage(String),
}

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Document {collection}/{key} is malformed: {reason}")]
    Malformed {
        collection: String,
        key: String,
        reason: String,
    },

    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}
