//! Configuration loading, validation, and management for pickroute.
//!
//! Loads configuration from `~/.pickroute/config.toml` with environment
//! variable overrides. Validates all settings at startup.
//!
//! This is process configuration only. Per-venue rules and schedules live in
//! the document store (`venue_settings`), not here.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.pickroute/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Document store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Outbound OAuth settings
    #[serde(default)]
    pub auth: AuthConfig,

    /// Remote catalog HTTP settings
    #[serde(default)]
    pub remote: RemoteConfig,

    /// Assignment pipeline settings
    #[serde(default)]
    pub sync: SyncConfig,

    /// Background scheduler settings
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// "memory", "file", or "sqlite"
    #[serde(default = "default_store_backend")]
    pub backend: String,

    /// Directory (file backend) or database file (sqlite backend).
    /// Defaults to a location under `~/.pickroute/`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

fn default_store_backend() -> String {
    "sqlite".into()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            path: None,
        }
    }
}

impl StoreConfig {
    /// Resolved storage path for the configured backend.
    pub fn resolved_path(&self) -> PathBuf {
        match &self.path {
            Some(path) => PathBuf::from(path),
            None if self.backend == "file" => AppConfig::config_dir().join("store"),
            None => AppConfig::config_dir().join("pickroute.db"),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// OAuth token endpoint used for `grant_type=refresh_token`
    #[serde(default = "default_refresh_url")]
    pub refresh_url: String,

    /// Refresh token used when no token record exists yet
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bootstrap_refresh_token: Option<String>,
}

fn default_refresh_url() -> String {
    "https://auth.example.com/oauth/token".into()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            refresh_url: default_refresh_url(),
            bootstrap_refresh_token: None,
        }
    }
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("refresh_url", &self.refresh_url)
            .field("bootstrap_refresh_token", &redact(&self.bootstrap_refresh_token))
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Per-request timeout for catalog and token calls
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Where `{venue_id}.json` catalog exports are written
    #[serde(default = "default_export_dir")]
    pub export_dir: String,

    /// Log write-backs instead of posting them
    #[serde(default)]
    pub dry_run: bool,
}

fn default_export_dir() -> String {
    "exports".into()
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            export_dir: default_export_dir(),
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// How often the scheduler evaluates triggers
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,

    /// Offset from UTC that schedule times are expressed in
    #[serde(default = "default_utc_offset_minutes")]
    pub utc_offset_minutes: i32,
}

fn default_true() -> bool {
    true
}
fn default_tick_secs() -> u64 {
    60
}
fn default_utc_offset_minutes() -> i32 {
    120
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tick_secs: default_tick_secs(),
            utc_offset_minutes: default_utc_offset_minutes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,
}

fn default_port() -> u16 {
    42618
}
fn default_host() -> String {
    "127.0.0.1".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: default_port(),
            host: default_host(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.pickroute/config.toml).
    ///
    /// Environment overrides (highest priority):
    /// - `PICKROUTE_REFRESH_URL`
    /// - `PICKROUTE_REFRESH_TOKEN`
    /// - `PICKROUTE_STORE` (backend name)
    /// - `PICKROUTE_STORE_PATH`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("PICKROUTE_REFRESH_URL") {
            self.auth.refresh_url = url;
        }
        if let Ok(token) = std::env::var("PICKROUTE_REFRESH_TOKEN") {
            self.auth.bootstrap_refresh_token = Some(token);
        }
        if let Ok(backend) = std::env::var("PICKROUTE_STORE") {
            self.store.backend = backend;
        }
        if let Ok(path) = std::env::var("PICKROUTE_STORE_PATH") {
            self.store.path = Some(path);
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".pickroute")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if !matches!(self.store.backend.as_str(), "memory" | "file" | "sqlite") {
            return Err(ConfigError::ValidationError(format!(
                "store.backend must be one of memory, file, sqlite (got '{}')",
                self.store.backend
            )));
        }

        if self.scheduler.tick_secs == 0 || self.scheduler.tick_secs > 60 {
            return Err(ConfigError::ValidationError(
                "scheduler.tick_secs must be between 1 and 60".into(),
            ));
        }

        if self.scheduler.utc_offset_minutes.abs() >= 24 * 60 {
            return Err(ConfigError::ValidationError(
                "scheduler.utc_offset_minutes must be within ±1439".into(),
            ));
        }

        if self.remote.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "remote.timeout_secs must be > 0".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
