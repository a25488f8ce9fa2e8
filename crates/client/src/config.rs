//! Engine configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `PLATEFUL_API_URL` - Base URL of the Plateful backend API
//!
//! ## Optional
//! - `PLATEFUL_DATA_DIR` - Directory for persisted state (default: `.plateful`)
//! - `PLATEFUL_REQUEST_TIMEOUT_SECS` - HTTP request timeout (default: 10)
//! - `PLATEFUL_REFRESH_COOLDOWN_SECS` - Minimum seconds between manual
//!   refreshes (default: 60)

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

/// Default directory for persisted engine state.
const DEFAULT_DATA_DIR: &str = ".plateful";

/// Default HTTP request timeout.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Default minimum interval between manual refresh triggers.
pub const DEFAULT_REFRESH_COOLDOWN: Duration = Duration::from_secs(60);

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct PlatefulConfig {
    /// Base URL of the backend API.
    pub api_base_url: Url,
    /// Directory the file storage backend persists into.
    pub data_dir: PathBuf,
    /// Timeout applied to every HTTP request.
    pub request_timeout: Duration,
    /// Minimum interval between manual refresh triggers.
    pub refresh_cooldown: Duration,
}

impl PlatefulConfig {
    /// Configuration with defaults for everything but the API URL.
    #[must_use]
    pub fn new(api_base_url: Url) -> Self {
        Self {
            api_base_url,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            refresh_cooldown: DEFAULT_REFRESH_COOLDOWN,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let api_base_url = get_required_env("PLATEFUL_API_URL")?
            .parse::<Url>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("PLATEFUL_API_URL".to_string(), e.to_string())
            })?;
        let data_dir = PathBuf::from(get_env_or_default("PLATEFUL_DATA_DIR", DEFAULT_DATA_DIR));
        let request_timeout = parse_secs(
            "PLATEFUL_REQUEST_TIMEOUT_SECS",
            get_optional_env("PLATEFUL_REQUEST_TIMEOUT_SECS"),
            DEFAULT_REQUEST_TIMEOUT,
        )?;
        let refresh_cooldown = parse_secs(
            "PLATEFUL_REFRESH_COOLDOWN_SECS",
            get_optional_env("PLATEFUL_REFRESH_COOLDOWN_SECS"),
            DEFAULT_REFRESH_COOLDOWN,
        )?;

        Ok(Self {
            api_base_url,
            data_dir,
            request_timeout,
            refresh_cooldown,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an optional seconds value, falling back to a default.
fn parse_secs(
    key: &str,
    value: Option<String>,
    default: Duration,
) -> Result<Duration, ConfigError> {
    match value {
        None => Ok(default),
        Some(raw) => raw
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
    }
}
