//! Application configuration loaded from environment variables.
//!
//! Tunables for the Tesla client (retry count, token refresh buffer,
//! wake polling, sync interval) live here so the services can be built
//! from a single struct.

use std::env;
use std::str::FromStr;

/// Default owner API base URL.
pub const DEFAULT_API_BASE_URL: &str = "https://owner-api.teslamotors.com";
/// Default SSO base URL (authorize + token endpoints live under `/oauth2/v3`).
pub const DEFAULT_AUTH_BASE_URL: &str = "https://auth.tesla.com";
/// Redirect URI registered for the `ownerapi` client. The page does not
/// exist; the user copies the URL out of the browser after logging in.
pub const DEFAULT_REDIRECT_URI: &str = "https://auth.tesla.com/void/callback";

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Tesla API ---
    /// OAuth client ID used for the owner API
    pub tesla_client_id: String,
    /// Owner API base URL
    pub api_base_url: String,
    /// SSO base URL
    pub auth_base_url: String,
    /// OAuth redirect URI
    pub redirect_uri: String,

    // --- Client tunables ---
    /// Seconds before a vehicle snapshot is considered stale
    pub sync_interval_secs: i64,
    /// Refresh the access token when it expires in less than this many seconds
    pub token_expire_buffer_secs: i64,
    /// Attempts for transport-level failures
    pub api_max_retries: u32,
    /// Per-request timeout
    pub http_timeout_secs: u64,
    /// Wake-up polling attempts
    pub wakeup_max_tries: u32,
    /// Seconds between wake-up attempts
    pub wakeup_delay_secs: u64,

    // --- Server ---
    /// Frontend URL allowed by CORS
    pub frontend_url: String,
    /// GCP project ID (Firestore storage is used when set)
    pub gcp_project_id: Option<String>,
    /// Server port
    pub port: u16,

    // --- Secrets ---
    /// JWT signing key for host-issued session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// Shared secret the external scheduler presents on `/tasks/*`
    pub tasks_shared_secret: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let config = Self {
            tesla_client_id: env::var("TESLA_CLIENT_ID").unwrap_or_else(|_| "ownerapi".to_string()),
            api_base_url: env::var("TESLA_API_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_string()),
            auth_base_url: env::var("TESLA_AUTH_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_AUTH_BASE_URL.to_string()),
            redirect_uri: env::var("TESLA_REDIRECT_URI")
                .unwrap_or_else(|_| DEFAULT_REDIRECT_URI.to_string()),

            sync_interval_secs: parse_or("SYNC_INTERVAL_SECS", 3600)?,
            token_expire_buffer_secs: parse_or("TOKEN_EXPIRE_BUFFER_SECS", 3 * 3600)?,
            api_max_retries: parse_or("API_MAX_RETRIES", 3)?,
            http_timeout_secs: parse_or("HTTP_TIMEOUT_SECS", 30)?,
            wakeup_max_tries: parse_or("WAKEUP_MAX_TRIES", 5)?,
            wakeup_delay_secs: parse_or("WAKEUP_DELAY_SECS", 3)?,

            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").ok().filter(|v| !v.is_empty()),
            port: parse_or("PORT", 8080)?,

            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),
            tasks_shared_secret: env::var("TASKS_SHARED_SECRET")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("TASKS_SHARED_SECRET"))?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject base URLs that cannot be joined with endpoint paths.
    fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("TESLA_API_BASE_URL", &self.api_base_url),
            ("TESLA_AUTH_BASE_URL", &self.auth_base_url),
            ("TESLA_REDIRECT_URI", &self.redirect_uri),
        ] {
            reqwest::Url::parse(value).map_err(|e| ConfigError::Invalid {
                name,
                reason: e.to_string(),
            })?;
        }
        Ok(())
    }

    /// Default config for testing only.
    pub fn test_default() -> Self {
        Self {
            tesla_client_id: "ownerapi".to_string(),
            api_base_url: "https://owner-api.test".to_string(),
            auth_base_url: "https://auth.test".to_string(),
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            sync_interval_secs: 3600,
            token_expire_buffer_secs: 3 * 3600,
            api_max_retries: 3,
            http_timeout_secs: 30,
            wakeup_max_tries: 5,
            wakeup_delay_secs: 3,
            frontend_url: "http://localhost:5173".to_string(),
            gcp_project_id: None,
            port: 8080,
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            tasks_shared_secret: "test_tasks_secret".to_string(),
        }
    }
}

fn parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}
