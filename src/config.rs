//! Client configuration parsed from environment variables.
//!
//! SYSTEM CONTEXT
//! ==============
//! The library never reads the environment on its own; binaries call
//! [`ClientConfig::from_env`] once at startup and hand the typed result to
//! the transport, token store, and poller constructors.

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "/api/v1";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5000;
pub const DEFAULT_TOKEN_DIR_NAME: &str = ".trialdesk";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("TRIALDESK_API_URL must not be empty")]
    EmptyBaseUrl,
    #[error("TRIALDESK_API_URL must be an absolute http(s) URL, got `{0}`")]
    RelativeBaseUrl(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self { request_secs: DEFAULT_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// API base URL without a trailing slash.
    pub api_base_url: String,
    pub timeouts: HttpTimeouts,
    pub poll_interval_ms: u64,
    /// Directory holding the persisted bearer token.
    pub token_dir: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_owned(),
            timeouts: HttpTimeouts::default(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            token_dir: default_token_dir(),
        }
    }
}

impl ClientConfig {
    /// Build typed client config from environment variables.
    ///
    /// Optional:
    /// - `TRIALDESK_API_URL`: default `/api/v1`
    /// - `TRIALDESK_REQUEST_TIMEOUT_SECS`: default 30
    /// - `TRIALDESK_CONNECT_TIMEOUT_SECS`: default 10
    /// - `TRIALDESK_POLL_INTERVAL_MS`: default 5000
    /// - `TRIALDESK_TOKEN_DIR`: default `$HOME/.trialdesk`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyBaseUrl`] if the base URL is set but blank.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_base_url = match std::env::var("TRIALDESK_API_URL") {
            Ok(raw) => normalize_base_url(&raw)?,
            Err(_) => DEFAULT_API_BASE_URL.to_owned(),
        };
        let timeouts = HttpTimeouts {
            request_secs: env_parse("TRIALDESK_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_secs: env_parse("TRIALDESK_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
        };
        let poll_interval_ms = env_parse("TRIALDESK_POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL_MS);
        let token_dir = std::env::var_os("TRIALDESK_TOKEN_DIR").map_or_else(default_token_dir, PathBuf::from);

        Ok(Self { api_base_url, timeouts, poll_interval_ms, token_dir })
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// The base URL, if an HTTP client outside a browser can reach it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::RelativeBaseUrl`] for the browser-style
    /// default `/api/v1` or any other URL without an http(s) origin.
    pub fn absolute_base_url(&self) -> Result<&str, ConfigError> {
        match reqwest::Url::parse(&self.api_base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => Ok(&self.api_base_url),
            _ => Err(ConfigError::RelativeBaseUrl(self.api_base_url.clone())),
        }
    }
}

/// Trim whitespace and trailing slashes from a base URL.
///
/// # Errors
///
/// Returns [`ConfigError::EmptyBaseUrl`] when nothing remains.
pub fn normalize_base_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(ConfigError::EmptyBaseUrl);
    }
    Ok(trimmed.to_owned())
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

fn default_token_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map_or_else(|| PathBuf::from("."), PathBuf::from)
        .join(DEFAULT_TOKEN_DIR_NAME)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
