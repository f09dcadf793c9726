use super::*;

use std::sync::{Mutex, MutexGuard, PoisonError};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn lock_env() -> MutexGuard<'static, ()> {
    ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner)
}

/// # Safety
/// Callers must hold [`lock_env`] so no other test mutates the environment.
unsafe fn clear_client_env() {
    unsafe {
        std::env::remove_var("TRIALDESK_API_URL");
        std::env::remove_var("TRIALDESK_REQUEST_TIMEOUT_SECS");
        std::env::remove_var("TRIALDESK_CONNECT_TIMEOUT_SECS");
        std::env::remove_var("TRIALDESK_POLL_INTERVAL_MS");
        std::env::remove_var("TRIALDESK_TOKEN_DIR");
    }
}

#[test]
fn from_env_defaults_to_relative_base() {
    let _env = lock_env();
    unsafe { clear_client_env() };

    let cfg = ClientConfig::from_env().unwrap();
    assert_eq!(cfg.api_base_url, DEFAULT_API_BASE_URL);
    assert_eq!(cfg.timeouts, HttpTimeouts::default());
    assert_eq!(cfg.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
    assert!(cfg.token_dir.ends_with(DEFAULT_TOKEN_DIR_NAME));
}

#[test]
fn from_env_parses_overrides() {
    let _env = lock_env();
    unsafe {
        clear_client_env();
        std::env::set_var("TRIALDESK_API_URL", "https://ctms.example.test/api/v1/");
        std::env::set_var("TRIALDESK_REQUEST_TIMEOUT_SECS", "42");
        std::env::set_var("TRIALDESK_CONNECT_TIMEOUT_SECS", "7");
        std::env::set_var("TRIALDESK_POLL_INTERVAL_MS", "250");
        std::env::set_var("TRIALDESK_TOKEN_DIR", "/tmp/trialdesk-tokens");
    }

    let cfg = ClientConfig::from_env().unwrap();
    assert_eq!(cfg.api_base_url, "https://ctms.example.test/api/v1");
    assert_eq!(cfg.timeouts, HttpTimeouts { request_secs: 42, connect_secs: 7 });
    assert_eq!(cfg.poll_interval(), Duration::from_millis(250));
    assert_eq!(cfg.token_dir, PathBuf::from("/tmp/trialdesk-tokens"));

    unsafe { clear_client_env() };
}

#[test]
fn from_env_invalid_numbers_fall_back_to_defaults() {
    let _env = lock_env();
    unsafe {
        clear_client_env();
        std::env::set_var("TRIALDESK_REQUEST_TIMEOUT_SECS", "soon");
        std::env::set_var("TRIALDESK_POLL_INTERVAL_MS", "-1");
    }

    let cfg = ClientConfig::from_env().unwrap();
    assert_eq!(cfg.timeouts.request_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
    assert_eq!(cfg.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);

    unsafe { clear_client_env() };
}

#[test]
fn from_env_blank_base_url_errors() {
    let _env = lock_env();
    unsafe {
        clear_client_env();
        std::env::set_var("TRIALDESK_API_URL", "  / ");
    }

    assert_eq!(ClientConfig::from_env().unwrap_err(), ConfigError::EmptyBaseUrl);

    unsafe { clear_client_env() };
}

#[test]
fn normalize_base_url_strips_trailing_slashes() {
    assert_eq!(normalize_base_url("http://localhost:4000/api/v1//").unwrap(), "http://localhost:4000/api/v1");
}

#[test]
fn absolute_base_url_rejects_browser_relative_default() {
    let config = ClientConfig::default();
    assert_eq!(config.absolute_base_url(), Err(ConfigError::RelativeBaseUrl("/api/v1".to_owned())));
    assert!(config.absolute_base_url().unwrap_err().to_string().contains("TRIALDESK_API_URL"));
}

#[test]
fn absolute_base_url_accepts_http_origins_only() {
    let mut config = ClientConfig { api_base_url: "https://ctms.example.org/api/v1".to_owned(), ..ClientConfig::default() };
    assert_eq!(config.absolute_base_url(), Ok("https://ctms.example.org/api/v1"));

    config.api_base_url = "ftp://files.example.org".to_owned();
    assert!(config.absolute_base_url().is_err());
}
