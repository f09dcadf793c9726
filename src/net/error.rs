//! API error taxonomy shared by the adapter and its callers.
//!
//! ERROR HANDLING
//! ==============
//! Callers must be able to tell "the backend was unreachable" apart from
//! "the backend said no", so the two never collapse into one variant.

#[cfg(test)]
#[path = "error_test.rs"]
mod error_test;

use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// No connection, DNS failure, or timeout.
    #[error("network error: {0}")]
    Network(String),

    /// The backend answered with a non-2xx status.
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// A 2xx body did not match the expected shape.
    #[error("unexpected response body: {0}")]
    Decode(String),

    /// The request could not be built (bad URL, unserializable body).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    /// Build an [`ApiError::Api`] from a non-2xx status and its raw body.
    ///
    /// The message is taken from the body's `message`, `detail`, or `error`
    /// field, then the raw text, then the canonical reason for `status`.
    #[must_use]
    pub fn from_status(status: u16, body: &str) -> Self {
        Self::Api { status, message: extract_error_message(status, body) }
    }

    /// True for 401/403 rejections, i.e. a missing, bad, or expired credential.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Api { status: 401 | 403, .. })
    }

    #[must_use]
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network(_))
    }

    /// True when the request never left this process, so the backend has
    /// said nothing about the credential.
    #[must_use]
    pub fn is_local(&self) -> bool {
        matches!(self, Self::InvalidRequest(_))
    }

    /// Text suitable for showing next to a form.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Network(_) => "Unable to reach the server. Please check your connection.".to_owned(),
            Self::Api { message, .. } => message.clone(),
            Self::Decode(_) | Self::InvalidRequest(_) => self.to_string(),
        }
    }
}

fn extract_error_message(status: u16, body: &str) -> String {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
        for key in ["message", "detail", "error"] {
            match map.get(key) {
                Some(Value::String(text)) if !text.trim().is_empty() => return text.clone(),
                // FastAPI-style validation errors carry a list under `detail`.
                Some(Value::Array(items)) if !items.is_empty() => {
                    let joined = items
                        .iter()
                        .filter_map(|item| item.get("msg").and_then(Value::as_str))
                        .collect::<Vec<_>>()
                        .join("; ");
                    if !joined.is_empty() {
                        return joined;
                    }
                }
                _ => {}
            }
        }
    }
    let trimmed = body.trim();
    if !trimmed.is_empty() && !trimmed.starts_with('{') {
        return trimmed.to_owned();
    }
    reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason())
        .map_or_else(|| format!("request failed with status {status}"), str::to_owned)
}
