//! API Client Adapter: one outbound client with a mutable default bearer header.
//!
//! SYSTEM CONTEXT
//! ==============
//! Every resource call in [`super::api`] funnels through [`ApiClient::request`].
//! The session manager is the only writer of the default header; views and
//! pollers hold clones and only read it.
//!
//! DESIGN
//! ======
//! Clones share the header slot, so a token set after login is visible to a
//! poller that cloned the client before login completed.

#[cfg(test)]
#[path = "client_test.rs"]
mod client_test;

use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::error::ApiError;
use super::transport::{HttpRequest, HttpTransport, Method, ReqwestTransport};
use crate::config::ClientConfig;

/// Whether a request carries the default `Authorization` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Auth {
    Default,
    Anonymous,
}

#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn HttpTransport>,
    base_url: Arc<str>,
    auth_token: Arc<RwLock<Option<String>>>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("has_auth_token", &self.has_auth_token())
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    #[must_use]
    pub fn new(transport: Arc<dyn HttpTransport>, base_url: impl AsRef<str>) -> Self {
        let base_url = base_url.as_ref().trim_end_matches('/');
        Self { transport, base_url: Arc::from(base_url), auth_token: Arc::new(RwLock::new(None)) }
    }

    /// Build a client backed by `reqwest` from typed config.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidRequest`] if the base URL is not absolute
    /// or the HTTP client fails to build.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ApiError> {
        let base_url = config.absolute_base_url().map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
        let transport = ReqwestTransport::new(config.timeouts)?;
        Ok(Self::new(Arc::new(transport), base_url))
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Set or remove the default bearer credential for all later requests.
    pub fn set_auth_token(&self, token: Option<&str>) {
        let mut slot = self.auth_token.write().unwrap_or_else(PoisonError::into_inner);
        *slot = token.map(str::to_owned);
    }

    #[must_use]
    pub fn has_auth_token(&self) -> bool {
        self.auth_token.read().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    fn current_token(&self) -> Option<String> {
        self.auth_token.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Resolve `path` against the base URL.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}/{path}", self.base_url)
        }
    }

    /// Send a request with the default header and return the decoded JSON body.
    ///
    /// An empty 2xx body decodes to [`Value::Null`].
    ///
    /// # Errors
    ///
    /// [`ApiError::Network`] if no response arrived, [`ApiError::Api`] for a
    /// non-2xx status, [`ApiError::Decode`] if a 2xx body is not JSON.
    pub async fn request(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value, ApiError> {
        self.send(method, path, Vec::new(), body, Auth::Default).await
    }

    pub(crate) async fn send(
        &self,
        method: Method,
        path: &str,
        query: Vec<(String, String)>,
        body: Option<Value>,
        auth: Auth,
    ) -> Result<Value, ApiError> {
        let bearer = match auth {
            Auth::Default => self.current_token(),
            Auth::Anonymous => None,
        };
        let request = HttpRequest { method, url: self.url(path), query, bearer, body };
        tracing::debug!(%method, url = %request.url, "api request");

        let response = self.transport.send(request).await?;
        if !response.is_success() {
            let err = ApiError::from_status(response.status, &response.body);
            tracing::debug!(%method, path, status = response.status, error = %err, "api request rejected");
            return Err(err);
        }
        if response.body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&response.body).map_err(|e| ApiError::Decode(e.to_string()))
    }

    pub(crate) async fn get_value(&self, path: &str, query: Vec<(String, String)>) -> Result<Value, ApiError> {
        self.send(Method::Get, path, query, None, Auth::Default).await
    }

    pub(crate) async fn write_value<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: &B,
        auth: Auth,
    ) -> Result<Value, ApiError> {
        let body = serde_json::to_value(body).map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
        self.send(method, path, Vec::new(), Some(body), auth).await
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        decode(self.get_value(path, Vec::new()).await?)
    }

    pub(crate) async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        decode(self.write_value(Method::Post, path, body, Auth::Default).await?)
    }
}

pub(crate) fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ApiError> {
    serde_json::from_value(value).map_err(|e| ApiError::Decode(e.to_string()))
}
