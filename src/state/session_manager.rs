//! Session Manager: login, logout, and silent restore of the auth session.
//!
//! SYSTEM CONTEXT
//! ==============
//! The manager is the single writer of the [`Session`] snapshot, the
//! [`TokenStore`], and the [`ApiClient`] default header. Views subscribe to
//! snapshots and never mutate them.
//!
//! DESIGN
//! ======
//! Operations take `&mut self`, so one owner cannot interleave a login with
//! a logout. Every operation flips `loading` on first and always settles it,
//! which is what lets the route guard hold off until a decision is safe.
//!
//! ERROR HANDLING
//! ==============
//! Restore and refresh recover locally: any failure drops the credential and
//! leaves the session unauthenticated. Login failures also drop the
//! credential, but are recorded in `last_error` and returned to the caller.
//! Logout never fails locally.

#[cfg(test)]
#[path = "session_manager_test.rs"]
mod session_manager_test;

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use super::session::{Session, UserProfile};
use super::token_store::{StoreError, TokenStore};
use crate::net::client::ApiClient;
use crate::net::error::ApiError;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The backend rejected the request or could not be reached.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Login succeeded at the HTTP level but carried no credential.
    #[error("login failed: no token received")]
    Auth,

    /// The credential was accepted but the profile could not be loaded.
    #[error("authenticated but profile unavailable: {0}")]
    ProfileUnavailable(#[source] ApiError),

    /// No credential is held, so there is nothing to refresh.
    #[error("not authenticated")]
    NotAuthenticated,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SessionError {
    /// Text suitable for display next to the login form.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Api(err) => err.user_message(),
            Self::Auth => "Login failed. Please check your credentials.".to_owned(),
            Self::ProfileUnavailable(_) => "Login successful, but failed to load user profile.".to_owned(),
            Self::NotAuthenticated => "You are not logged in.".to_owned(),
            Self::Store(err) => format!("Unable to store the session credential: {err}"),
        }
    }
}

pub struct SessionManager {
    api: ApiClient,
    store: Arc<dyn TokenStore>,
    state: watch::Sender<Session>,
}

impl SessionManager {
    /// Create a manager in the startup `loading` state.
    ///
    /// Call [`restore_from_storage`](Self::restore_from_storage) once before
    /// any guard decision is needed.
    #[must_use]
    pub fn new(api: ApiClient, store: Arc<dyn TokenStore>) -> Self {
        let (state, _) = watch::channel(Session::default());
        Self { api, store, state }
    }

    /// The shared adapter. Clones see header changes made here.
    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Current snapshot.
    #[must_use]
    pub fn session(&self) -> Session {
        self.state.borrow().clone()
    }

    /// Receive every subsequent snapshot change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    /// Rebuild the session from a persisted credential, if any.
    ///
    /// Always ends with `loading == false`.
    pub async fn restore_from_storage(&mut self) {
        self.state.send_modify(Session::begin_loading);

        let token = match self.store.load() {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "token store unreadable; treating session as anonymous");
                None
            }
        };
        let Some(token) = token else {
            self.api.set_auth_token(None);
            self.state.send_modify(Session::reset);
            return;
        };

        self.api.set_auth_token(Some(&token));
        match self.api.fetch_profile().await {
            Ok(profile) => {
                info!(user = %profile.username, "session restored from stored credential");
                self.state.send_modify(|s| s.authenticate(profile));
            }
            Err(e) if e.is_local() => {
                warn!(error = %e, "profile request could not be sent; keeping stored credential");
                self.api.set_auth_token(None);
                self.state.send_modify(Session::reset);
            }
            Err(e) => {
                warn!(error = %e, "stored credential rejected; clearing session");
                self.discard_credential();
                self.state.send_modify(Session::reset);
            }
        }
    }

    /// Exchange credentials for a bearer token, persist it, and load the profile.
    ///
    /// # Errors
    ///
    /// - [`SessionError::Api`] if the backend rejects the login or is unreachable.
    /// - [`SessionError::Auth`] if the response carries no credential.
    /// - [`SessionError::ProfileUnavailable`] if the profile fetch fails afterwards.
    /// - [`SessionError::Store`] if the credential cannot be persisted.
    ///
    /// On every error the credential is dropped, the session is
    /// unauthenticated, and `last_error` holds the display text.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<UserProfile, SessionError> {
        self.state.send_modify(|s| {
            s.begin_loading();
            s.set_error(None);
        });

        match self.try_login(username, password).await {
            Ok(profile) => {
                info!(user = %profile.username, roles = ?profile.roles, "login succeeded");
                self.state.send_modify(|s| s.authenticate(profile.clone()));
                Ok(profile)
            }
            Err(err) => {
                warn!(error = %err, username, "login failed");
                self.discard_credential();
                let message = err.user_message();
                self.state.send_modify(|s| {
                    s.reset();
                    s.set_error(Some(message));
                });
                Err(err)
            }
        }
    }

    async fn try_login(&self, username: &str, password: &str) -> Result<UserProfile, SessionError> {
        let response = self.api.login(username, password).await?;
        let token = response.credential().ok_or(SessionError::Auth)?;
        self.store.save(token)?;
        self.api.set_auth_token(Some(token));
        self.api.fetch_profile().await.map_err(SessionError::ProfileUnavailable)
    }

    /// End the session. The backend call is best-effort; local state always clears.
    pub async fn logout(&mut self) {
        self.state.send_modify(Session::begin_loading);

        if self.api.has_auth_token() {
            if let Err(e) = self.api.logout().await {
                warn!(error = %e, "logout request failed; clearing local session anyway");
            }
        }

        self.discard_credential();
        self.state.send_modify(|s| {
            s.reset();
            s.set_error(None);
        });
        info!("logged out");
    }

    /// Re-fetch the profile for the held credential.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotAuthenticated`] when no credential is held, or
    /// [`SessionError::ProfileUnavailable`] when the fetch fails. A backend
    /// failure also ends the session; a request that never left the process
    /// leaves it as it was.
    pub async fn refresh_profile(&mut self) -> Result<UserProfile, SessionError> {
        if !self.api.has_auth_token() {
            return Err(SessionError::NotAuthenticated);
        }
        let previous = self.state.borrow().user().cloned();
        self.state.send_modify(Session::begin_loading);

        match self.api.fetch_profile().await {
            Ok(profile) => {
                self.state.send_modify(|s| s.authenticate(profile.clone()));
                Ok(profile)
            }
            Err(e) if e.is_local() => {
                warn!(error = %e, "profile request could not be sent; session unchanged");
                self.state.send_modify(|s| match previous {
                    Some(user) => s.authenticate(user),
                    None => s.reset(),
                });
                Err(SessionError::ProfileUnavailable(e))
            }
            Err(e) => {
                warn!(error = %e, "profile refresh failed; ending session");
                self.discard_credential();
                self.state.send_modify(Session::reset);
                Err(SessionError::ProfileUnavailable(e))
            }
        }
    }

    /// Forget the last recorded error. The user and auth flag are untouched.
    pub fn clear_error(&mut self) {
        self.state.send_modify(|s| s.set_error(None));
    }

    fn discard_credential(&self) {
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "failed to clear stored credential");
        }
        self.api.set_auth_token(None);
    }
}
