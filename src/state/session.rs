//! Auth-session snapshot for the current user.
//!
//! SYSTEM CONTEXT
//! ==============
//! Route guards and user-aware views read this; only
//! [`SessionManager`](super::session_manager::SessionManager) builds new
//! values. Fields are private so "authenticated without a user" cannot be
//! represented.

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

pub use crate::net::types::UserProfile;

/// Coarse lifecycle phase derived from a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// A restore, login, or logout round-trip is in flight.
    Loading,
    Authenticated,
    Unauthenticated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    user: Option<UserProfile>,
    loading: bool,
    last_error: Option<String>,
}

impl Default for Session {
    /// The startup state: unknown, loading.
    fn default() -> Self {
        Self { user: None, loading: true, last_error: None }
    }
}

impl Session {
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    #[must_use]
    pub fn user(&self) -> Option<&UserProfile> {
        self.user.as_ref()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        match (self.loading, self.is_authenticated()) {
            (true, _) => SessionPhase::Loading,
            (false, true) => SessionPhase::Authenticated,
            (false, false) => SessionPhase::Unauthenticated,
        }
    }

    pub(crate) fn begin_loading(&mut self) {
        self.loading = true;
    }

    pub(crate) fn authenticate(&mut self, user: UserProfile) {
        self.user = Some(user);
        self.loading = false;
        self.last_error = None;
    }

    /// Drop the user and settle. `last_error` is left as is.
    pub(crate) fn reset(&mut self) {
        self.user = None;
        self.loading = false;
    }

    pub(crate) fn set_error(&mut self, message: Option<String>) {
        self.last_error = message;
    }
}
