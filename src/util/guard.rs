//! Route Guard for protected views.
//!
//! SYSTEM CONTEXT
//! ==============
//! Every protected view applies identical redirect behaviour: hold while the
//! session is loading, send anonymous users to the login entry point, and send
//! users lacking a required role to the landing view.
//!
//! DESIGN
//! ======
//! [`decide`] is a pure function of the session snapshot. [`RouteGuard`] adds
//! navigation on top and remembers its last redirect, so re-evaluating an
//! unchanged session never navigates twice.

#[cfg(test)]
#[path = "guard_test.rs"]
mod guard_test;

use std::collections::BTreeSet;

use tracing::warn;

use crate::state::session::{Session, UserProfile};

pub const LOGIN_ROUTE: &str = "/login";
pub const LANDING_ROUTE: &str = "/";

/// Static access rule for one protected view.
///
/// An empty role set admits any authenticated user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GuardBinding {
    allowed_roles: BTreeSet<String>,
}

impl GuardBinding {
    #[must_use]
    pub fn any_authenticated() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn roles<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { allowed_roles: roles.into_iter().map(Into::into).collect() }
    }

    #[must_use]
    pub fn allowed_roles(&self) -> &BTreeSet<String> {
        &self.allowed_roles
    }

    #[must_use]
    pub fn permits(&self, user: &UserProfile) -> bool {
        self.allowed_roles.is_empty() || user.has_any_role(&self.allowed_roles)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    /// Session still resolving; show a neutral placeholder.
    Pending,
    Render,
    RedirectToLogin,
    RedirectToLanding,
}

/// Pure guard decision for `session` under `binding`.
#[must_use]
pub fn decide(session: &Session, binding: &GuardBinding) -> GuardDecision {
    if session.is_loading() {
        return GuardDecision::Pending;
    }
    match session.user() {
        None => GuardDecision::RedirectToLogin,
        Some(user) if binding.permits(user) => GuardDecision::Render,
        Some(_) => GuardDecision::RedirectToLanding,
    }
}

/// Navigation side of the rendering framework.
pub trait Navigator {
    fn current_path(&self) -> String;

    /// Replace the current location without adding a history entry.
    fn replace(&self, path: &str);
}

/// What the guarded view should show after an evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardView {
    Pending,
    Render,
    /// A redirect was issued (or is already in effect); render nothing.
    Nothing,
}

pub struct RouteGuard<N> {
    binding: GuardBinding,
    navigator: N,
    login_route: String,
    landing_route: String,
    last_redirect: Option<String>,
}

impl<N: Navigator> RouteGuard<N> {
    #[must_use]
    pub fn new(binding: GuardBinding, navigator: N) -> Self {
        Self {
            binding,
            navigator,
            login_route: LOGIN_ROUTE.to_owned(),
            landing_route: LANDING_ROUTE.to_owned(),
            last_redirect: None,
        }
    }

    #[must_use]
    pub fn with_routes(mut self, login: impl Into<String>, landing: impl Into<String>) -> Self {
        self.login_route = login.into();
        self.landing_route = landing.into();
        self
    }

    #[must_use]
    pub fn binding(&self) -> &GuardBinding {
        &self.binding
    }

    #[must_use]
    pub fn navigator(&self) -> &N {
        &self.navigator
    }

    /// Decide, navigate at most once per distinct redirect, and report the view.
    pub fn evaluate(&mut self, session: &Session) -> GuardView {
        match decide(session, &self.binding) {
            GuardDecision::Pending => GuardView::Pending,
            GuardDecision::Render => {
                self.last_redirect = None;
                GuardView::Render
            }
            GuardDecision::RedirectToLogin => {
                let target = self.login_route.clone();
                self.redirect_once(target);
                GuardView::Nothing
            }
            GuardDecision::RedirectToLanding => {
                let target = self.landing_route.clone();
                if self.last_redirect.as_deref() != Some(target.as_str()) {
                    if let Some(user) = session.user() {
                        warn!(
                            user = %user.username,
                            required = ?self.binding.allowed_roles,
                            roles = ?user.roles,
                            "user lacks a required role; redirecting"
                        );
                    }
                }
                self.redirect_once(target);
                GuardView::Nothing
            }
        }
    }

    fn redirect_once(&mut self, target: String) {
        let already_sent = self.last_redirect.as_deref() == Some(target.as_str());
        if !already_sent && self.navigator.current_path() != target {
            self.navigator.replace(&target);
        }
        self.last_redirect = Some(target);
    }
}
