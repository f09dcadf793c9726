//! # trialdesk
//!
//! Client-side core for the clinical-trial administration console: bearer
//! token persistence, the REST API adapter, the session lifecycle, route
//! guarding, and polling for long-running backend tasks.
//!
//! The crate is framework-agnostic. A view layer (the `trialctl` console, or
//! a browser UI) owns one [`state::session_manager::SessionManager`], reads
//! snapshots from it, and asks a [`util::guard::RouteGuard`] whether a
//! protected view may render.

pub mod config;
pub mod net;
pub mod state;
pub mod util;

pub use config::ClientConfig;
pub use net::client::ApiClient;
pub use net::error::ApiError;
pub use state::session::{Session, UserProfile};
pub use state::session_manager::{SessionError, SessionManager};
pub use state::token_store::{FileTokenStore, MemoryTokenStore, StoreError, TokenStore};
pub use util::guard::{GuardBinding, GuardView, Navigator, RouteGuard};
pub use util::poll::{PollHandle, PollState, TaskPoller};
