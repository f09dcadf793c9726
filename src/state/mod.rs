//! Client-side session state.
//!
//! DESIGN
//! ======
//! `token_store` persists the bearer credential, `session` is the read-only
//! snapshot views consume, and `session_manager` is the single writer of
//! both.

pub mod session;
pub mod session_manager;
pub mod token_store;
