//! View-side helpers layered on the session.
//!
//! SYSTEM CONTEXT
//! ==============
//! `guard` decides whether a protected view may render, and `poll` tracks
//! long-running backend tasks for views that started them.

pub mod guard;
pub mod poll;
