//! Networking modules for the REST backend.
//!
//! SYSTEM CONTEXT
//! ==============
//! `transport` moves bytes, `client` owns the base URL and default bearer
//! header, `api` maps each backend endpoint to a typed method, and `types`
//! defines the normalized wire schema.

pub mod api;
pub mod client;
pub mod error;
pub mod transport;
pub mod types;

#[cfg(test)]
pub(crate) mod mock_transport;
