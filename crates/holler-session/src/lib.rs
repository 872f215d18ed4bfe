//! # holler-session
//!
//! The guest session layer: a durable anonymous identity, the short-lived
//! access credential exchanged for it, and the file-backed store both live
//! in. The chat transport is authenticated exclusively with the credential
//! this crate produces.
//!
//! The recovery path for an expired or rejected credential is simply
//! calling [`SessionManager::init_session`] again; no refresh logic exists.

pub mod manager;
pub mod store;

mod error;

pub use error::{SessionError, StoreError};
pub use manager::{ApiEnvelope, SessionManager, SessionSnapshot};
pub use store::SessionStore;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SessionError>;
