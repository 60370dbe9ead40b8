//! Authentication module for managing the logged-in session.
//!
//! This module provides:
//! - `SessionStore`: single source of truth for who is logged in
//! - `StoragePort`: the string key-value seam the session persists through,
//!   with in-memory, file-backed and OS keychain implementations
//! - `token`: local, unverified reading of the bearer token's expiry claim
//!
//! Expiry is judged from the token's own `exp` claim. The signature is never
//! checked here; the server verifies the token on every request.

pub mod credentials;
pub mod session;
pub mod storage;
pub mod token;

pub use credentials::KeyringStorage;
pub use session::{CurrentUser, Session, SessionError, SessionStore, SessionUpdate};
pub use storage::{FileStorage, MemoryStorage, StorageError, StoragePort};
