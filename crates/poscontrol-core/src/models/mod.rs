//! Data models for the point-of-sale backend.
//!
//! This module contains the wire and domain types exchanged with the API:
//!
//! - `RawAuthPayload`: the loose signin/signup response, normalized by the
//!   session store
//! - `Role`: user roles, including legacy aliases
//! - `UserRecord`, `LoginHistoryEntry`: user administration
//! - `StationRef`, `StoreRecord`: station and store CRUD payloads
//! - `EntityId`: identifiers that arrive as either numbers or strings

pub mod auth;
pub mod id;
pub mod role;
pub mod station;
pub mod store;
pub mod user;

pub use auth::{RawAuthPayload, ResetPasswordRequest, SigninRequest, SignupRequest};
pub use id::EntityId;
pub use role::Role;
pub use station::{StationRef, StationRequest};
pub use store::{StoreRecord, StoreRequest};
pub use user::{CreateUserRequest, LoginHistoryEntry, ProfileUpdate, UpdateUserRequest, UserRecord};
