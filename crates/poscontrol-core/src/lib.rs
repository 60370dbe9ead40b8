//! Core library for the poscontrol point-of-sale administration client.
//!
//! Two collaborating services live here:
//!
//! - [`auth::SessionStore`]: who is logged in, persisted through a
//!   pluggable [`auth::StoragePort`].
//! - [`api::ApiGateway`]: typed access to the backend REST API. Every call
//!   resolves to an [`api::ApiEnvelope`]; nothing fails across the boundary.
//!
//! Both are plain values built by the application entry point and handed to
//! whatever renders the screens. There is no module-level instance.

pub mod api;
pub mod auth;
pub mod config;
pub mod models;

pub use api::{ApiEnvelope, ApiGateway, GatewayError};
pub use auth::{CurrentUser, Session, SessionStore};
pub use config::Config;
pub use models::Role;
