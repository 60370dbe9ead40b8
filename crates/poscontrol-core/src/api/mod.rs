//! REST API client module for the point-of-sale backend.
//!
//! This module provides the `ApiGateway` for signin/signup, user, station
//! and store administration, and login history. Every call resolves to an
//! `ApiEnvelope`; transport, HTTP and decoding failures are data, not errors.
//!
//! The backend occasionally serializes object graphs with back-references,
//! which yields invalid JSON with runs of stray closing brackets. `decode`
//! holds the best-effort textual repair for that defect and `graph` the
//! cycle-safe cleaner applied to every decoded payload.

pub mod client;
pub mod decode;
pub mod envelope;
pub mod error;
pub mod graph;

pub use client::{ApiGateway, HealthStatus};
pub use envelope::ApiEnvelope;
pub use error::GatewayError;
pub use graph::{JsonNode, CIRCULAR_SENTINEL};
