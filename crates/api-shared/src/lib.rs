//! # API Shared
//!
//! Shared utilities and definitions for CPM APIs.
//!
//! Contains:
//! - Request/response DTOs (`dto` module) with OpenAPI schemas
//! - Shared services like `HealthService`
//! - Authentication utilities
//!
//! Timestamps cross the wire as RFC 3339 strings; identifiers as canonical
//! 32-hex strings; enumerated fields (status, role, decision) as lowercase
//! strings that the REST layer parses into the core's closed types, rejecting
//! unrecognised values at the boundary.

pub mod auth;
pub mod dto;
pub mod health;

pub use dto::*;
pub use health::HealthService;
