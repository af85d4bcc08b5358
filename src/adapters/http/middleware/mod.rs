//! HTTP middleware for axum.
//!
//! This module contains middleware layers and extractors for cross-cutting concerns:
//!
//! - `auth` - Bearer token validation and the `RequireAuth` extractor
//! - `client_ip` - Client address for the audit trail

pub mod auth;
pub mod client_ip;

pub use auth::{auth_middleware, AuthRejection, AuthState, RequireAuth};
pub use client_ip::{client_ip, ClientIp, TrustedProxy};
