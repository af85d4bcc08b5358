//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `auth` - Session validation (HS256 JWT, mock)
//! - `http` - Axum REST API
//! - `memory` - In-memory store for tests and local runs
//! - `postgres` - PostgreSQL store, reader, settings and dojo statistics

pub mod auth;
pub mod http;
pub mod memory;
pub mod postgres;
