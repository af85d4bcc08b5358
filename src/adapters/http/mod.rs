//! HTTP adapters - REST API implementations.
//!
//! - `error` - Error envelope and body/query extractors
//! - `middleware` - Authentication and client address
//! - `verband` - Membership endpoints

pub mod error;
pub mod middleware;
pub mod verband;

// Re-export key types for convenience
pub use error::{set_verbose_errors, ApiError, ApiJson, ApiQuery, ErrorResponse};
pub use middleware::TrustedProxy;
pub use verband::{verband_router, VerbandAppState, API_PREFIX};
