//! Authentication adapters.
//!
//! Implementations of the `SessionValidator` port:
//!
//! - `jwt` - HS256 tokens issued by the dojo platform
//! - `mock` - fixed tokens for tests and local runs

mod jwt;
mod mock;

pub use jwt::{AdminClaims, JwtConfig, JwtSessionValidator};
pub use mock::MockSessionValidator;
