//! Authentication types for the domain layer.
//!
//! An `AuthenticatedUser` is produced by the `SessionValidator` port from a
//! bearer token. Lifecycle handlers only need to know *who* acted and *from
//! where*, which is what `Actor` carries into the audit trail.

use super::UserId;
use thiserror::Error;

/// Authenticated user extracted from a validated JWT.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    /// The unique user identifier (`sub` claim).
    pub id: UserId,

    /// Display name if the token carries one (`name` or `preferred_username`).
    pub display_name: Option<String>,
}

impl AuthenticatedUser {
    pub fn new(id: UserId, display_name: Option<String>) -> Self {
        Self { id, display_name }
    }

    /// Returns the display name, or the subject as fallback.
    pub fn display_name_or_id(&self) -> &str {
        self.display_name.as_deref().unwrap_or(self.id.as_str())
    }
}

/// The party performing a lifecycle operation, as recorded in the audit trail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    /// Human-readable name written to `durchgefuehrt_von`.
    pub name: String,
    /// Client address written to `ip_adresse`.
    pub ip: Option<String>,
}

impl Actor {
    pub fn new(name: impl Into<String>, ip: Option<String>) -> Self {
        Self {
            name: name.into(),
            ip,
        }
    }

    /// Actor for unauthenticated self-service requests.
    pub fn public(ip: Option<String>) -> Self {
        Self::new("Selbstanmeldung", ip)
    }

    /// Actor for an authenticated administrator.
    pub fn from_user(user: &AuthenticatedUser, ip: Option<String>) -> Self {
        Self::new(user.display_name_or_id(), ip)
    }

    /// Actor for internal calls without a request context.
    pub fn system() -> Self {
        Self::new("System", None)
    }
}

/// Authentication errors that can occur during token validation.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// The token is missing, malformed, or has an invalid signature.
    #[error("Invalid or expired token")]
    InvalidToken,

    /// The token has expired.
    #[error("Token expired")]
    TokenExpired,

    /// The authentication backend is misconfigured or unreachable.
    #[error("Auth service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl AuthError {
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable(message.into())
    }

    /// Returns true if this error indicates the user should re-authenticate.
    pub fn requires_reauthentication(&self) -> bool {
        matches!(self, AuthError::InvalidToken | AuthError::TokenExpired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_falls_back_to_subject() {
        let user = AuthenticatedUser::new(UserId::new("admin-7").unwrap(), None);
        assert_eq!(user.display_name_or_id(), "admin-7");

        let named = AuthenticatedUser::new(
            UserId::new("admin-7").unwrap(),
            Some("Kim Sato".to_string()),
        );
        assert_eq!(named.display_name_or_id(), "Kim Sato");
    }

    #[test]
    fn actor_from_user_keeps_ip() {
        let user = AuthenticatedUser::new(UserId::new("u1").unwrap(), Some("Admin".into()));
        let actor = Actor::from_user(&user, Some("10.0.0.1".into()));
        assert_eq!(actor.name, "Admin");
        assert_eq!(actor.ip.as_deref(), Some("10.0.0.1"));
    }

    #[test]
    fn expired_token_requires_reauthentication() {
        assert!(AuthError::TokenExpired.requires_reauthentication());
        assert!(!AuthError::service_unavailable("down").requires_reauthentication());
    }
}
