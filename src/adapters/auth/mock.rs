//! Mock session validator for tests and local runs.
//!
//! # Example
//!
//! ```ignore
//! let validator = MockSessionValidator::new().with_test_user("admin-token", "Kim Admin");
//! let user = validator.validate("admin-token").await?;
//! ```

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::domain::foundation::{AuthError, AuthenticatedUser, UserId};
use crate::ports::SessionValidator;

/// Maps fixed tokens to users. Unknown tokens return `InvalidToken`.
#[derive(Debug, Default)]
pub struct MockSessionValidator {
    tokens: Mutex<HashMap<String, AuthenticatedUser>>,
    force_error: Mutex<Option<AuthError>>,
}

impl MockSessionValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a valid token that maps to a user.
    pub fn with_user(self, token: impl Into<String>, user: AuthenticatedUser) -> Self {
        self.add_token(token, user);
        self
    }

    /// Adds a valid token for a user whose id is derived from the name.
    pub fn with_test_user(self, token: impl Into<String>, display_name: impl Into<String>) -> Self {
        let display_name = display_name.into();
        let id = display_name.to_lowercase().replace(' ', "-");
        match UserId::new(id) {
            Ok(id) => self.with_user(token, AuthenticatedUser::new(id, Some(display_name))),
            Err(_) => self,
        }
    }

    /// Forces all validations to return the specified error.
    pub fn with_error(self, error: AuthError) -> Self {
        *lock(&self.force_error) = Some(error);
        self
    }

    pub fn add_token(&self, token: impl Into<String>, user: AuthenticatedUser) {
        lock(&self.tokens).insert(token.into(), user);
    }

    pub fn remove_token(&self, token: &str) {
        lock(&self.tokens).remove(token);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl SessionValidator for MockSessionValidator {
    async fn validate(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        if let Some(error) = lock(&self.force_error).clone() {
            return Err(error);
        }
        lock(&self.tokens)
            .get(token)
            .cloned()
            .ok_or(AuthError::InvalidToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn known_token_resolves_to_user() {
        let validator = MockSessionValidator::new().with_test_user("t1", "Kim Admin");
        let user = validator.validate("t1").await.unwrap();
        assert_eq!(user.id.as_str(), "kim-admin");
        assert_eq!(user.display_name_or_id(), "Kim Admin");
    }

    #[tokio::test]
    async fn unknown_and_removed_tokens_are_invalid() {
        let validator = MockSessionValidator::new().with_test_user("t1", "Kim Admin");
        assert!(matches!(validator.validate("t2").await, Err(AuthError::InvalidToken)));

        validator.remove_token("t1");
        assert!(matches!(validator.validate("t1").await, Err(AuthError::InvalidToken)));
    }

    #[tokio::test]
    async fn forced_error_wins() {
        let validator = MockSessionValidator::new()
            .with_test_user("t1", "Kim Admin")
            .with_error(AuthError::service_unavailable("down"));
        assert!(matches!(
            validator.validate("t1").await,
            Err(AuthError::ServiceUnavailable(_))
        ));
    }
}
