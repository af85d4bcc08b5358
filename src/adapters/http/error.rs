//! Error envelope shared by all HTTP handlers.
//!
//! Every failure is rendered as `{"error": <message>, "code": <CODE>}` with
//! optional `details`. The cause of a store error is only included when
//! verbose errors were enabled at startup.
//!
//! # HTTP Status Mapping
//!
//! | MembershipError | HTTP Status |
//! |-----------------|-------------|
//! | NotFound / PaymentNotFound / MandateNotFound / SettingNotFound | 404 |
//! | InvalidState / Conflict | 409 |
//! | ValidationFailed | 400 |
//! | Infrastructure | 500 |

use async_trait::async_trait;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts, Query, Request};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use once_cell::sync::OnceCell;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use crate::domain::foundation::{DomainError, ValidationError};
use crate::domain::membership::MembershipError;

static VERBOSE_ERRORS: OnceCell<bool> = OnceCell::new();

/// Enables store error causes in responses. Only the first call has an effect.
pub fn set_verbose_errors(enabled: bool) {
    if VERBOSE_ERRORS.set(enabled).is_err() {
        tracing::debug!("Verbose error flag already set");
    }
}

fn verbose_errors() -> bool {
    VERBOSE_ERRORS.get().copied().unwrap_or(false)
}

/// JSON body of every error response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorResponse {
    /// Human-readable message.
    pub error: String,
    /// Stable code for programmatic handling.
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Wraps application errors for the HTTP layer.
#[derive(Debug)]
pub struct ApiError(pub MembershipError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            MembershipError::NotFound(_)
            | MembershipError::PaymentNotFound(_)
            | MembershipError::MandateNotFound(_)
            | MembershipError::SettingNotFound(_) => StatusCode::NOT_FOUND,
            MembershipError::InvalidState { .. } | MembershipError::Conflict(_) => {
                StatusCode::CONFLICT
            }
            MembershipError::ValidationFailed { .. } => StatusCode::BAD_REQUEST,
            MembershipError::Infrastructure { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn body(&self) -> ErrorResponse {
        let body = ErrorResponse::new(self.0.code().to_string(), self.0.message());
        match &self.0 {
            MembershipError::ValidationFailed { field, .. } => {
                body.with_details(json!({ "field": field }))
            }
            MembershipError::InvalidState { current, .. } => {
                body.with_details(json!({ "current": current }))
            }
            MembershipError::Infrastructure {
                cause: Some(cause), ..
            } if verbose_errors() => body.with_details(json!({ "cause": cause })),
            _ => body,
        }
    }
}

impl From<MembershipError> for ApiError {
    fn from(err: MembershipError) -> Self {
        Self(err)
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self(err.into())
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(
                code = %self.0.code(),
                error = %self.0,
                cause = ?self.0.cause(),
                "Request failed"
            );
        }
        (status, Json(self.body())).into_response()
    }
}

/// `Json` extractor whose rejections use the error envelope.
///
/// Malformed bodies and unknown fields become `400 VALIDATION_FAILED` with
/// `details.field = "body"`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(json_rejection(rejection)),
        }
    }
}

fn json_rejection(rejection: JsonRejection) -> ApiError {
    ApiError(MembershipError::validation("body", rejection.body_text()))
}

/// `Query` extractor whose rejections use the error envelope.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiQuery<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(Self(value)),
            Err(rejection) => Err(query_rejection(rejection)),
        }
    }
}

fn query_rejection(rejection: QueryRejection) -> ApiError {
    ApiError(MembershipError::validation("query", rejection.body_text()))
}

/// Parses an optional JSON body; an empty body yields the default.
pub fn optional_body<T>(bytes: &[u8]) -> Result<T, ApiError>
where
    T: DeserializeOwned + Default,
{
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(bytes)
        .map_err(|e| ApiError(MembershipError::validation("body", e.to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{MembershipId, PaymentId};
    use serde::Deserialize;

    #[test]
    fn maps_errors_to_status_codes() {
        let id = MembershipId::new(1).unwrap();
        let cases = [
            (MembershipError::not_found(id), StatusCode::NOT_FOUND),
            (
                MembershipError::payment_not_found(PaymentId::new(2).unwrap()),
                StatusCode::NOT_FOUND,
            ),
            (MembershipError::setting_not_found("x"), StatusCode::NOT_FOUND),
            (
                MembershipError::invalid_state("gekuendigt", "renew membership"),
                StatusCode::CONFLICT,
            ),
            (MembershipError::conflict("taken"), StatusCode::CONFLICT),
            (MembershipError::validation("email", "bad"), StatusCode::BAD_REQUEST),
            (
                MembershipError::infrastructure("db down"),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError(err).into_response().status(), status);
        }
    }

    #[test]
    fn validation_body_names_the_field() {
        let body = ApiError(MembershipError::validation("iban", "checksum mismatch")).body();
        assert_eq!(body.code, "VALIDATION_FAILED");
        assert_eq!(body.details, Some(json!({ "field": "iban" })));
    }

    #[test]
    fn store_cause_is_hidden_by_default() {
        let err = MembershipError::from(DomainError::database("Failed to insert", "disk full"));
        let body = ApiError(err).body();
        assert_eq!(body.code, "DATABASE_ERROR");
        assert_eq!(body.error, "Failed to insert");
        assert!(body.details.is_none());
    }

    #[test]
    fn envelope_omits_missing_details() {
        let json = serde_json::to_value(ErrorResponse::new("CONFLICT", "taken")).unwrap();
        assert_eq!(json, json!({ "error": "taken", "code": "CONFLICT" }));
    }

    #[derive(Debug, Default, Deserialize, PartialEq)]
    struct Body {
        transaktions_id: Option<String>,
    }

    #[test]
    fn optional_body_accepts_empty_input() {
        assert_eq!(optional_body::<Body>(b"").unwrap(), Body::default());
        assert_eq!(optional_body::<Body>(b"  \n").unwrap(), Body::default());
        assert_eq!(
            optional_body::<Body>(br#"{"transaktions_id":"tx-1"}"#)
                .unwrap()
                .transaktions_id
                .as_deref(),
            Some("tx-1")
        );
        assert!(optional_body::<Body>(b"{nope").is_err());
    }
}
