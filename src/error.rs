//! # Error Handling
//!
//! Two layers of errors live here:
//! - [`VerificationError`]: why a submitted second factor was not accepted.
//!   Library callers match on it; it knows the user-facing message and which
//!   form field the message belongs to.
//! - [`AppError`]: the HTTP layer's error, converted into a JSON response.
//!
//! User-facing messages never carry cryptographic detail. The precise reason
//! (wrong origin, rp id hash mismatch, bad signature...) is logged instead.

use crate::db::StoreError;
use crate::session::SessionError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Form field a non-field error is attached to
pub const NON_FIELD_ERRORS: &str = "__all__";

/// Outcome of a rejected second-factor attempt.
#[derive(Error, Debug)]
pub enum VerificationError {
    /// The assertion payload could not be parsed or is structurally invalid
    #[error("Malformed assertion response: {0}")]
    MalformedResponse(String),

    /// The credential id is not registered to this user
    #[error("Unknown credential")]
    UnknownCredential,

    /// Signature, challenge, origin or rp id did not check out
    #[error("Signature invalid: {0}")]
    SignatureInvalid(String),

    /// No outstanding challenge in the session
    #[error("No outstanding challenge for this session")]
    NoChallenge,

    #[error("Invalid backup code")]
    InvalidBackupCode,

    #[error("Invalid TOTP token")]
    InvalidTotpToken,

    /// Token is not exactly six digits; no device was consulted
    #[error("Malformed TOTP token")]
    MalformedToken,

    /// More than one backup code row matched a single (user, code) pair.
    ///
    /// The uniqueness of backup codes is established when they are created,
    /// so this means the store is corrupt. It is never shown to the user as a
    /// validation failure.
    #[error("Integrity fault: {count} backup codes matched a single submission")]
    IntegrityFault { count: u64 },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl VerificationError {
    pub const BAD_SIGNATURE_MESSAGE: &'static str = "U2F validation failed -- bad signature.";
    pub const INVALID_BACKUP_CODE_MESSAGE: &'static str = "That is not a valid backup code.";
    pub const INVALID_TOKEN_MESSAGE: &'static str = "That token is invalid.";
    pub const MALFORMED_TOKEN_MESSAGE: &'static str = "Ensure this value has exactly 6 digits.";

    /// Message safe to show the user
    pub fn user_message(&self) -> &'static str {
        match self {
            VerificationError::MalformedResponse(_)
            | VerificationError::UnknownCredential
            | VerificationError::SignatureInvalid(_)
            | VerificationError::NoChallenge => Self::BAD_SIGNATURE_MESSAGE,
            VerificationError::InvalidBackupCode => Self::INVALID_BACKUP_CODE_MESSAGE,
            VerificationError::InvalidTotpToken => Self::INVALID_TOKEN_MESSAGE,
            VerificationError::MalformedToken => Self::MALFORMED_TOKEN_MESSAGE,
            VerificationError::IntegrityFault { .. }
            | VerificationError::Store(_)
            | VerificationError::Session(_) => "Internal server error",
        }
    }

    /// Form field the message is attached to
    pub fn field(&self) -> &'static str {
        match self {
            VerificationError::InvalidBackupCode => "code",
            VerificationError::InvalidTotpToken | VerificationError::MalformedToken => "token",
            _ => NON_FIELD_ERRORS,
        }
    }

    /// True for errors that are not the user's fault and must not be
    /// reported as a failed verification.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            VerificationError::IntegrityFault { .. }
                | VerificationError::Store(_)
                | VerificationError::Session(_)
        )
    }
}

/// Application-wide error type for HTTP handlers
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Verification(#[from] VerificationError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),
}

/// Convert AppError into an HTTP response
///
/// Infrastructure errors are logged in full and answered with a generic 500.
/// Rejected second factors become a 400 with the form-style body
/// `{ "error": ..., "field": ... }`.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message, field) = match &self {
            AppError::Store(e) => {
                tracing::error!("Store error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string(), NON_FIELD_ERRORS)
            }
            AppError::Session(e) => {
                tracing::error!("Session error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Session error".to_string(), NON_FIELD_ERRORS)
            }
            AppError::Verification(e) if e.is_fatal() => {
                tracing::error!("Second factor verification aborted: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    e.user_message().to_string(),
                    NON_FIELD_ERRORS,
                )
            }
            AppError::Verification(e) => {
                (StatusCode::BAD_REQUEST, e.user_message().to_string(), e.field())
            }
            AppError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, self.to_string(), NON_FIELD_ERRORS),
        };

        let body = Json(json!({
            "error": error_message,
            "field": field,
        }));

        (status, body).into_response()
    }
}

impl From<tower_sessions::session::Error> for AppError {
    fn from(e: tower_sessions::session::Error) -> Self {
        AppError::Session(SessionError::from(e))
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn webauthn_failures_share_one_message() {
        let errors = [
            VerificationError::MalformedResponse("x".into()),
            VerificationError::UnknownCredential,
            VerificationError::SignatureInvalid("origin mismatch".into()),
            VerificationError::NoChallenge,
        ];
        for e in &errors {
            assert_eq!(e.user_message(), VerificationError::BAD_SIGNATURE_MESSAGE);
            assert_eq!(e.field(), NON_FIELD_ERRORS);
            assert!(!e.is_fatal());
        }
    }

    #[test]
    fn integrity_fault_is_fatal_and_not_a_form_error() {
        let e = VerificationError::IntegrityFault { count: 2 };
        assert!(e.is_fatal());
        assert_ne!(e.user_message(), VerificationError::INVALID_BACKUP_CODE_MESSAGE);

        let response = AppError::from(e).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn rejected_code_is_a_bad_request_on_the_code_field() {
        let response = AppError::from(VerificationError::InvalidBackupCode).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(VerificationError::InvalidBackupCode.field(), "code");
    }
}
