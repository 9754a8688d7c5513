//! Custom error types for the authentication service

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::error::DatabaseError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::{jwt::TokenError, models::Role};

/// Errors raised by the credential store and the audit log store
#[derive(Error, Debug)]
pub enum StoreError {
    /// One or more unique columns already hold the submitted value
    #[error("duplicate value for {}", .fields.join(", "))]
    Duplicate { fields: Vec<&'static str> },

    /// The row to update does not exist
    #[error("record not found")]
    NotFound,

    /// A log entry may only be completed once
    #[error("log entry {0} is already completed")]
    AlreadyCompleted(i64),

    /// A stored value does not satisfy the model invariants
    #[error("corrupt row: {0}")]
    Corrupt(String),

    /// Password hashing failed
    #[error("password hashing failed: {0}")]
    Hashing(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl StoreError {
    /// Field-level messages for uniqueness failures
    pub fn validation_messages(&self) -> Option<Vec<String>> {
        match self {
            StoreError::Duplicate { fields } => Some(
                fields
                    .iter()
                    .map(|field| format!("{} has already been taken", field))
                    .collect(),
            ),
            _ => None,
        }
    }
}

/// Errors surfaced to HTTP clients.
///
/// Every authentication or authorization failure maps to 401, including a
/// valid token presented with the wrong role.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("validation failed: {}", .0.join(", "))]
    Validation(Vec<String>),

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("invalid or expired token")]
    InvalidToken,

    #[error("{0} access required")]
    Forbidden(Role),

    #[error("{0}")]
    NotFound(&'static str),

    #[error("request body too large")]
    PayloadTooLarge,

    /// The audit trail could not be written; the request is aborted
    #[error("audit log failure: {0}")]
    AuditLog(#[source] StoreError),

    #[error("store failure: {0}")]
    Store(#[source] StoreError),

    #[error("token failure: {0}")]
    Token(#[from] TokenError),

    #[error("internal server error")]
    Internal,
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err.validation_messages() {
            Some(messages) => AuthError::Validation(messages),
            None => AuthError::Store(err),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AuthError::Validation(errors) => {
                (StatusCode::UNPROCESSABLE_ENTITY, json!({ "errors": errors }))
            }
            AuthError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                json!({ "error": "Invalid email or password" }),
            ),
            AuthError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                json!({ "error": "Unauthorized: Invalid or expired token" }),
            ),
            AuthError::Forbidden(role) => (
                StatusCode::UNAUTHORIZED,
                json!({ "error": format!("Unauthorized: {} access required", role) }),
            ),
            AuthError::NotFound(message) => (StatusCode::NOT_FOUND, json!({ "error": message })),
            AuthError::PayloadTooLarge => (
                StatusCode::PAYLOAD_TOO_LARGE,
                json!({ "error": "Request body too large" }),
            ),
            AuthError::AuditLog(_)
            | AuthError::Store(_)
            | AuthError::Token(_)
            | AuthError::Internal => {
                error!("Request failed: {}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal server error" }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

/// Type alias for handler results
pub type AuthResult<T> = Result<T, AuthError>;
