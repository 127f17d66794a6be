use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::auth::jwt::TokenError;

/// Errors surfaced to HTTP callers. Internal causes are logged where they
/// occur; only the public message leaves the process.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Missing fields for new user: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("Email and password not present")]
    EmailAndPasswordMissing,

    #[error("Email not present")]
    EmailMissing,

    #[error("Password not present")]
    PasswordMissing,

    #[error("Unable to decode request: {0}")]
    InvalidBody(String),

    #[error("Email {0} is already registered")]
    EmailTaken(String),

    #[error("Email and password not found or incorrect")]
    InvalidCredentials,

    #[error("{0}")]
    Unauthorized(TokenError),

    #[error("{0}")]
    Internal(&'static str),
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::MissingFields(_)
            | AuthError::EmailAndPasswordMissing
            | AuthError::EmailMissing
            | AuthError::PasswordMissing
            | AuthError::InvalidBody(_)
            | AuthError::EmailTaken(_) => StatusCode::BAD_REQUEST,
            AuthError::InvalidCredentials | AuthError::Unauthorized(_) => {
                StatusCode::UNAUTHORIZED
            }
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (
            self.status(),
            Json(serde_json::json!({ "error": self.to_string() })),
        )
            .into_response()
    }
}
