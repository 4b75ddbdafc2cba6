//! Authentication error types

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid refresh token")]
    InvalidRefreshToken,

    #[error("Invalid reset token")]
    InvalidResetToken,

    #[error("Reset link expired")]
    ResetLinkExpired,

    #[error("Missing authorization header")]
    MissingAuthHeader,

    #[error("Invalid authorization header format")]
    InvalidAuthHeader,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("User not found")]
    UserNotFound,

    #[error("Password hashing error: {0}")]
    PasswordHash(String),

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("Database error: {0}")]
    Database(#[from] doorman_db::DbError),

    #[error("Mail error: {0}")]
    Mail(#[from] doorman_mail::MailError),
}

impl AuthError {
    /// HTTP status for this failure
    ///
    /// Credential failures stay indistinguishable (401) on purpose; reset
    /// failures carry distinct statuses because the caller already holds a
    /// token that identifies the account.
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::InvalidCredentials
            | AuthError::InvalidToken
            | AuthError::TokenExpired
            | AuthError::InvalidRefreshToken
            | AuthError::MissingAuthHeader
            | AuthError::InvalidAuthHeader
            | AuthError::Jwt(_) => StatusCode::UNAUTHORIZED,
            AuthError::InvalidResetToken | AuthError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AuthError::ResetLinkExpired => StatusCode::GONE,
            AuthError::Forbidden(_) => StatusCode::FORBIDDEN,
            AuthError::UserNotFound => StatusCode::NOT_FOUND,
            AuthError::PasswordHash(_) | AuthError::Database(_) | AuthError::Mail(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            "Internal error".to_string()
        } else {
            self.to_string()
        };

        let body = axum::Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(AuthError::InvalidCredentials.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::InvalidRefreshToken.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::InvalidResetToken.status(), StatusCode::BAD_REQUEST);
        assert_eq!(AuthError::ResetLinkExpired.status(), StatusCode::GONE);
        assert_eq!(AuthError::UserNotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AuthError::Forbidden("nope".to_string()).status(),
            StatusCode::FORBIDDEN
        );
    }
}
