//! API error types

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("Auth error: {0}")]
    Auth(#[from] doorman_auth::AuthError),

    #[error("Database error: {0}")]
    Database(#[from] doorman_db::DbError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Auth(e) => {
                let status = e.status();
                let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
                    "Internal error".to_string()
                } else {
                    e.to_string()
                };
                (status, message)
            }
            ApiError::Database(e) => match e {
                doorman_db::DbError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
                doorman_db::DbError::Duplicate(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
                _ => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal error".to_string(),
                ),
            },
        };

        let body = axum::Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}
