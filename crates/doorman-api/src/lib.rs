//! Doorman REST API
//!
//! This crate provides the Axum-based HTTP API for Doorman: the public
//! authentication endpoints and the admin user-management API.

pub mod error;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
