//! API routes

pub mod admin;
pub mod auth;
mod health;
pub mod types;

use axum::Router;

use crate::state::AppState;

#[allow(unused_imports)]
pub use auth::{CurrentUser, RequireAdmin, RequireAuth};

/// Create the main router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(health::routes())
        .merge(auth::routes())
        .merge(admin::routes())
        .with_state(state)
}
