//! Application state

use doorman_auth::{AuthService, JwtManager, SsoChain};
use doorman_db::Database;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub auth: Arc<AuthService>,
    pub jwt: Arc<JwtManager>,
    pub sso: Arc<SsoChain>,
}

impl AppState {
    pub fn new(
        db: Database,
        auth: Arc<AuthService>,
        jwt: Arc<JwtManager>,
        sso: Arc<SsoChain>,
    ) -> Self {
        Self { db, auth, jwt, sso }
    }
}
