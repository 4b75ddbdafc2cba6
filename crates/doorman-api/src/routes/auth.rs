//! Authentication extractors and routes

use axum::{
    extract::{FromRef, FromRequestParts, Path, State},
    http::{header::AUTHORIZATION, request::Parts},
    routing::{get, post},
    Json, Router,
};
use doorman_auth::{AuthError, Claims, SsoPasswordLink};
use doorman_db::UserRole;
use std::str::FromStr;
use tracing::debug;

use crate::error::ApiError;
use crate::state::AppState;

use super::types::{
    ForgotPasswordRequest, LoginRequest, LoginResponse, RefreshRequest, RefreshResponse,
    ResetPasswordRequest, StatusMessage,
};

// ==================== Auth Extractors ====================

/// The authenticated principal, reconstructed from token claims
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: i64,
    pub email: String,
    pub role: Option<UserRole>,
    pub disabled: bool,
    pub sso_mask: i64,
}

impl CurrentUser {
    fn from_claims(claims: &Claims) -> Self {
        Self {
            id: claims.sub,
            email: claims.email.clone(),
            // An unrecognized role claim grants nothing
            role: claims
                .role
                .as_deref()
                .and_then(|r| UserRole::from_str(r).ok()),
            disabled: claims.disabled,
            sso_mask: claims.sso_mask,
        }
    }

    pub fn has_admin_access(&self) -> bool {
        self.role.is_some_and(|r| r.has_admin_access())
    }
}

/// Extractor for authenticated user (required)
pub struct RequireAuth(pub CurrentUser);

impl<S> FromRequestParts<S> for RequireAuth
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);

        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or(AuthError::MissingAuthHeader)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(AuthError::InvalidAuthHeader)?;

        let claims = app_state.jwt.verify_session_token(token)?;
        let user = CurrentUser::from_claims(&claims);

        debug!("Authenticated user {} ({})", user.id, user.email);
        Ok(RequireAuth(user))
    }
}

/// Extractor for admin user (required)
///
/// A disabled account is rejected even while its token is still valid.
pub struct RequireAdmin(pub CurrentUser);

impl<S> FromRequestParts<S> for RequireAdmin
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let RequireAuth(user) = RequireAuth::from_request_parts(parts, state).await?;

        if user.disabled || !user.has_admin_access() {
            return Err(AuthError::Forbidden("Admin access required".to_string()).into());
        }

        Ok(RequireAdmin(user))
    }
}

// ==================== Input Validation ====================

/// Maximum allowed identifier length
const MAX_IDENTIFIER_LENGTH: usize = 254;
/// Maximum allowed password length (prevent DoS with very large passwords)
const MAX_PASSWORD_LENGTH: usize = 256;
/// Minimum allowed password length
const MIN_PASSWORD_LENGTH: usize = 8;

fn validate_identifier(identifier: &str) -> Result<(), ApiError> {
    if identifier.is_empty() {
        return Err(ApiError::BadRequest("Email cannot be empty".to_string()));
    }
    if identifier.len() > MAX_IDENTIFIER_LENGTH {
        return Err(ApiError::BadRequest(format!(
            "Email exceeds maximum length of {} characters",
            MAX_IDENTIFIER_LENGTH
        )));
    }
    Ok(())
}

/// Validate password length for new passwords
pub(crate) fn validate_new_password(password: &str) -> Result<(), ApiError> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::BadRequest(format!(
            "Password must be at least {} characters long",
            MIN_PASSWORD_LENGTH
        )));
    }
    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(ApiError::BadRequest(format!(
            "Password exceeds maximum length of {} characters",
            MAX_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

// ==================== Auth Routes ====================

/// POST /api/v1/auth/login
async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    validate_identifier(&request.email)?;
    if request.password.len() > MAX_PASSWORD_LENGTH {
        return Err(ApiError::BadRequest(format!(
            "Password exceeds maximum length of {} characters",
            MAX_PASSWORD_LENGTH
        )));
    }

    debug!("Login attempt for {}", request.email);

    let result = state.auth.login(&request.email, &request.password).await?;

    Ok(Json(LoginResponse {
        access_token: result.access_token,
        refresh_token: result.refresh_token,
        expires_in: state.jwt.access_ttl_secs(),
        user: result.user,
    }))
}

/// POST /api/v1/auth/forgot-password/{language}
///
/// The response never reveals whether the account exists.
async fn forgot_password(
    State(state): State<AppState>,
    Path(language): Path<String>,
    Json(request): Json<ForgotPasswordRequest>,
) -> Result<Json<StatusMessage>, ApiError> {
    validate_identifier(&request.email)?;

    state.auth.forgot_password(&request.email, &language).await?;

    Ok(Json(StatusMessage::ok(
        "If the account exists, a reset link has been sent",
    )))
}

/// POST /api/v1/auth/reset-password
async fn reset_password(
    State(state): State<AppState>,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<Json<StatusMessage>, ApiError> {
    validate_new_password(&request.password)?;

    state
        .auth
        .reset_password(&request.token, &request.password)
        .await?;

    Ok(Json(StatusMessage::ok("Password updated")))
}

/// POST /api/v1/auth/refresh-token
async fn refresh_token(
    State(state): State<AppState>,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<RefreshResponse>, ApiError> {
    let access_token = state.auth.refresh(&request.refresh_token).await?;

    Ok(Json(RefreshResponse {
        access_token,
        expires_in: state.jwt.access_ttl_secs(),
    }))
}

/// GET /api/v1/auth/sso-password-links
///
/// Change-password links for the SSO providers the caller's account is
/// linked to, so the frontend can point directory users at the right
/// place instead of the local reset flow.
async fn sso_password_links(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
) -> Json<Vec<SsoPasswordLink>> {
    Json(state.sso.change_password_links(user.sso_mask))
}

/// Create auth routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/auth/login", post(login))
        .route("/api/v1/auth/forgot-password/{language}", post(forgot_password))
        .route("/api/v1/auth/reset-password", post(reset_password))
        .route("/api/v1/auth/refresh-token", post(refresh_token))
        .route("/api/v1/auth/sso-password-links", get(sso_password_links))
}
