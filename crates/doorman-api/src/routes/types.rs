//! Request/Response DTOs

use serde::{Deserialize, Serialize};

use doorman_auth::UserSummary;
use doorman_db::User;

// ==================== Auth Types ====================

/// Login request. The `email` field also accepts a username.
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Login response
#[derive(Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub user: UserSummary,
}

/// Forgot-password request
#[derive(Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

/// Reset-password request
#[derive(Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
}

/// Refresh-token request
#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Refresh-token response
#[derive(Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
    pub expires_in: i64,
}

/// Generic status envelope for flows without a data payload
#[derive(Serialize)]
pub struct StatusMessage {
    pub status: String,
    pub message: String,
}

impl StatusMessage {
    pub fn ok(message: &str) -> Self {
        Self {
            status: "ok".to_string(),
            message: message.to_string(),
        }
    }
}

// ==================== Admin User Types ====================

/// User listing query parameters
#[derive(Deserialize, Default)]
pub struct ListUsersQuery {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub offset: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    20
}

/// Create user request
#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub departments: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

/// Update user request. An empty string clears the nullable fields.
#[derive(Deserialize)]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub departments: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// Role change request; `null` or an empty string removes the role
#[derive(Deserialize)]
pub struct SetRoleRequest {
    pub role: Option<String>,
}

/// Status change request
#[derive(Deserialize)]
pub struct SetStatusRequest {
    pub disabled: bool,
}

/// User response (without credential material)
#[derive(Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub full_name: Option<String>,
    pub avatar: Option<String>,
    pub departments: Option<String>,
    pub role: Option<String>,
    pub disabled: bool,
    pub is_verified: bool,
    pub sso_mask: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            username: user.username,
            full_name: user.full_name,
            avatar: user.avatar,
            departments: user.departments,
            role: user.role.map(|r| r.as_str().to_string()),
            disabled: user.disabled,
            is_verified: user.is_verified,
            sso_mask: user.sso_mask,
            created_at: user.created_at.to_rfc3339(),
            updated_at: user.updated_at.to_rfc3339(),
        }
    }
}

/// Paginated users response
#[derive(Serialize)]
pub struct UsersListResponse {
    pub users: Vec<UserResponse>,
    pub total: i64,
    pub offset: i64,
    pub limit: i64,
}
