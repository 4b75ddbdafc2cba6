//! Admin user-management routes
//!
//! Every handler re-reads the target row, runs the pure policy checks
//! from doorman-auth, and performs the super-user count read only when a
//! check flags the change as potentially removing the last one.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, put},
    Json, Router,
};
use doorman_auth::policy::{self, Actor};
use doorman_auth::hash_password;
use doorman_db::{NewUser, UserProfileUpdate, UserQuery, UserRole};
use std::str::FromStr;
use tracing::{debug, info};

use crate::error::ApiError;
use crate::state::AppState;

use super::auth::{validate_new_password, RequireAdmin};
use super::types::{
    CreateUserRequest, ListUsersQuery, SetRoleRequest, SetStatusRequest, UpdateUserRequest,
    UserResponse, UsersListResponse,
};

// ==================== Input Validation ====================

/// Maximum allowed username length
const MAX_USERNAME_LENGTH: usize = 64;

/// Validate username format and length
fn validate_username(username: &str) -> Result<(), ApiError> {
    if username.is_empty() {
        return Err(ApiError::BadRequest("Username cannot be empty".to_string()));
    }
    if username.len() > MAX_USERNAME_LENGTH {
        return Err(ApiError::BadRequest(format!(
            "Username exceeds maximum length of {} characters",
            MAX_USERNAME_LENGTH
        )));
    }
    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == '.')
    {
        return Err(ApiError::BadRequest(
            "Username can only contain alphanumeric characters, dots, underscores, and hyphens"
                .to_string(),
        ));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), ApiError> {
    if email.is_empty() || !email.contains('@') {
        return Err(ApiError::BadRequest("Invalid email address".to_string()));
    }
    Ok(())
}

/// Parse an optional role string; `null` and "" both mean "no role"
fn parse_role(role: Option<&str>) -> Result<Option<UserRole>, ApiError> {
    match role {
        None | Some("") => Ok(None),
        Some(r) => UserRole::from_str(r)
            .map(Some)
            .map_err(|_| ApiError::BadRequest(format!("Invalid role: {}", r))),
    }
}

fn actor(user: &super::auth::CurrentUser) -> Actor {
    Actor::new(user.id, user.role)
}

// ==================== User Routes ====================

/// GET /api/v1/admin/users
async fn list_users(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<UsersListResponse>, ApiError> {
    let db_query = UserQuery {
        role: query.role,
        status: query.status,
        search: query.search,
        offset: query.offset,
        limit: query.limit,
    }
    .validated();

    let offset = db_query.offset;
    let limit = db_query.limit;
    let (users, total) = state.db.list_users(db_query).await?;

    Ok(Json(UsersListResponse {
        users: users.into_iter().map(UserResponse::from).collect(),
        total,
        offset,
        limit,
    }))
}

/// POST /api/v1/admin/users
async fn create_user(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Json(request): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let role = parse_role(request.role.as_deref())?;
    policy::check_create(&actor(&admin), role)?;

    validate_email(&request.email)?;
    validate_username(&request.username)?;
    validate_new_password(&request.password)?;

    debug!("Creating user: {}", request.username);

    let password_hash = hash_password(&request.password)?;

    let user = state
        .db
        .insert_user(NewUser {
            email: request.email,
            username: request.username,
            password_hash: Some(password_hash),
            full_name: request.full_name,
            departments: request.departments,
            role,
            // Admin-created accounts skip mail verification
            is_verified: true,
            ..Default::default()
        })
        .await?;

    info!("User {} created user {}", admin.id, user.id);

    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

/// PUT /api/v1/admin/users/{id}
async fn update_user(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let target = state
        .db
        .get_user_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User: {}", id)))?;

    policy::check_update(&actor(&admin), &target)?;

    if let Some(email) = &request.email {
        validate_email(email)?;
        if *email != target.email && state.db.get_user_by_email(email).await?.is_some() {
            return Err(ApiError::BadRequest(format!(
                "Email '{}' already exists",
                email
            )));
        }
    }
    if let Some(username) = &request.username {
        validate_username(username)?;
        if *username != target.username && state.db.get_user_by_username(username).await?.is_some()
        {
            return Err(ApiError::BadRequest(format!(
                "Username '{}' already exists",
                username
            )));
        }
    }

    let password_hash = match &request.password {
        Some(password) => {
            validate_new_password(password)?;
            Some(hash_password(password)?)
        }
        None => None,
    };

    // An empty string clears the nullable fields
    let clear_or_set = |v: Option<String>| v.map(|s| if s.is_empty() { None } else { Some(s) });

    let update = UserProfileUpdate {
        email: request.email,
        username: request.username,
        full_name: clear_or_set(request.full_name),
        departments: clear_or_set(request.departments),
        password_hash,
    };

    state.db.update_user_profile(id, &update).await?;

    let user = state
        .db
        .get_user_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User: {}", id)))?;

    info!("User {} updated user {}", admin.id, id);

    Ok(Json(UserResponse::from(user)))
}

/// PATCH /api/v1/admin/users/{id}/role
async fn set_user_role(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<SetRoleRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let new_role = parse_role(request.role.as_deref())?;

    let target = state
        .db
        .get_user_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User: {}", id)))?;

    let demotes_super_user = policy::check_role_change(&actor(&admin), &target, new_role)?;
    if demotes_super_user && state.db.count_super_users(false).await? <= 1 {
        return Err(ApiError::BadRequest(
            "Cannot remove the last super user".to_string(),
        ));
    }

    state.db.update_user_role(id, new_role).await?;

    let user = state
        .db
        .get_user_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User: {}", id)))?;

    info!(
        "User {} changed role of user {} to {:?}",
        admin.id,
        id,
        user.role_str()
    );

    Ok(Json(UserResponse::from(user)))
}

/// PATCH /api/v1/admin/users/{id}/status
async fn set_user_status(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<SetStatusRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let target = state
        .db
        .get_user_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User: {}", id)))?;

    let disables_super_user = policy::check_status_change(&actor(&admin), &target, request.disabled)?;
    if disables_super_user && state.db.count_super_users(true).await? <= 1 {
        return Err(ApiError::BadRequest(
            "Cannot disable the last active super user".to_string(),
        ));
    }

    state.db.update_user_status(id, request.disabled).await?;

    let user = state
        .db
        .get_user_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User: {}", id)))?;

    info!(
        "User {} {} user {}",
        admin.id,
        if request.disabled { "disabled" } else { "enabled" },
        id
    );

    Ok(Json(UserResponse::from(user)))
}

/// DELETE /api/v1/admin/users/{id}
async fn delete_user(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let target = state
        .db
        .get_user_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User: {}", id)))?;

    let removes_super_user = policy::check_delete(&actor(&admin), &target)?;
    if removes_super_user && state.db.count_super_users(false).await? <= 1 {
        return Err(ApiError::BadRequest(
            "Cannot delete the last super user".to_string(),
        ));
    }

    state.db.delete_user(id).await?;

    info!("User {} deleted user {}", admin.id, id);

    Ok(StatusCode::NO_CONTENT)
}

/// Create admin routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/admin/users", get(list_users).post(create_user))
        .route(
            "/api/v1/admin/users/{id}",
            put(update_user).delete(delete_user),
        )
        .route("/api/v1/admin/users/{id}/role", patch(set_user_role))
        .route("/api/v1/admin/users/{id}/status", patch(set_user_status))
}
