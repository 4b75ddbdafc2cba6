//! Database models

use crate::utils::parse_datetime_or_now;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Row;
use std::fmt;
use std::str::FromStr;

/// Error type for parsing models from strings
#[derive(Debug, Clone)]
pub enum ParseError {
    InvalidUserRole(String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::InvalidUserRole(s) => write!(f, "Invalid user role: {}", s),
        }
    }
}

impl std::error::Error for ParseError {}

/// User role
///
/// Accounts without a role (`NULL` in the database) are ordinary users.
/// `Guest` and `Service` are recognized for completeness but carry no
/// privileges anywhere in the authorization policy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    SuperUser,
    Admin,
    User,
    Guest,
    Service,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::SuperUser => "super_user",
            UserRole::Admin => "admin",
            UserRole::User => "user",
            UserRole::Guest => "guest",
            UserRole::Service => "service",
        }
    }

    pub fn is_super_user(&self) -> bool {
        matches!(self, UserRole::SuperUser)
    }

    /// Admin-level access covers both admins and super users.
    pub fn has_admin_access(&self) -> bool {
        matches!(self, UserRole::Admin | UserRole::SuperUser)
    }
}

impl FromStr for UserRole {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "super_user" => Ok(UserRole::SuperUser),
            "admin" => Ok(UserRole::Admin),
            "user" => Ok(UserRole::User),
            "guest" => Ok(UserRole::Guest),
            "service" => Ok(UserRole::Service),
            _ => Err(ParseError::InvalidUserRole(s.to_string())),
        }
    }
}

/// User model
///
/// `password_hash` is `None` for SSO-only accounts. `sso_mask` accumulates
/// one bit per external provider that has ever authenticated this identity
/// (0 means local credentials only). `pwd_reset_token` is the server-stored
/// shadow copy of the most recently issued reset token; issuing a new one
/// invalidates the previous token by overwrite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub full_name: Option<String>,
    pub avatar: Option<String>,
    pub departments: Option<String>,
    pub role: Option<UserRole>,
    pub disabled: bool,
    pub is_verified: bool,
    pub sso_mask: i64,
    #[serde(skip_serializing)]
    pub pwd_reset_token: Option<String>,
    #[serde(skip_serializing)]
    pub pwd_reset_expires: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn role_str(&self) -> Option<&'static str> {
        self.role.map(|r| r.as_str())
    }
}

/// New user (for insertion)
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub password_hash: Option<String>,
    pub full_name: Option<String>,
    pub avatar: Option<String>,
    pub departments: Option<String>,
    pub role: Option<UserRole>,
    pub disabled: bool,
    pub is_verified: bool,
    pub sso_mask: i64,
}

impl Default for NewUser {
    fn default() -> Self {
        Self {
            email: String::new(),
            username: String::new(),
            password_hash: None,
            full_name: None,
            avatar: None,
            departments: None,
            role: None,
            disabled: false,
            is_verified: false,
            sso_mask: 0,
        }
    }
}

/// Profile fields an administrator may change on an existing user
#[derive(Debug, Clone, Default)]
pub struct UserProfileUpdate {
    pub email: Option<String>,
    pub username: Option<String>,
    pub full_name: Option<Option<String>>,
    pub departments: Option<Option<String>>,
    pub password_hash: Option<String>,
}

/// Fields synchronized into an existing user after a successful
/// external (SSO) authentication. The merge rules live in the auth
/// orchestrator; this is the already-resolved result.
#[derive(Debug, Clone)]
pub struct SsoMerge {
    pub email: String,
    pub full_name: Option<String>,
    pub avatar: Option<String>,
    pub departments: Option<String>,
    pub sso_mask: i64,
    pub password_hash: String,
}

impl TryFrom<&sqlx::sqlite::SqliteRow> for User {
    type Error = sqlx::Error;

    fn try_from(row: &sqlx::sqlite::SqliteRow) -> Result<Self, Self::Error> {
        let role_str: Option<String> = row.try_get("role")?;
        let expires_str: Option<String> = row.try_get("pwd_reset_expires")?;
        Ok(User {
            id: row.try_get("id")?,
            email: row.try_get("email")?,
            username: row.try_get("username")?,
            password_hash: row.try_get("password_hash")?,
            full_name: row.try_get("full_name")?,
            avatar: row.try_get("avatar")?,
            departments: row.try_get("departments")?,
            role: role_str.and_then(|s| UserRole::from_str(&s).ok()),
            disabled: row.try_get("disabled")?,
            is_verified: row.try_get("is_verified")?,
            sso_mask: row.try_get("sso_mask")?,
            pwd_reset_token: row.try_get("pwd_reset_token")?,
            pwd_reset_expires: expires_str.map(|s| parse_datetime_or_now(&s)),
            created_at: parse_datetime_or_now(&row.try_get::<String, _>("created_at")?),
            updated_at: parse_datetime_or_now(&row.try_get::<String, _>("updated_at")?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip() {
        for role in [
            UserRole::SuperUser,
            UserRole::Admin,
            UserRole::User,
            UserRole::Guest,
            UserRole::Service,
        ] {
            assert_eq!(UserRole::from_str(role.as_str()).unwrap(), role);
        }
        assert!(UserRole::from_str("root").is_err());
    }

    #[test]
    fn test_admin_access() {
        assert!(UserRole::SuperUser.has_admin_access());
        assert!(UserRole::Admin.has_admin_access());
        assert!(!UserRole::User.has_admin_access());
        assert!(!UserRole::Guest.has_admin_access());
        assert!(!UserRole::Service.has_admin_access());
    }
}
