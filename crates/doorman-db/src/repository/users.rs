//! User operations

use chrono::{DateTime, Utc};
use sqlx::Row;
use std::str::FromStr;

use crate::error::DbError;
use crate::models::{NewUser, SsoMerge, User, UserProfileUpdate, UserRole};
use crate::repository::Database;

/// Column list shared by every user SELECT
const USER_COLUMNS: &str = "id, email, username, password_hash, full_name, avatar, departments, \
     role, disabled, is_verified, sso_mask, pwd_reset_token, pwd_reset_expires, \
     created_at, updated_at";

/// Query parameters for the admin user listing
#[derive(Debug, Clone, Default)]
pub struct UserQuery {
    /// Filter by role; "regular" matches accounts without a role
    pub role: Option<String>,
    /// Filter by status: "enabled" or "disabled"
    pub status: Option<String>,
    /// Substring match over email and full name
    pub search: Option<String>,
    /// Pagination offset (must be non-negative)
    pub offset: i64,
    /// Pagination limit (must be positive)
    pub limit: i64,
}

impl UserQuery {
    /// Validates and normalizes the query parameters
    pub fn validated(mut self) -> Self {
        if self.offset < 0 {
            self.offset = 0;
        }
        if self.limit <= 0 {
            self.limit = 20;
        } else if self.limit > 100 {
            self.limit = 100;
        }
        if let Some(ref role) = self.role {
            if role != "regular" && UserRole::from_str(role).is_err() {
                self.role = None;
            }
        }
        if let Some(ref status) = self.status {
            if status != "enabled" && status != "disabled" {
                self.status = None;
            }
        }
        self
    }
}

impl Database {
    // ==================== User Operations ====================

    /// Insert a new user
    ///
    /// Email and username uniqueness is checked explicitly before the
    /// insert so callers get a typed duplicate error instead of a raw
    /// constraint violation.
    pub async fn insert_user(&self, user: NewUser) -> Result<User, DbError> {
        let now = Utc::now();

        if self.get_user_by_email(&user.email).await?.is_some() {
            return Err(DbError::Duplicate(format!(
                "Email '{}' already exists",
                user.email
            )));
        }
        if self.get_user_by_username(&user.username).await?.is_some() {
            return Err(DbError::Duplicate(format!(
                "Username '{}' already exists",
                user.username
            )));
        }

        let result = sqlx::query(
            r#"
            INSERT INTO users (email, username, password_hash, full_name, avatar, departments,
                               role, disabled, is_verified, sso_mask, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&user.email)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.full_name)
        .bind(&user.avatar)
        .bind(&user.departments)
        .bind(user.role.map(|r| r.as_str()))
        .bind(user.disabled)
        .bind(user.is_verified)
        .bind(user.sso_mask)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .fetch_one(&self.pool)
        .await?;

        let id: i64 = result.get("id");

        Ok(User {
            id,
            email: user.email,
            username: user.username,
            password_hash: user.password_hash,
            full_name: user.full_name,
            avatar: user.avatar,
            departments: user.departments,
            role: user.role,
            disabled: user.disabled,
            is_verified: user.is_verified,
            sso_mask: user.sso_mask,
            pwd_reset_token: None,
            pwd_reset_expires: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Get a user by ID
    pub async fn get_user_by_id(&self, id: i64) -> Result<Option<User>, DbError> {
        let sql = format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS);
        let result = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;

        result
            .map(|row| User::try_from(&row).map_err(DbError::from))
            .transpose()
    }

    /// Get a user by email
    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, DbError> {
        let sql = format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS);
        let result = sqlx::query(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        result
            .map(|row| User::try_from(&row).map_err(DbError::from))
            .transpose()
    }

    /// Get a user by username
    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, DbError> {
        let sql = format!("SELECT {} FROM users WHERE username = ?", USER_COLUMNS);
        let result = sqlx::query(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        result
            .map(|row| User::try_from(&row).map_err(DbError::from))
            .transpose()
    }

    /// Get a user matching either email or username
    pub async fn get_user_by_email_or_username(
        &self,
        identifier: &str,
    ) -> Result<Option<User>, DbError> {
        let sql = format!(
            "SELECT {} FROM users WHERE email = ?1 OR username = ?1",
            USER_COLUMNS
        );
        let result = sqlx::query(&sql)
            .bind(identifier)
            .fetch_optional(&self.pool)
            .await?;

        result
            .map(|row| User::try_from(&row).map_err(DbError::from))
            .transpose()
    }

    /// List users with filtering and pagination
    ///
    /// Note: query parameters are re-validated via UserQuery::validated()
    /// before building the statement.
    pub async fn list_users(&self, query: UserQuery) -> Result<(Vec<User>, i64), DbError> {
        let query = query.validated();

        let mut conditions = Vec::new();
        let mut params: Vec<String> = Vec::new();

        match query.role.as_deref() {
            Some("regular") => conditions.push("role IS NULL".to_string()),
            Some(role) => {
                conditions.push("role = ?".to_string());
                params.push(role.to_string());
            }
            None => {}
        }
        if let Some(status) = &query.status {
            conditions.push("disabled = ?".to_string());
            params.push(if status == "disabled" { "1" } else { "0" }.to_string());
        }
        if let Some(search) = &query.search {
            conditions.push("(email LIKE ? OR full_name LIKE ?)".to_string());
            params.push(format!("%{}%", search));
            params.push(format!("%{}%", search));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        // Total count for pagination
        let count_sql = format!("SELECT COUNT(*) as count FROM users {}", where_clause);
        let mut count_query = sqlx::query(&count_sql);
        for param in &params {
            count_query = count_query.bind(param);
        }
        let count_row = count_query.fetch_one(&self.pool).await?;
        let total: i64 = count_row.get("count");

        let list_sql = format!(
            "SELECT {} FROM users {} ORDER BY created_at DESC LIMIT ? OFFSET ?",
            USER_COLUMNS, where_clause
        );
        let mut list_query = sqlx::query(&list_sql);
        for param in &params {
            list_query = list_query.bind(param);
        }
        let rows = list_query
            .bind(query.limit)
            .bind(query.offset)
            .fetch_all(&self.pool)
            .await?;

        let users = rows
            .iter()
            .map(|row| User::try_from(row).map_err(DbError::from))
            .collect::<Result<Vec<_>, _>>()?;

        Ok((users, total))
    }

    /// Update user role
    pub async fn update_user_role(
        &self,
        id: i64,
        role: Option<UserRole>,
    ) -> Result<bool, DbError> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE users
            SET role = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(role.map(|r| r.as_str()))
        .bind(now.to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Update user disabled flag
    pub async fn update_user_status(&self, id: i64, disabled: bool) -> Result<bool, DbError> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE users
            SET disabled = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(disabled)
        .bind(now.to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Update user password
    pub async fn update_user_password(
        &self,
        id: i64,
        password_hash: &str,
    ) -> Result<bool, DbError> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(password_hash)
        .bind(now.to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Apply a partial profile update
    pub async fn update_user_profile(
        &self,
        id: i64,
        update: &UserProfileUpdate,
    ) -> Result<bool, DbError> {
        let mut sets = Vec::new();
        let mut params: Vec<Option<String>> = Vec::new();

        if let Some(email) = &update.email {
            sets.push("email = ?");
            params.push(Some(email.clone()));
        }
        if let Some(username) = &update.username {
            sets.push("username = ?");
            params.push(Some(username.clone()));
        }
        if let Some(full_name) = &update.full_name {
            sets.push("full_name = ?");
            params.push(full_name.clone());
        }
        if let Some(departments) = &update.departments {
            sets.push("departments = ?");
            params.push(departments.clone());
        }
        if let Some(password_hash) = &update.password_hash {
            sets.push("password_hash = ?");
            params.push(Some(password_hash.clone()));
        }

        if sets.is_empty() {
            // Nothing to change; report whether the row exists
            return Ok(self.get_user_by_id(id).await?.is_some());
        }

        let now = Utc::now();
        let sql = format!(
            "UPDATE users SET {}, updated_at = ? WHERE id = ?",
            sets.join(", ")
        );
        let mut query = sqlx::query(&sql);
        for param in &params {
            query = query.bind(param);
        }
        let result = query
            .bind(now.to_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Synchronize an existing user after a successful SSO authentication
    ///
    /// The username column is deliberately absent: once set it is locally
    /// owned and never overwritten from the directory.
    pub async fn apply_sso_merge(&self, id: i64, merge: &SsoMerge) -> Result<bool, DbError> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE users
            SET email = ?, full_name = ?, avatar = ?, departments = ?,
                sso_mask = ?, is_verified = 1, password_hash = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&merge.email)
        .bind(&merge.full_name)
        .bind(&merge.avatar)
        .bind(&merge.departments)
        .bind(merge.sso_mask)
        .bind(&merge.password_hash)
        .bind(now.to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Store a freshly issued password-reset token and its expiry
    ///
    /// Overwrites any previous token, which implicitly revokes it.
    pub async fn set_reset_token(
        &self,
        id: i64,
        token: &str,
        expires: DateTime<Utc>,
    ) -> Result<bool, DbError> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE users
            SET pwd_reset_token = ?, pwd_reset_expires = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(token)
        .bind(expires.to_rfc3339())
        .bind(now.to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Consume a password-reset token and set the new password hash
    ///
    /// Single conditional UPDATE keyed on the stored token value, so two
    /// concurrent submits of the same token cannot both succeed. Returns
    /// false when the stored token no longer matches.
    pub async fn consume_reset_token(
        &self,
        id: i64,
        token: &str,
        new_password_hash: &str,
    ) -> Result<bool, DbError> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = ?, pwd_reset_token = NULL, pwd_reset_expires = NULL, updated_at = ?
            WHERE id = ? AND pwd_reset_token = ?
            "#,
        )
        .bind(new_password_hash)
        .bind(now.to_rfc3339())
        .bind(id)
        .bind(token)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Count super users, optionally only the non-disabled ones
    pub async fn count_super_users(&self, active_only: bool) -> Result<i64, DbError> {
        let sql = if active_only {
            "SELECT COUNT(*) as count FROM users WHERE role = 'super_user' AND disabled = 0"
        } else {
            "SELECT COUNT(*) as count FROM users WHERE role = 'super_user'"
        };
        let result = sqlx::query(sql).fetch_one(&self.pool).await?;
        let count: i64 = result.get("count");
        Ok(count)
    }

    /// Delete a user
    pub async fn delete_user(&self, id: i64) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Check if any users exist
    pub async fn has_users(&self) -> Result<bool, DbError> {
        let result = sqlx::query("SELECT COUNT(*) as count FROM users")
            .fetch_one(&self.pool)
            .await?;
        let count: i64 = result.get("count");
        Ok(count > 0)
    }
}
