//! Auth orchestrator
//!
//! Coordinates credential validation (SSO chain first, then local
//! password), session issuance and refresh, and the password-reset token
//! lifecycle. Holds no per-request state; every call re-reads the user
//! record it operates on.

use chrono::{Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info};

use doorman_db::{Database, NewUser, SsoMerge, User};
use doorman_mail::Mailer;

use crate::error::AuthError;
use crate::jwt::{JwtManager, RESET_TOKEN_TTL_SECS};
use crate::password::{hash_password, verify_password, DUMMY_HASH};
use crate::sso::{SsoChain, SsoUserData};

/// User fields safe to return from login; excludes the password hash and
/// the reset-token pair
#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub full_name: Option<String>,
    pub avatar: Option<String>,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            avatar: user.avatar.clone(),
        }
    }
}

/// Successful login: both tokens plus a safe user summary
#[derive(Debug, Clone, Serialize)]
pub struct LoginResult {
    pub access_token: String,
    pub refresh_token: String,
    pub user: UserSummary,
}

/// Coordinates SSO, local credentials, tokens and password resets
pub struct AuthService {
    db: Database,
    jwt: Arc<JwtManager>,
    sso: Arc<SsoChain>,
    mailer: Arc<dyn Mailer>,
    /// Base URL of the frontend, used to build reset links
    frontend_url: String,
}

impl AuthService {
    pub fn new(
        db: Database,
        jwt: Arc<JwtManager>,
        sso: Arc<SsoChain>,
        mailer: Arc<dyn Mailer>,
        frontend_url: String,
    ) -> Self {
        Self {
            db,
            jwt,
            sso,
            mailer,
            frontend_url: frontend_url.trim_end_matches('/').to_string(),
        }
    }

    /// Validate credentials against the SSO chain, then local storage
    ///
    /// A successful SSO authentication upserts the external identity into
    /// the credential store. Local validation never reveals whether the
    /// account exists: a missing user, an SSO-only account and a wrong
    /// password all collapse into `InvalidCredentials`, and a dummy hash
    /// is verified when there is nothing to verify against.
    pub async fn validate_credentials(
        &self,
        identifier: &str,
        password: &str,
    ) -> Result<User, AuthError> {
        if let Some(sso_data) = self.sso.authenticate(identifier, password).await {
            let user = self.upsert_from_sso(sso_data, password).await?;
            return Ok(user);
        }

        let user = self.db.get_user_by_email_or_username(identifier).await?;

        let (hash_to_verify, user) = match user {
            Some(u) => match u.password_hash.clone() {
                Some(hash) => (hash, Some(u)),
                None => (DUMMY_HASH.to_string(), None),
            },
            None => (DUMMY_HASH.to_string(), None),
        };

        let password_valid = verify_password(password, &hash_to_verify)?;

        match (user, password_valid) {
            (Some(user), true) => Ok(user),
            _ => Err(AuthError::InvalidCredentials),
        }
    }

    /// Merge an externally authenticated identity into the store
    ///
    /// Existing users keep their username, their departments and any
    /// locally set full name or avatar; the SSO mask accumulates the new
    /// provider bit; the password hash is refreshed from the plaintext
    /// that the directory just verified, so local login keeps working if
    /// the provider is later disabled.
    pub async fn upsert_from_sso(
        &self,
        data: SsoUserData,
        password: &str,
    ) -> Result<User, AuthError> {
        let mut existing = self.db.get_user_by_email(&data.email).await?;
        if existing.is_none() {
            if let Some(username) = &data.username {
                existing = self.db.get_user_by_username(username).await?;
            }
        }

        let password_hash = hash_password(password)?;

        match existing {
            Some(user) => {
                let merge = SsoMerge {
                    email: data.email,
                    full_name: user.full_name.clone().or(data.full_name),
                    avatar: user.avatar.clone().or(data.avatar),
                    departments: user.departments.clone(),
                    sso_mask: user.sso_mask | data.sso_mask,
                    password_hash,
                };
                self.db.apply_sso_merge(user.id, &merge).await?;
                self.db
                    .get_user_by_id(user.id)
                    .await?
                    .ok_or(AuthError::UserNotFound)
            }
            None => {
                let username = data.username.unwrap_or_else(|| data.email.clone());
                let user = self
                    .db
                    .insert_user(NewUser {
                        email: data.email,
                        username,
                        password_hash: Some(password_hash),
                        full_name: data.full_name,
                        avatar: data.avatar,
                        departments: data.departments,
                        role: None,
                        disabled: false,
                        is_verified: true,
                        sso_mask: data.sso_mask,
                    })
                    .await?;
                info!("Created user {} from SSO", user.id);
                Ok(user)
            }
        }
    }

    /// Authenticate and issue both tokens from a freshly built payload
    pub async fn login(&self, identifier: &str, password: &str) -> Result<LoginResult, AuthError> {
        let user = self.validate_credentials(identifier, password).await?;

        let access_token = self.jwt.sign_access_token(&user)?;
        let refresh_token = self.jwt.sign_refresh_token(&user)?;

        info!("User {} logged in", user.id);

        Ok(LoginResult {
            access_token,
            refresh_token,
            user: UserSummary::from(&user),
        })
    }

    /// Exchange a refresh token for a new access token
    ///
    /// The user record is re-fetched so the fresh payload picks up role or
    /// disabled changes made since the original login. The refresh token
    /// itself is not rotated. Every failure collapses into
    /// `InvalidRefreshToken`.
    pub async fn refresh(&self, refresh_token: &str) -> Result<String, AuthError> {
        let claims = self
            .jwt
            .verify_session_token(refresh_token)
            .map_err(|_| AuthError::InvalidRefreshToken)?;

        let user = self
            .db
            .get_user_by_id(claims.sub)
            .await?
            .ok_or(AuthError::InvalidRefreshToken)?;

        self.jwt.sign_access_token(&user)
    }

    /// Start the password-reset flow
    ///
    /// Always succeeds from the caller's point of view: an unknown email
    /// and a failed mail dispatch produce the same outcome as the happy
    /// path, so the endpoint cannot be used to enumerate accounts.
    pub async fn forgot_password(&self, email: &str, language: &str) -> Result<(), AuthError> {
        let Some(user) = self.db.get_user_by_email_or_username(email).await? else {
            debug!("Password reset requested for unknown identifier");
            return Ok(());
        };

        if let Err(e) = self.issue_reset_token(&user, language).await {
            error!("Password reset flow failed for user {}: {}", user.id, e);
        }

        Ok(())
    }

    async fn issue_reset_token(&self, user: &User, language: &str) -> Result<(), AuthError> {
        let token = self.jwt.sign_reset_token(&user.email, language)?;
        let expires = Utc::now() + Duration::seconds(RESET_TOKEN_TTL_SECS);

        // Stored redundantly next to the self-expiring token: overwriting
        // it revokes any previously issued token server-side.
        self.db.set_reset_token(user.id, &token, expires).await?;

        let reset_url = format!("{}/reset-password?token={}", self.frontend_url, token);
        self.mailer
            .send_password_reset(&user.email, &reset_url, language)
            .await?;

        info!("Password reset mail dispatched for user {}", user.id);
        Ok(())
    }

    /// Complete the password-reset flow
    ///
    /// The presented token must verify, match the stored shadow copy
    /// exactly, and the stored expiry must still be in the future. The
    /// final consume is a conditional update keyed on the token value, so
    /// the token is single-use even under concurrent submits.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), AuthError> {
        let claims = self.jwt.verify_reset_token(token)?;

        let user = self
            .db
            .get_user_by_email_or_username(&claims.email)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        match &user.pwd_reset_token {
            Some(stored) if stored == token => {}
            _ => return Err(AuthError::InvalidResetToken),
        }

        match user.pwd_reset_expires {
            Some(expires) if expires > Utc::now() => {}
            _ => return Err(AuthError::ResetLinkExpired),
        }

        let new_hash = hash_password(new_password)?;
        let consumed = self.db.consume_reset_token(user.id, token, &new_hash).await?;
        if !consumed {
            // Lost a race against another submit of the same token
            return Err(AuthError::InvalidResetToken);
        }

        info!("Password reset completed for user {}", user.id);
        Ok(())
    }
}
