//! JWT token management
//!
//! Three token kinds share one signing secret: short-lived access tokens,
//! long-lived refresh tokens (same claim set, longer expiry) and
//! password-reset tokens (distinct claim set with a `type` marker).

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::AuthError;
use doorman_db::User;

/// Reset tokens live for one hour, matching the stored shadow expiry.
pub const RESET_TOKEN_TTL_SECS: i64 = 3600;

/// Claim marker distinguishing reset tokens from session tokens
pub const RESET_TOKEN_TYPE: &str = "password_reset";

/// Session (access/refresh) token claims
///
/// The field set is a wire contract: `{sub, email, role, ssoMask,
/// disabled, iat, exp}` with numeric `sub`. It is rebuilt from the current
/// user record on every issuance, never copied from an older token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: i64,
    pub email: String,
    pub role: Option<String>,
    #[serde(rename = "ssoMask")]
    pub sso_mask: i64,
    pub disabled: bool,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

/// Password-reset token claims
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ResetClaims {
    pub email: String,
    #[serde(rename = "type")]
    pub token_type: String,
    pub language: String,
    pub iat: i64,
    pub exp: i64,
}

/// JWT manager for token generation and validation
#[derive(Clone)]
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl_secs: i64,
    refresh_ttl_secs: i64,
}

impl JwtManager {
    /// Create a new JWT manager
    pub fn new(secret: &str, access_ttl_secs: i64, refresh_ttl_secs: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl_secs,
            refresh_ttl_secs,
        }
    }

    /// Access token lifetime in seconds
    pub fn access_ttl_secs(&self) -> i64 {
        self.access_ttl_secs
    }

    /// Build a complete payload from the current user record
    fn build_claims(user: &User, ttl_secs: i64) -> Claims {
        let now = Utc::now();
        Claims {
            sub: user.id,
            email: user.email.clone(),
            role: user.role_str().map(str::to_string),
            sso_mask: user.sso_mask,
            disabled: user.disabled,
            iat: now.timestamp(),
            exp: (now + Duration::seconds(ttl_secs)).timestamp(),
        }
    }

    /// Sign a short-lived access token
    pub fn sign_access_token(&self, user: &User) -> Result<String, AuthError> {
        debug!("Signing access token for user {}", user.id);
        let claims = Self::build_claims(user, self.access_ttl_secs);
        encode(&Header::default(), &claims, &self.encoding_key).map_err(AuthError::Jwt)
    }

    /// Sign a long-lived refresh token
    pub fn sign_refresh_token(&self, user: &User) -> Result<String, AuthError> {
        let claims = Self::build_claims(user, self.refresh_ttl_secs);
        encode(&Header::default(), &claims, &self.encoding_key).map_err(AuthError::Jwt)
    }

    /// Validate an access or refresh token and return its claims
    ///
    /// Missing `sub` or `email` makes deserialization fail, so a token
    /// without them never validates.
    pub fn verify_session_token(&self, token: &str) -> Result<Claims, AuthError> {
        let validation = Validation::default();
        let token_data =
            decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
                match e.kind() {
                    ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                    _ => AuthError::InvalidToken,
                }
            })?;
        Ok(token_data.claims)
    }

    /// Sign a password-reset token carrying the email and mail language
    pub fn sign_reset_token(&self, email: &str, language: &str) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = ResetClaims {
            email: email.to_string(),
            token_type: RESET_TOKEN_TYPE.to_string(),
            language: language.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::seconds(RESET_TOKEN_TTL_SECS)).timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding_key).map_err(AuthError::Jwt)
    }

    /// Validate a password-reset token
    ///
    /// An expired signature maps to `ResetLinkExpired` (410 semantics);
    /// every other verification failure, including a wrong `type` claim,
    /// maps to `InvalidResetToken`.
    pub fn verify_reset_token(&self, token: &str) -> Result<ResetClaims, AuthError> {
        let validation = Validation::default();
        let token_data =
            decode::<ResetClaims>(token, &self.decoding_key, &validation).map_err(|e| {
                match e.kind() {
                    ErrorKind::ExpiredSignature => AuthError::ResetLinkExpired,
                    _ => AuthError::InvalidResetToken,
                }
            })?;

        if token_data.claims.token_type != RESET_TOKEN_TYPE {
            return Err(AuthError::InvalidResetToken);
        }

        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use doorman_db::UserRole;

    fn test_user() -> User {
        let now = Utc::now();
        User {
            id: 42,
            email: "alice@example.com".to_string(),
            username: "alice".to_string(),
            password_hash: Some("x".to_string()),
            full_name: None,
            avatar: None,
            departments: None,
            role: Some(UserRole::Admin),
            disabled: false,
            is_verified: true,
            sso_mask: 2,
            pwd_reset_token: None,
            pwd_reset_expires: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_access_token_round_trip() {
        let manager = JwtManager::new("test-secret-key", 900, 604800);

        let token = manager.sign_access_token(&test_user()).unwrap();
        let claims = manager.verify_session_token(&token).unwrap();

        assert_eq!(claims.sub, 42);
        assert_eq!(claims.email, "alice@example.com");
        assert_eq!(claims.role.as_deref(), Some("admin"));
        assert_eq!(claims.sso_mask, 2);
        assert!(!claims.disabled);
        assert_eq!(claims.exp - claims.iat, 900);
    }

    #[test]
    fn test_refresh_token_has_longer_expiry() {
        let manager = JwtManager::new("test-secret-key", 900, 604800);
        let token = manager.sign_refresh_token(&test_user()).unwrap();
        let claims = manager.verify_session_token(&token).unwrap();
        assert_eq!(claims.exp - claims.iat, 604800);
    }

    #[test]
    fn test_invalid_token() {
        let manager = JwtManager::new("test-secret-key", 900, 604800);
        assert!(matches!(
            manager.verify_session_token("not-a-token"),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let manager = JwtManager::new("test-secret-key", 900, 604800);
        let other = JwtManager::new("other-secret", 900, 604800);
        let token = manager.sign_access_token(&test_user()).unwrap();
        assert!(other.verify_session_token(&token).is_err());
    }

    #[test]
    fn test_token_missing_email_rejected() {
        // Claims without the mandatory email field must not validate
        #[derive(serde::Serialize)]
        struct Partial {
            sub: i64,
            exp: i64,
            iat: i64,
        }
        let now = Utc::now().timestamp();
        let token = encode(
            &Header::default(),
            &Partial {
                sub: 1,
                exp: now + 600,
                iat: now,
            },
            &EncodingKey::from_secret(b"test-secret-key"),
        )
        .unwrap();

        let manager = JwtManager::new("test-secret-key", 900, 604800);
        assert!(matches!(
            manager.verify_session_token(&token),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn test_reset_token_round_trip() {
        let manager = JwtManager::new("test-secret-key", 900, 604800);
        let token = manager.sign_reset_token("alice@example.com", "it").unwrap();
        let claims = manager.verify_reset_token(&token).unwrap();
        assert_eq!(claims.email, "alice@example.com");
        assert_eq!(claims.language, "it");
        assert_eq!(claims.token_type, RESET_TOKEN_TYPE);
        assert_eq!(claims.exp - claims.iat, RESET_TOKEN_TTL_SECS);
    }

    #[test]
    fn test_session_token_is_not_a_reset_token() {
        let manager = JwtManager::new("test-secret-key", 900, 604800);
        let token = manager.sign_access_token(&test_user()).unwrap();
        assert!(matches!(
            manager.verify_reset_token(&token),
            Err(AuthError::InvalidResetToken)
        ));
    }
}
