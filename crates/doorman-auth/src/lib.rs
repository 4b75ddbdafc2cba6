//! Doorman Authentication and Authorization
//!
//! This crate provides the authentication core: JWT issuance and
//! validation, argon2 password hashing, the SSO provider chain, the auth
//! orchestrator and the role-escalation policy.

pub mod error;
pub mod jwt;
pub mod orchestrator;
pub mod password;
pub mod policy;
pub mod sso;

pub use error::AuthError;
pub use jwt::{Claims, JwtManager, ResetClaims, RESET_TOKEN_TTL_SECS, RESET_TOKEN_TYPE};
pub use orchestrator::{AuthService, LoginResult, UserSummary};
pub use password::{hash_password, verify_password};
pub use sso::{LdapConfig, LdapProvider, SsoChain, SsoPasswordLink, SsoProvider, SsoUserData};
