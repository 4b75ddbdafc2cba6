//! Configuration loading

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::{info, warn};

use doorman_auth::LdapConfig;
use doorman_mail::SmtpConfig;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    /// LDAP SSO provider; disabled unless `enabled = true`
    #[serde(default)]
    pub ldap: LdapConfig,
    /// SMTP relay; when absent, reset mails are logged and dropped
    #[serde(default)]
    pub smtp: Option<SmtpConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Authentication configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
    /// Access token lifetime, e.g. "15m" or "900"
    #[serde(default = "default_access_ttl")]
    pub access_token_ttl: String,
    /// Refresh token lifetime, e.g. "7d"
    #[serde(default = "default_refresh_ttl")]
    pub refresh_token_ttl: String,
    /// Base URL the reset links point at
    #[serde(default = "default_frontend_url")]
    pub frontend_url: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: default_jwt_secret(),
            access_token_ttl: default_access_ttl(),
            refresh_token_ttl: default_refresh_ttl(),
            frontend_url: default_frontend_url(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// Default value functions
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_db_path() -> String {
    "./data/doorman.db".to_string()
}

fn default_jwt_secret() -> String {
    "change-me-in-production".to_string()
}

fn default_access_ttl() -> String {
    "15m".to_string()
}

fn default_refresh_ttl() -> String {
    "7d".to_string()
}

fn default_frontend_url() -> String {
    "http://localhost:4200".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Parse a duration string into seconds
///
/// Accepts a bare number of seconds or a number with an s/m/h/d suffix.
pub fn parse_duration_secs(value: &str) -> Result<i64> {
    let value = value.trim();
    let (digits, multiplier) = match value.chars().last() {
        Some('s') => (&value[..value.len() - 1], 1),
        Some('m') => (&value[..value.len() - 1], 60),
        Some('h') => (&value[..value.len() - 1], 3600),
        Some('d') => (&value[..value.len() - 1], 86400),
        _ => (value, 1),
    };
    let amount: i64 = digits
        .trim()
        .parse()
        .with_context(|| format!("Invalid duration: '{}'", value))?;
    if amount <= 0 {
        anyhow::bail!("Duration must be positive: '{}'", value);
    }
    Ok(amount * multiplier)
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &str) -> Result<Self> {
        let config_path = Path::new(path);

        if !config_path.exists() {
            info!("Config file not found at {}, using defaults", path);
            let mut config = Self::default();
            config.apply_overrides(|name| std::env::var(name).ok());
            return Ok(config);
        }

        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path))?;

        config.apply_overrides(|name| std::env::var(name).ok());

        info!("Loaded configuration from {}", path);
        Ok(config)
    }

    /// Apply environment variable overrides on top of the file values
    ///
    /// Takes the lookup as a closure so the mapping is testable without
    /// touching the process environment.
    pub fn apply_overrides(&mut self, get: impl Fn(&str) -> Option<String>) {
        if let Some(secret) = get("JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
        if let Some(ttl) = get("JWT_EXPIRES_IN") {
            self.auth.access_token_ttl = ttl;
        }
        if let Some(ttl) = get("JWT_REFRESH_EXPIRATION") {
            self.auth.refresh_token_ttl = ttl;
        }
        if let Some(url) = get("FRONTEND_URL") {
            self.auth.frontend_url = url;
        }

        if let Some(enabled) = get("LDAP_AUTH") {
            self.ldap.enabled = parse_bool(&enabled);
        }
        if let Some(direct) = get("LDAP_DIRECT_BIND") {
            self.ldap.direct_bind = parse_bool(&direct);
        }
        if let Some(server) = get("LDAP_SERVER") {
            self.ldap.server = server;
        }
        if let Some(base_dn) = get("LDAP_BASE_DN") {
            self.ldap.base_dn = base_dn;
        }
        if let Some(app_user) = get("LDAP_APP_USER") {
            self.ldap.app_user = app_user;
        }
        if let Some(app_pass) = get("LDAP_APP_PASS") {
            self.ldap.app_pass = app_pass;
        }
        if let Some(filter) = get("LDAP_FILTER") {
            self.ldap.filter = filter;
        }
        if let Some(field_map) = get("LDAP_FIELD_MAP") {
            self.ldap.field_map = field_map;
        }
        if let Some(url) = get("LDAP_CHANGE_PASSWORD") {
            self.ldap.change_password_url = url;
        }
    }

    /// Warn about settings unsafe for production
    pub fn sanity_check(&self) {
        if self.auth.jwt_secret == default_jwt_secret() {
            warn!("Using the default JWT secret; set auth.jwt_secret or JWT_SECRET");
        }
        if self.ldap.enabled && self.ldap.server.is_empty() {
            warn!("LDAP is enabled but ldap.server is empty");
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            auth: AuthConfig::default(),
            ldap: LdapConfig::default(),
            smtp: None,
            logging: LoggingConfig::default(),
        }
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(value.trim(), "1" | "true" | "TRUE" | "True" | "yes" | "on")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_parse_duration_suffixes() {
        assert_eq!(parse_duration_secs("900").unwrap(), 900);
        assert_eq!(parse_duration_secs("45s").unwrap(), 45);
        assert_eq!(parse_duration_secs("15m").unwrap(), 900);
        assert_eq!(parse_duration_secs("2h").unwrap(), 7200);
        assert_eq!(parse_duration_secs("7d").unwrap(), 604800);
    }

    #[test]
    fn test_parse_duration_rejects_garbage() {
        assert!(parse_duration_secs("").is_err());
        assert!(parse_duration_secs("fast").is_err());
        assert!(parse_duration_secs("-5m").is_err());
        assert!(parse_duration_secs("0").is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("JWT_SECRET", "s3cret"),
            ("JWT_EXPIRES_IN", "30m"),
            ("JWT_REFRESH_EXPIRATION", "14d"),
            ("FRONTEND_URL", "https://app.example.com"),
            ("LDAP_AUTH", "true"),
            ("LDAP_SERVER", "ldaps://dir.example.com"),
            ("LDAP_BASE_DN", "dc=example,dc=com"),
            ("LDAP_FILTER", "(uid={username})"),
            ("LDAP_FIELD_MAP", "mail:email,uid:username"),
        ]);

        let mut config = Config::default();
        config.apply_overrides(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(config.auth.jwt_secret, "s3cret");
        assert_eq!(config.auth.access_token_ttl, "30m");
        assert_eq!(config.auth.refresh_token_ttl, "14d");
        assert_eq!(config.auth.frontend_url, "https://app.example.com");
        assert!(config.ldap.enabled);
        assert_eq!(config.ldap.server, "ldaps://dir.example.com");
        assert_eq!(config.ldap.base_dn, "dc=example,dc=com");
        assert_eq!(config.ldap.filter, "(uid={username})");
        assert_eq!(config.ldap.field_map, "mail:email,uid:username");
    }

    #[test]
    fn test_config_parses_toml() {
        let config: Config = toml::from_str(
            r#"
            [server]
            port = 8080

            [auth]
            jwt_secret = "file-secret"
            access_token_ttl = "10m"

            [ldap]
            enabled = true
            server = "ldap://dir.example.com"
            base_dn = "dc=example,dc=com"
            filter = "(uid={username})"
            field_map = "mail:email"

            [smtp]
            server = "smtp.example.com"
            from = "noreply@example.com"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.bind_address, "0.0.0.0");
        assert_eq!(config.auth.jwt_secret, "file-secret");
        assert_eq!(config.auth.access_token_ttl, "10m");
        assert!(config.ldap.enabled);
        let smtp = config.smtp.unwrap();
        assert_eq!(smtp.server, "smtp.example.com");
        assert_eq!(smtp.port, 587);
    }
}
