//! LDAP SSO provider
//!
//! Two modes. Direct bind authenticates by binding the directory as the
//! supplied identifier. Search-then-bind first binds a service account,
//! locates the user's entry with a configurable filter, then binds as the
//! entry's DN. Every directory error is logged and reported as a
//! declination so the chain can fall through to local credentials.

use async_trait::async_trait;
use ldap3::{ldap_escape, Ldap, LdapConnAsync, LdapConnSettings, Scope, SearchEntry};
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, warn};

use super::{SsoProvider, SsoUserData, SSO_MASK_LDAP};

/// LDAP provider configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct LdapConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Bind directly as the end user instead of search-then-bind
    #[serde(default)]
    pub direct_bind: bool,
    /// Directory URL, e.g. "ldaps://ldap.example.com"
    #[serde(default)]
    pub server: String,
    #[serde(default)]
    pub base_dn: String,
    /// Service account for search-then-bind mode
    #[serde(default)]
    pub app_user: String,
    #[serde(default)]
    pub app_pass: String,
    /// Search filter template with a `{username}` placeholder,
    /// e.g. "(uid={username})"
    #[serde(default)]
    pub filter: String,
    /// Attribute mapping, comma list of `ldapAttr:localField` pairs,
    /// e.g. "mail:email,uid:username,cn:full_name"
    #[serde(default)]
    pub field_map: String,
    /// Where directory users change their password
    #[serde(default)]
    pub change_password_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    10
}

/// Error for an invalid `field_map` value, raised at startup
#[derive(Error, Debug)]
#[error("Invalid LDAP field map: {0}")]
pub struct FieldMapError(String);

/// User-record fields an LDAP attribute may map onto
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LocalField {
    Email,
    Username,
    FullName,
    Departments,
    Avatar,
}

impl FromStr for LocalField {
    type Err = FieldMapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "email" => Ok(LocalField::Email),
            "username" => Ok(LocalField::Username),
            "full_name" => Ok(LocalField::FullName),
            "departments" => Ok(LocalField::Departments),
            "avatar" => Ok(LocalField::Avatar),
            other => Err(FieldMapError(format!("unknown target field '{}'", other))),
        }
    }
}

/// Parse "ldapAttr:localField,..." into a typed mapping table
///
/// Unknown target fields and malformed pairs are rejected so a bad
/// mapping fails the process at startup instead of being merged silently.
fn parse_field_map(spec: &str) -> Result<Vec<(String, LocalField)>, FieldMapError> {
    let mut map = Vec::new();
    for pair in spec.split(',') {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        let (attr, field) = pair
            .split_once(':')
            .ok_or_else(|| FieldMapError(format!("malformed pair '{}'", pair)))?;
        let attr = attr.trim();
        if attr.is_empty() {
            return Err(FieldMapError(format!("empty attribute in '{}'", pair)));
        }
        map.push((attr.to_string(), field.trim().parse()?));
    }
    Ok(map)
}

/// LDAP-backed SSO provider
pub struct LdapProvider {
    config: LdapConfig,
    field_map: Vec<(String, LocalField)>,
}

impl LdapProvider {
    /// Build the provider, validating the field mapping
    pub fn new(config: LdapConfig) -> Result<Self, FieldMapError> {
        let field_map = parse_field_map(&config.field_map)?;
        Ok(Self { config, field_map })
    }

    fn op_timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs)
    }

    /// Open a connection to the directory and spawn its driver
    async fn connect(&self) -> Result<Ldap, ldap3::LdapError> {
        let settings = LdapConnSettings::new().set_conn_timeout(self.op_timeout());
        let (conn, ldap) = LdapConnAsync::with_settings(settings, &self.config.server).await?;
        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                warn!("LDAP connection error: {}", e);
            }
        });
        Ok(ldap)
    }

    async fn direct_bind(&self, identifier: &str, password: &str) -> Option<SsoUserData> {
        let mut ldap = match self.connect().await {
            Ok(ldap) => ldap,
            Err(e) => {
                error!("LDAP connection failed: {}", e);
                return None;
            }
        };

        let bind = ldap
            .with_timeout(self.op_timeout())
            .simple_bind(identifier, password)
            .await
            .and_then(|r| r.success());
        let _ = ldap.unbind().await;

        match bind {
            Ok(_) => Some(SsoUserData {
                email: identifier.to_string(),
                username: Some(identifier.to_string()),
                sso_mask: SSO_MASK_LDAP,
                ..Default::default()
            }),
            Err(e) => {
                debug!("Direct bind failed for {}: {}", identifier, e);
                None
            }
        }
    }

    async fn search_then_bind(&self, identifier: &str, password: &str) -> Option<SsoUserData> {
        let mut ldap = match self.connect().await {
            Ok(ldap) => ldap,
            Err(e) => {
                error!("LDAP connection failed: {}", e);
                return None;
            }
        };

        if let Err(e) = ldap
            .with_timeout(self.op_timeout())
            .simple_bind(&self.config.app_user, &self.config.app_pass)
            .await
            .and_then(|r| r.success())
        {
            debug!("App bind failed: {}", e);
            let _ = ldap.unbind().await;
            return None;
        }

        let filter = self
            .config
            .filter
            .replace("{username}", &ldap_escape(identifier));
        let attrs: Vec<&str> = self.field_map.iter().map(|(a, _)| a.as_str()).collect();

        let search = ldap
            .with_timeout(self.op_timeout())
            .search(&self.config.base_dn, Scope::Subtree, &filter, attrs)
            .await
            .and_then(|r| r.success());

        let entry = match search {
            Ok((entries, _)) => match entries.into_iter().next() {
                Some(entry) => SearchEntry::construct(entry),
                None => {
                    debug!("No directory entry matched {}", identifier);
                    let _ = ldap.unbind().await;
                    return None;
                }
            },
            Err(e) => {
                debug!("LDAP search error: {}", e);
                let _ = ldap.unbind().await;
                return None;
            }
        };

        // Re-bind the same connection as the located entry
        let user_bind = ldap
            .with_timeout(self.op_timeout())
            .simple_bind(&entry.dn, password)
            .await
            .and_then(|r| r.success());
        let _ = ldap.unbind().await;

        if let Err(e) = user_bind {
            debug!("User bind failed for {}: {}", entry.dn, e);
            return None;
        }

        let mut data = SsoUserData {
            sso_mask: SSO_MASK_LDAP,
            ..Default::default()
        };
        for (attr, field) in &self.field_map {
            let value = entry.attrs.get(attr).and_then(|v| v.first()).cloned();
            let Some(value) = value else { continue };
            match field {
                LocalField::Email => data.email = value,
                LocalField::Username => data.username = Some(value),
                LocalField::FullName => data.full_name = Some(value),
                LocalField::Departments => data.departments = Some(value),
                LocalField::Avatar => data.avatar = Some(value),
            }
        }
        if data.email.is_empty() {
            data.email = identifier.to_string();
        }
        Some(data)
    }
}

#[async_trait]
impl SsoProvider for LdapProvider {
    fn provider_name(&self) -> &'static str {
        "ldap"
    }

    fn sso_mask(&self) -> i64 {
        SSO_MASK_LDAP
    }

    fn change_password_url(&self) -> Option<String> {
        if self.config.change_password_url.is_empty() {
            None
        } else {
            Some(self.config.change_password_url.clone())
        }
    }

    async fn authenticate(&self, identifier: &str, password: &str) -> Option<SsoUserData> {
        if !self.config.enabled {
            return None;
        }
        // Empty passwords would otherwise turn into an anonymous bind,
        // which most directories report as success.
        if password.is_empty() {
            return None;
        }
        if self.config.direct_bind {
            self.direct_bind(identifier, password).await
        } else {
            self.search_then_bind(identifier, password).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_field_map() {
        let map = parse_field_map("mail:email, uid:username ,cn:full_name").unwrap();
        assert_eq!(map.len(), 3);
        assert_eq!(map[0], ("mail".to_string(), LocalField::Email));
        assert_eq!(map[1], ("uid".to_string(), LocalField::Username));
        assert_eq!(map[2], ("cn".to_string(), LocalField::FullName));
    }

    #[test]
    fn test_parse_field_map_empty() {
        assert!(parse_field_map("").unwrap().is_empty());
        assert!(parse_field_map(" , ").unwrap().is_empty());
    }

    #[test]
    fn test_parse_field_map_rejects_unknown_target() {
        assert!(parse_field_map("mail:email,x:shoe_size").is_err());
    }

    #[test]
    fn test_parse_field_map_rejects_malformed_pair() {
        assert!(parse_field_map("mailemail").is_err());
        assert!(parse_field_map(":email").is_err());
    }

    #[tokio::test]
    async fn test_disabled_provider_declines() {
        let provider = LdapProvider::new(LdapConfig::default()).unwrap();
        assert!(provider.authenticate("alice", "pw").await.is_none());
    }

    #[test]
    fn test_change_password_url_empty_means_none() {
        let provider = LdapProvider::new(LdapConfig::default()).unwrap();
        assert!(provider.change_password_url().is_none());

        let provider = LdapProvider::new(LdapConfig {
            change_password_url: "https://dir.example.com/pw".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            provider.change_password_url().as_deref(),
            Some("https://dir.example.com/pw")
        );
    }
}
