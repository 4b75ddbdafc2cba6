//! SSO provider chain
//!
//! External authenticators are tried in registration order; the first one
//! that resolves an identity wins. A provider must never fail the chain:
//! transport errors are logged inside the provider and reported as a
//! declination so the login falls through to local credentials.

pub mod ldap;

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

pub use ldap::{LdapConfig, LdapProvider};

/// Bitmask bit reserved for the LDAP provider
pub const SSO_MASK_LDAP: i64 = 2;

/// Identity resolved by an external provider for one authentication
/// attempt. Merged into a user record and discarded.
#[derive(Debug, Clone, Default)]
pub struct SsoUserData {
    pub email: String,
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub departments: Option<String>,
    pub avatar: Option<String>,
    pub sso_mask: i64,
}

/// A pluggable external authenticator
#[async_trait]
pub trait SsoProvider: Send + Sync {
    /// Technical name ("ldap", "google", ...)
    fn provider_name(&self) -> &'static str;

    /// The bit this provider sets in a user's SSO mask
    fn sso_mask(&self) -> i64;

    /// Where users of this provider change their password, if exposed
    fn change_password_url(&self) -> Option<String>;

    /// Try to authenticate; `None` means "this provider declines"
    async fn authenticate(&self, identifier: &str, password: &str) -> Option<SsoUserData>;
}

/// A provider's change-password link, offered to users whose account mask
/// carries that provider's bit
#[derive(Debug, Clone, Serialize)]
pub struct SsoPasswordLink {
    pub provider: String,
    pub url: String,
}

/// Ordered chain of enabled SSO providers
#[derive(Clone, Default)]
pub struct SsoChain {
    providers: Vec<Arc<dyn SsoProvider>>,
}

impl SsoChain {
    pub fn new() -> Self {
        Self { providers: Vec::new() }
    }

    /// Register a provider at the end of the chain. Only enabled
    /// providers should be registered; the chain does not re-check.
    pub fn register(&mut self, provider: Arc<dyn SsoProvider>) {
        debug!("Registering SSO provider: {}", provider.provider_name());
        self.providers.push(provider);
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Try each provider in order; first success wins
    pub async fn authenticate(&self, identifier: &str, password: &str) -> Option<SsoUserData> {
        for provider in &self.providers {
            if let Some(data) = provider.authenticate(identifier, password).await {
                debug!(
                    "SSO provider {} authenticated {}",
                    provider.provider_name(),
                    identifier
                );
                return Some(data);
            }
        }
        None
    }

    /// Change-password links for the providers flagged in the given mask
    ///
    /// Providers without a change-password URL are skipped.
    pub fn change_password_links(&self, sso_mask: i64) -> Vec<SsoPasswordLink> {
        self.providers
            .iter()
            .filter(|p| p.sso_mask() & sso_mask != 0)
            .filter_map(|p| {
                p.change_password_url().map(|url| SsoPasswordLink {
                    provider: p.provider_name().to_string(),
                    url,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeProvider {
        name: &'static str,
        mask: i64,
        url: Option<String>,
        accepts: Option<(&'static str, &'static str)>,
    }

    #[async_trait]
    impl SsoProvider for FakeProvider {
        fn provider_name(&self) -> &'static str {
            self.name
        }
        fn sso_mask(&self) -> i64 {
            self.mask
        }
        fn change_password_url(&self) -> Option<String> {
            self.url.clone()
        }
        async fn authenticate(&self, identifier: &str, password: &str) -> Option<SsoUserData> {
            match self.accepts {
                Some((u, p)) if u == identifier && p == password => Some(SsoUserData {
                    email: format!("{}@{}.example.com", identifier, self.name),
                    sso_mask: self.mask,
                    ..Default::default()
                }),
                _ => None,
            }
        }
    }

    #[tokio::test]
    async fn test_first_success_wins() {
        let mut chain = SsoChain::new();
        chain.register(Arc::new(FakeProvider {
            name: "first",
            mask: 2,
            url: None,
            accepts: Some(("bob", "pw")),
        }));
        chain.register(Arc::new(FakeProvider {
            name: "second",
            mask: 4,
            url: None,
            accepts: Some(("bob", "pw")),
        }));

        let data = chain.authenticate("bob", "pw").await.unwrap();
        assert_eq!(data.email, "bob@first.example.com");
        assert_eq!(data.sso_mask, 2);
    }

    #[tokio::test]
    async fn test_all_decline_returns_none() {
        let mut chain = SsoChain::new();
        chain.register(Arc::new(FakeProvider {
            name: "first",
            mask: 2,
            url: None,
            accepts: Some(("bob", "pw")),
        }));
        assert!(chain.authenticate("bob", "wrong").await.is_none());
        assert!(chain.authenticate("eve", "pw").await.is_none());
    }

    #[tokio::test]
    async fn test_change_password_links_filter_by_mask_and_url() {
        let mut chain = SsoChain::new();
        chain.register(Arc::new(FakeProvider {
            name: "ldap",
            mask: 2,
            url: Some("https://dir.example.com/password".to_string()),
            accepts: None,
        }));
        chain.register(Arc::new(FakeProvider {
            name: "other",
            mask: 4,
            url: None,
            accepts: None,
        }));

        // Bit 2 set: ldap link only (other has no URL anyway)
        let links = chain.change_password_links(2);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].provider, "ldap");

        // Bit 4 only: provider matches but exposes no URL
        assert!(chain.change_password_links(4).is_empty());

        // Local-only account
        assert!(chain.change_password_links(0).is_empty());
    }
}
