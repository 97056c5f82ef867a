//! Adapter registry
//!
//! Builds one adapter per enabled platform at startup. Construction fails
//! fast: a platform that is toggled on but has no usable credentials stops
//! the build with a hint naming what to fix, rather than surfacing a
//! confusing API error on first use.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::config::Config;
use crate::credentials::{CredentialBundle, CredentialStore};
use crate::error::{CredentialError, Result};
use crate::platforms::{
    FacebookClient, InstagramClient, PlatformClient, TikTokClient, TwitterClient,
};
use crate::types::PlatformId;

pub struct AdapterRegistry {
    adapters: BTreeMap<PlatformId, Arc<dyn PlatformClient>>,
}

impl AdapterRegistry {
    pub fn empty() -> Self {
        Self {
            adapters: BTreeMap::new(),
        }
    }

    /// Construct adapters for every platform the config toggles on.
    pub fn build(config: &Config, credentials: &dyn CredentialStore) -> Result<Self> {
        let cache_ttl = Duration::from_secs(config.cache.ttl_secs);
        let mut registry = Self::empty();

        for platform in config.enabled_platforms() {
            let bundle = credentials.bundle_for(platform)?.ok_or_else(|| {
                CredentialError::Missing {
                    platform: platform.to_string(),
                    hint: format!("add a [{}] credential section to the config", platform),
                }
            })?;
            let adapter = build_adapter(config, platform, bundle, cache_ttl)?;
            registry.register(adapter);
        }

        info!(
            platforms = ?registry.platforms(),
            "adapter registry built"
        );
        Ok(registry)
    }

    /// Rebuild after a config or credential change.
    pub fn rebuild(&mut self, config: &Config, credentials: &dyn CredentialStore) -> Result<()> {
        *self = Self::build(config, credentials)?;
        Ok(())
    }

    pub fn register(&mut self, adapter: Arc<dyn PlatformClient>) {
        self.adapters.insert(adapter.id(), adapter);
    }

    pub fn get(&self, platform: PlatformId) -> Option<Arc<dyn PlatformClient>> {
        self.adapters.get(&platform).cloned()
    }

    /// Adapters in stable platform order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn PlatformClient>> {
        self.adapters.values()
    }

    pub fn platforms(&self) -> Vec<PlatformId> {
        self.adapters.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

fn build_adapter(
    config: &Config,
    platform: PlatformId,
    bundle: CredentialBundle,
    cache_ttl: Duration,
) -> Result<Arc<dyn PlatformClient>> {
    let malformed = |expected: &str| CredentialError::Malformed {
        platform: platform.to_string(),
        reason: format!("expected {} credentials", expected),
    };

    match platform {
        PlatformId::Facebook => {
            let Some(fb) = &config.facebook else {
                return Err(malformed("page").into());
            };
            let CredentialBundle::AccessKey { key } = bundle else {
                return Err(malformed("access key").into());
            };
            Ok(Arc::new(FacebookClient::new(fb, key, cache_ttl)?))
        }
        PlatformId::Instagram => {
            let Some(ig) = &config.instagram else {
                return Err(malformed("account").into());
            };
            let CredentialBundle::Bearer { token } = bundle else {
                return Err(malformed("bearer token").into());
            };
            Ok(Arc::new(InstagramClient::new(ig, token, cache_ttl)?))
        }
        PlatformId::Twitter => {
            let Some(tw) = &config.twitter else {
                return Err(malformed("app").into());
            };
            let CredentialBundle::OAuth(creds) = bundle else {
                return Err(malformed("OAuth").into());
            };
            Ok(Arc::new(TwitterClient::new(tw, creds, cache_ttl)?))
        }
        PlatformId::TikTok => {
            let Some(tt) = &config.tiktok else {
                return Err(malformed("app").into());
            };
            let CredentialBundle::OAuth(creds) = bundle else {
                return Err(malformed("OAuth").into());
            };
            Ok(Arc::new(TikTokClient::new(tt, creds, cache_ttl)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::InMemoryCredentialStore;
    use crate::platforms::MockPlatform;
    use secrecy::SecretString;

    fn config_with_facebook() -> Config {
        toml::from_str(
            r#"
            [facebook]
            enabled = true
            page_id = "p1"
            access_token_file = "/tmp/unused"
            "#,
        )
        .unwrap()
    }

    #[test]
    fn test_build_fails_fast_without_credentials() {
        let config = config_with_facebook();
        let store = InMemoryCredentialStore::new();
        let result = AdapterRegistry::build(&config, &store);
        assert!(matches!(
            result,
            Err(crate::error::SyndicaError::Credential(
                CredentialError::Missing { .. }
            ))
        ));
    }

    #[test]
    fn test_build_rejects_wrong_bundle_shape() {
        let config = config_with_facebook();
        let mut store = InMemoryCredentialStore::new();
        store.insert(
            PlatformId::Facebook,
            CredentialBundle::Bearer {
                token: SecretString::from("t".to_string()),
            },
        );
        let result = AdapterRegistry::build(&config, &store);
        assert!(matches!(
            result,
            Err(crate::error::SyndicaError::Credential(
                CredentialError::Malformed { .. }
            ))
        ));
    }

    #[test]
    fn test_build_constructs_enabled_adapters() {
        let config = config_with_facebook();
        let mut store = InMemoryCredentialStore::new();
        store.insert(
            PlatformId::Facebook,
            CredentialBundle::AccessKey {
                key: SecretString::from("k".to_string()),
            },
        );
        let registry = AdapterRegistry::build(&config, &store).unwrap();
        assert_eq!(registry.platforms(), vec![PlatformId::Facebook]);
        assert!(registry.get(PlatformId::Facebook).is_some());
        assert!(registry.get(PlatformId::Twitter).is_none());
    }

    #[test]
    fn test_disabled_platform_is_skipped_entirely() {
        let config: Config = toml::from_str(
            r#"
            [facebook]
            enabled = false
            page_id = "p1"
            access_token_file = "/tmp/unused"
            "#,
        )
        .unwrap();
        // No credentials anywhere, but nothing is enabled either.
        let registry = AdapterRegistry::build(&config, &InMemoryCredentialStore::new()).unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_register_and_stable_order() {
        let mut registry = AdapterRegistry::empty();
        registry.register(Arc::new(MockPlatform::new(PlatformId::TikTok)));
        registry.register(Arc::new(MockPlatform::new(PlatformId::Facebook)));
        assert_eq!(
            registry.platforms(),
            vec![PlatformId::Facebook, PlatformId::TikTok]
        );
    }
}
