//! Credential handling for platform adapters
//!
//! Adapters never reach into a global settings store: they receive an
//! explicit [`CredentialBundle`] at construction time. Bundles hold their
//! secret material in [`SecretString`] so tokens are zeroed on drop and can
//! never end up in `Debug` output or logs in cleartext. Encryption at rest
//! belongs to the settings collaborator; this module only defines the
//! decrypted in-memory shape and a plain token-file loader.

use std::collections::HashMap;
use std::fmt;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::config::Config;
use crate::error::{CredentialError, Result};
use crate::types::PlatformId;

/// Per-platform secret bundle, shaped after the platform's auth model.
#[derive(Clone)]
pub enum CredentialBundle {
    /// A long-lived access key attached to the query string of every request.
    AccessKey { key: SecretString },
    /// A static bearer token.
    Bearer { token: SecretString },
    /// OAuth material with a refreshable access token.
    OAuth(OAuthCredentials),
}

#[derive(Clone)]
pub struct OAuthCredentials {
    pub access_token: SecretString,
    pub refresh_token: SecretString,
    /// Unix timestamp after which the access token must be refreshed.
    pub expires_at: Option<i64>,
    pub client_id: String,
    pub client_secret: SecretString,
    pub token_url: String,
}

impl fmt::Debug for CredentialBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialBundle::AccessKey { .. } => write!(f, "CredentialBundle::AccessKey(***)"),
            CredentialBundle::Bearer { .. } => write!(f, "CredentialBundle::Bearer(***)"),
            CredentialBundle::OAuth(oauth) => f
                .debug_struct("CredentialBundle::OAuth")
                .field("client_id", &oauth.client_id)
                .field("token_url", &oauth.token_url)
                .field("expires_at", &oauth.expires_at)
                .finish_non_exhaustive(),
        }
    }
}

/// Source of decrypted credential bundles, consulted before any adapter is
/// constructed. `None` means the platform has no stored credentials.
pub trait CredentialStore: Send + Sync {
    fn bundle_for(&self, platform: PlatformId) -> Result<Option<CredentialBundle>>;
}

/// Token-file layout for OAuth platforms.
#[derive(Deserialize)]
struct OAuthTokenFile {
    access_token: String,
    refresh_token: String,
    expires_at: Option<i64>,
}

/// Reads credential material from the token files named in the config.
pub struct FileCredentialStore {
    config: Config,
}

impl FileCredentialStore {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    fn read_secret_file(path: &str) -> Result<SecretString> {
        let expanded = shellexpand::tilde(path).to_string();
        let content =
            std::fs::read_to_string(&expanded).map_err(|e| CredentialError::Unreadable {
                path: expanded.clone(),
                source: e,
            })?;
        Ok(SecretString::from(content.trim().to_string()))
    }

    fn read_oauth_file(
        platform: PlatformId,
        token_path: &str,
        client_id: &str,
        client_secret_path: &str,
        token_url: &str,
    ) -> Result<OAuthCredentials> {
        let expanded = shellexpand::tilde(token_path).to_string();
        let content =
            std::fs::read_to_string(&expanded).map_err(|e| CredentialError::Unreadable {
                path: expanded.clone(),
                source: e,
            })?;
        let parsed: OAuthTokenFile =
            serde_json::from_str(&content).map_err(|e| CredentialError::Malformed {
                platform: platform.to_string(),
                reason: format!("token file {}: {}", expanded, e),
            })?;
        Ok(OAuthCredentials {
            access_token: SecretString::from(parsed.access_token),
            refresh_token: SecretString::from(parsed.refresh_token),
            expires_at: parsed.expires_at,
            client_id: client_id.to_string(),
            client_secret: Self::read_secret_file(client_secret_path)?,
            token_url: token_url.to_string(),
        })
    }
}

impl CredentialStore for FileCredentialStore {
    fn bundle_for(&self, platform: PlatformId) -> Result<Option<CredentialBundle>> {
        match platform {
            PlatformId::Facebook => {
                let Some(fb) = &self.config.facebook else {
                    return Ok(None);
                };
                let key = Self::read_secret_file(&fb.access_token_file)?;
                if key.expose_secret().is_empty() {
                    return Err(CredentialError::Malformed {
                        platform: platform.to_string(),
                        reason: "access token file is empty".to_string(),
                    }
                    .into());
                }
                Ok(Some(CredentialBundle::AccessKey { key }))
            }
            PlatformId::Instagram => {
                let Some(ig) = &self.config.instagram else {
                    return Ok(None);
                };
                let token = Self::read_secret_file(&ig.access_token_file)?;
                if token.expose_secret().is_empty() {
                    return Err(CredentialError::Malformed {
                        platform: platform.to_string(),
                        reason: "access token file is empty".to_string(),
                    }
                    .into());
                }
                Ok(Some(CredentialBundle::Bearer { token }))
            }
            PlatformId::Twitter => {
                let Some(tw) = &self.config.twitter else {
                    return Ok(None);
                };
                let oauth = Self::read_oauth_file(
                    platform,
                    &tw.token_file,
                    &tw.client_id,
                    &tw.client_secret_file,
                    "https://api.twitter.com/2/oauth2/token",
                )?;
                Ok(Some(CredentialBundle::OAuth(oauth)))
            }
            PlatformId::TikTok => {
                let Some(tt) = &self.config.tiktok else {
                    return Ok(None);
                };
                let oauth = Self::read_oauth_file(
                    platform,
                    &tt.token_file,
                    &tt.client_key,
                    &tt.client_secret_file,
                    "https://open.tiktokapis.com/v2/oauth/token/",
                )?;
                Ok(Some(CredentialBundle::OAuth(oauth)))
            }
        }
    }
}

/// In-memory store for tests and embedding callers.
#[derive(Default)]
pub struct InMemoryCredentialStore {
    bundles: HashMap<PlatformId, CredentialBundle>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, platform: PlatformId, bundle: CredentialBundle) {
        self.bundles.insert(platform, bundle);
    }
}

impl CredentialStore for InMemoryCredentialStore {
    fn bundle_for(&self, platform: PlatformId) -> Result<Option<CredentialBundle>> {
        Ok(self.bundles.get(&platform).cloned())
    }
}
