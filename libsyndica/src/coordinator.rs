//! Multi-platform fan-out
//!
//! Publishes one post to every platform it targets. Platforms are
//! independent: a failure on one is recorded and the loop moves on, so a
//! single bad adapter can never sink the whole batch. The coordinator
//! produces the per-platform result map and leaves its interpretation to
//! the post store.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{info, warn};

use crate::error::Result;
use crate::platforms::MediaRequirement;
use crate::registry::AdapterRegistry;
use crate::types::{AccountStats, MediaKind, PlatformId, Post, PublishResult};

pub struct Coordinator {
    registry: Arc<AdapterRegistry>,
}

impl Coordinator {
    pub fn new(registry: Arc<AdapterRegistry>) -> Self {
        Self { registry }
    }

    /// Fan a post out to each of its target platforms in turn.
    ///
    /// Every targeted platform gets an entry in the result: `Some(id)` on
    /// success, `None` for failures and local skips.
    pub async fn publish(&self, post: &Post) -> PublishResult {
        let mut result: PublishResult = BTreeMap::new();

        for &platform in &post.platforms {
            let Some(adapter) = self.registry.get(platform) else {
                warn!(%platform, "platform not configured, skipping");
                result.insert(platform, None);
                continue;
            };

            // Media requirements are checked locally so an attempt that can
            // only fail never reaches the network.
            if let Some(reason) = media_gate(adapter.media_requirement(), post) {
                warn!(%platform, reason, "skipping platform");
                result.insert(platform, None);
                continue;
            }

            match adapter
                .create_post(&post.content, post.media.as_ref(), post.raw_media.as_ref())
                .await
            {
                Ok(id) => {
                    info!(%platform, id, "published");
                    result.insert(platform, Some(id));
                }
                Err(e) => {
                    warn!(%platform, error = %e, "publish failed");
                    result.insert(platform, None);
                }
            }
        }

        result
    }

    /// Gather account statistics from every configured platform. Failures
    /// stay per-platform; one unreachable platform does not hide the rest.
    pub async fn collect_stats(&self) -> BTreeMap<PlatformId, Result<AccountStats>> {
        let mut out = BTreeMap::new();
        for adapter in self.registry.iter() {
            let stats = adapter.account_stats().await;
            if let Err(e) = &stats {
                warn!(platform = %adapter.id(), error = %e, "stats fetch failed");
            }
            out.insert(adapter.id(), stats);
        }
        out
    }
}

/// Returns the reason a post cannot be published on a platform with the
/// given media requirement, or `None` when it can.
fn media_gate(requirement: MediaRequirement, post: &Post) -> Option<&'static str> {
    let has_media = post.media.is_some() || post.raw_media.is_some();
    let has_video = post
        .media
        .as_ref()
        .map(|m| m.kind == MediaKind::Video)
        .or_else(|| post.raw_media.as_ref().map(|m| m.kind == MediaKind::Video))
        .unwrap_or(false);

    match requirement {
        MediaRequirement::Optional => None,
        MediaRequirement::MediaRequired if !has_media => Some("platform requires media"),
        MediaRequirement::VideoOnly if !has_video => Some("platform requires video media"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use crate::platforms::MockPlatform;
    use crate::types::MediaRef;

    fn registry_with(mocks: Vec<Arc<MockPlatform>>) -> Arc<AdapterRegistry> {
        let mut registry = AdapterRegistry::empty();
        for mock in mocks {
            registry.register(mock);
        }
        Arc::new(registry)
    }

    #[tokio::test]
    async fn test_publish_all_succeed() {
        let fb = Arc::new(MockPlatform::new(PlatformId::Facebook));
        let tw = Arc::new(MockPlatform::new(PlatformId::Twitter));
        let coordinator = Coordinator::new(registry_with(vec![fb.clone(), tw.clone()]));

        let post = Post::new(
            "hello".to_string(),
            vec![PlatformId::Facebook, PlatformId::Twitter],
        );
        let result = coordinator.publish(&post).await;

        assert_eq!(
            result.get(&PlatformId::Facebook).unwrap().as_deref(),
            Some("facebook-post-1")
        );
        assert_eq!(
            result.get(&PlatformId::Twitter).unwrap().as_deref(),
            Some("twitter-post-1")
        );
    }

    #[tokio::test]
    async fn test_publish_partial_failure_continues() {
        let fb = Arc::new(MockPlatform::new(PlatformId::Facebook));
        fb.fail_create(ApiError::PlatformUnavailable("503".to_string()));
        let tw = Arc::new(MockPlatform::new(PlatformId::Twitter));
        let coordinator = Coordinator::new(registry_with(vec![fb.clone(), tw.clone()]));

        let post = Post::new(
            "hello".to_string(),
            vec![PlatformId::Facebook, PlatformId::Twitter],
        );
        let result = coordinator.publish(&post).await;

        assert!(result.get(&PlatformId::Facebook).unwrap().is_none());
        assert!(result.get(&PlatformId::Twitter).unwrap().is_some());
        // The later platform was still attempted.
        assert_eq!(tw.create_calls(), 1);
    }

    #[tokio::test]
    async fn test_publish_unconfigured_platform_records_none() {
        let coordinator = Coordinator::new(registry_with(vec![]));
        let post = Post::new("hello".to_string(), vec![PlatformId::TikTok]);
        let result = coordinator.publish(&post).await;
        assert_eq!(result.get(&PlatformId::TikTok), Some(&None));
    }

    #[tokio::test]
    async fn test_media_gate_skips_without_network() {
        let ig = Arc::new(
            MockPlatform::new(PlatformId::Instagram)
                .with_media_requirement(MediaRequirement::MediaRequired),
        );
        let coordinator = Coordinator::new(registry_with(vec![ig.clone()]));

        let post = Post::new("text only".to_string(), vec![PlatformId::Instagram]);
        let result = coordinator.publish(&post).await;

        assert_eq!(result.get(&PlatformId::Instagram), Some(&None));
        assert_eq!(ig.create_calls(), 0, "no request should be attempted");
    }

    #[tokio::test]
    async fn test_video_only_gate() {
        let tt = Arc::new(
            MockPlatform::new(PlatformId::TikTok)
                .with_media_requirement(MediaRequirement::VideoOnly),
        );
        let coordinator = Coordinator::new(registry_with(vec![tt.clone()]));

        let image_post = Post::new("pic".to_string(), vec![PlatformId::TikTok]).with_media(
            MediaRef {
                url: "https://cdn.example.test/a.jpg".to_string(),
                kind: MediaKind::Image,
            },
        );
        let result = coordinator.publish(&image_post).await;
        assert_eq!(result.get(&PlatformId::TikTok), Some(&None));
        assert_eq!(tt.create_calls(), 0);

        let video_post = Post::new("clip".to_string(), vec![PlatformId::TikTok]).with_media(
            MediaRef {
                url: "https://cdn.example.test/a.mp4".to_string(),
                kind: MediaKind::Video,
            },
        );
        let result = coordinator.publish(&video_post).await;
        assert!(result.get(&PlatformId::TikTok).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_collect_stats_keeps_failures_per_platform() {
        let fb = Arc::new(MockPlatform::new(PlatformId::Facebook));
        fb.fail_stats(ApiError::NetworkUnreachable("down".to_string()));
        let tw = Arc::new(MockPlatform::new(PlatformId::Twitter));
        let coordinator = Coordinator::new(registry_with(vec![fb, tw]));

        let stats = coordinator.collect_stats().await;
        assert!(stats.get(&PlatformId::Facebook).unwrap().is_err());
        assert!(stats.get(&PlatformId::Twitter).unwrap().is_ok());
    }
}
