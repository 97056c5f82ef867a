//! Instagram professional account adapter
//!
//! Publishing goes through the content publishing API's two-step container
//! flow: create a media container from a publicly reachable URL, then
//! publish it. Instagram cannot ingest raw bytes, so a post that only has
//! local media either fails with `MediaUnavailable` or, when simulation
//! mode is enabled, gets a locally minted `sim-` identifier. Simulated
//! posts short-circuit reads and refuse writes.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;
use serde::Deserialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::cache::ResponseCache;
use crate::config::InstagramConfig;
use crate::error::{ApiError, Result};
use crate::http::{ApiClient, AuthScheme};
use crate::types::{
    AccountStats, CommentAuthor, CommentQuery, MediaBlob, MediaKind, MediaRef, PlatformId,
};

use super::{
    comment_cache_key, derive_stats, empty_if_gone, is_simulated_id, parse_iso_time, summarize,
    FetchedComment, MediaRequirement, PlatformClient, PostSample, SIMULATED_ID_PREFIX,
};

const STATS_FEED_LIMIT: u32 = 25;

pub struct InstagramClient {
    client: ApiClient,
    account_id: String,
    simulate_demo_media: bool,
    stats_cache: ResponseCache<AccountStats>,
    comments_cache: ResponseCache<Vec<FetchedComment>>,
    cache_ttl: Duration,
}

impl InstagramClient {
    pub fn new(config: &InstagramConfig, token: SecretString, cache_ttl: Duration) -> Result<Self> {
        Ok(Self {
            client: ApiClient::new(
                PlatformId::Instagram,
                config.base_url.clone(),
                AuthScheme::Bearer(token),
            )?,
            account_id: config.account_id.clone(),
            simulate_demo_media: config.simulate_demo_media,
            stats_cache: ResponseCache::new(),
            comments_cache: ResponseCache::new(),
            cache_ttl,
        })
    }

    /// Container flow: create, then publish.
    async fn publish_container(&self, content: &str, media: &MediaRef) -> Result<String> {
        let path = format!("/{}/media", self.account_id);
        let mut fields = vec![("caption", content.to_string())];
        match media.kind {
            MediaKind::Image => fields.push(("image_url", media.url.clone())),
            MediaKind::Video => {
                fields.push(("video_url", media.url.clone()));
                fields.push(("media_type", "REELS".to_string()));
            }
        }
        let container: ObjectId = self.client.post_form(&path, &[], &fields).await?;
        debug!(container = %container.id, "media container created");

        let publish_path = format!("/{}/media_publish", self.account_id);
        let published: ObjectId = self
            .client
            .post_form(&publish_path, &[], &[("creation_id", container.id)])
            .await?;
        Ok(published.id)
    }

    async fn fetch_stats(&self) -> Result<AccountStats> {
        let path = format!("/{}/media", self.account_id);
        let query = [
            (
                "fields",
                "id,caption,timestamp,comments_count,comments.limit(5){text,timestamp}".to_string(),
            ),
            ("limit", STATS_FEED_LIMIT.to_string()),
        ];
        let feed: Page<MediaItem> = self.client.get_json(&path, &query).await?;

        let samples = feed
            .data
            .into_iter()
            .map(|item| PostSample {
                platform_post_id: item.id,
                summary: summarize(item.caption.as_deref().unwrap_or("")),
                created_at: parse_iso_time(&item.timestamp),
                comment_count: item.comments_count.unwrap_or(0),
                recent_comments: item
                    .comments
                    .map(|edge| {
                        edge.data
                            .into_iter()
                            .map(|c| (summarize(&c.text), parse_iso_time(&c.timestamp)))
                            .collect()
                    })
                    .unwrap_or_default(),
            })
            .collect();
        Ok(derive_stats(samples))
    }

    async fn fetch_comments(
        &self,
        platform_post_id: &str,
        query: &CommentQuery,
    ) -> Result<Vec<FetchedComment>> {
        let path = format!("/{}/comments", platform_post_id);
        let mut params = vec![(
            "fields",
            "id,text,username,like_count,timestamp".to_string(),
        )];
        if let Some(limit) = query.limit {
            params.push(("limit", limit.to_string()));
        }
        if let Some(after) = &query.after {
            params.push(("after", after.clone()));
        }

        let result: Result<Page<IgComment>> = self.client.get_json(&path, &params).await;
        let comments = empty_if_gone(result.map(|page| page.data))?;
        Ok(comments
            .into_iter()
            .map(|c| FetchedComment {
                platform_comment_id: c.id,
                text: c.text,
                author: CommentAuthor {
                    id: c.username.clone().unwrap_or_default(),
                    display_name: None,
                    handle: c.username,
                    avatar_url: None,
                },
                like_count: c.like_count.unwrap_or(0),
                created_at: parse_iso_time(&c.timestamp),
            })
            .collect())
    }

    fn refuse_simulated(&self, id: &str, action: &str) -> Result<()> {
        if is_simulated_id(id) {
            return Err(ApiError::InvalidRequest(format!(
                "cannot {} on simulated post {}",
                action, id
            ))
            .into());
        }
        Ok(())
    }
}

#[async_trait]
impl PlatformClient for InstagramClient {
    fn id(&self) -> PlatformId {
        PlatformId::Instagram
    }

    fn media_requirement(&self) -> MediaRequirement {
        MediaRequirement::MediaRequired
    }

    async fn create_post(
        &self,
        content: &str,
        media: Option<&MediaRef>,
        raw_media: Option<&MediaBlob>,
    ) -> Result<String> {
        if let Some(media) = media {
            return self.publish_container(content, media).await;
        }

        if raw_media.is_some() {
            if self.simulate_demo_media {
                let id = format!("{}{}", SIMULATED_ID_PREFIX, Uuid::new_v4());
                info!(%id, "no public media URL available, minting simulated post");
                return Ok(id);
            }
            return Err(ApiError::MediaUnavailable(
                "media bytes cannot be uploaded directly, a public URL is required".to_string(),
            )
            .into());
        }

        Err(ApiError::InvalidRequest("a post without media cannot be published".to_string()).into())
    }

    async fn get_comments(
        &self,
        platform_post_id: &str,
        query: &CommentQuery,
    ) -> Result<Vec<FetchedComment>> {
        // A simulated post never existed remotely; asking would only 404.
        // Short-circuit before the cache so simulated ids never occupy slots.
        if is_simulated_id(platform_post_id) {
            return Ok(Vec::new());
        }

        let key = comment_cache_key(platform_post_id, query);
        self.comments_cache
            .get(&key, self.cache_ttl, || {
                self.fetch_comments(platform_post_id, query)
            })
            .await
    }

    async fn reply_to_comment(
        &self,
        platform_post_id: &str,
        text: &str,
        parent_comment_id: Option<&str>,
    ) -> Result<String> {
        self.refuse_simulated(platform_post_id, "reply")?;

        // Threaded replies use the comment's replies edge.
        let path = match parent_comment_id {
            Some(comment_id) => format!("/{}/replies", comment_id),
            None => format!("/{}/comments", platform_post_id),
        };
        let response: ObjectId = self
            .client
            .post_form(&path, &[], &[("message", text.to_string())])
            .await?;
        Ok(response.id)
    }

    async fn delete_comment(&self, platform_comment_id: &str) -> Result<()> {
        self.refuse_simulated(platform_comment_id, "delete")?;
        let path = format!("/{}", platform_comment_id);
        let _: DeleteResponse = self.client.delete_json(&path, &[]).await?;
        Ok(())
    }

    async fn account_stats(&self) -> Result<AccountStats> {
        self.stats_cache
            .get("stats", self.cache_ttl, || self.fetch_stats())
            .await
    }
}

#[derive(Deserialize)]
struct ObjectId {
    id: String,
}

#[derive(Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[derive(Deserialize)]
struct IgComment {
    id: String,
    #[serde(default)]
    text: String,
    username: Option<String>,
    like_count: Option<u64>,
    timestamp: String,
}

#[derive(Deserialize)]
struct MediaItem {
    id: String,
    caption: Option<String>,
    timestamp: String,
    comments_count: Option<u64>,
    comments: Option<CommentsEdge>,
}

#[derive(Deserialize)]
struct CommentsEdge {
    #[serde(default)]
    data: Vec<EdgeComment>,
}

#[derive(Deserialize)]
struct EdgeComment {
    #[serde(default)]
    text: String,
    timestamp: String,
}

#[derive(Deserialize)]
struct DeleteResponse {
    #[serde(default)]
    #[allow(dead_code)]
    success: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MediaKind;

    fn client(simulate: bool) -> InstagramClient {
        let config = InstagramConfig {
            enabled: true,
            account_id: "acct-1".to_string(),
            access_token_file: "/dev/null".to_string(),
            base_url: "https://graph.example.test/v19.0".to_string(),
            simulate_demo_media: simulate,
        };
        InstagramClient::new(
            &config,
            SecretString::from("token".to_string()),
            Duration::from_secs(300),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_create_post_without_media_is_invalid() {
        let result = client(false).create_post("text only", None, None).await;
        assert!(matches!(
            result,
            Err(crate::error::SyndicaError::Api(ApiError::InvalidRequest(_)))
        ));
    }

    #[tokio::test]
    async fn test_raw_media_without_simulation_is_unavailable() {
        let blob = MediaBlob {
            bytes: vec![1, 2, 3],
            file_name: "a.jpg".to_string(),
            mime: "image/jpeg".to_string(),
            kind: MediaKind::Image,
        };
        let result = client(false).create_post("pic", None, Some(&blob)).await;
        assert!(matches!(
            result,
            Err(crate::error::SyndicaError::Api(ApiError::MediaUnavailable(
                _
            )))
        ));
    }

    #[tokio::test]
    async fn test_raw_media_with_simulation_mints_sim_id() {
        let blob = MediaBlob {
            bytes: vec![1, 2, 3],
            file_name: "a.jpg".to_string(),
            mime: "image/jpeg".to_string(),
            kind: MediaKind::Image,
        };
        let id = client(true)
            .create_post("pic", None, Some(&blob))
            .await
            .unwrap();
        assert!(is_simulated_id(&id));
    }

    #[tokio::test]
    async fn test_simulated_post_reads_empty_without_network() {
        // Base URL is unreachable; a network attempt would error out.
        let comments = client(true)
            .get_comments("sim-0000", &CommentQuery::default())
            .await
            .unwrap();
        assert!(comments.is_empty());
    }

    #[tokio::test]
    async fn test_simulated_post_refuses_writes() {
        let c = client(true);
        assert!(c.reply_to_comment("sim-0000", "hi", None).await.is_err());
        assert!(c.delete_comment("sim-0000").await.is_err());
    }
}
