//! TikTok adapter
//!
//! Video-only platform. Publishing uses the direct post API's
//! `PULL_FROM_URL` source, so the platform fetches the video itself from a
//! publicly reachable URL; raw bytes are never uploaded from here. Auth is
//! OAuth with transparent refresh in the request pipeline.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::cache::ResponseCache;
use crate::config::TikTokConfig;
use crate::credentials::OAuthCredentials;
use crate::error::{ApiError, Result};
use crate::http::{ApiClient, AuthScheme};
use crate::types::{
    AccountStats, CommentAuthor, CommentQuery, MediaBlob, MediaKind, MediaRef, PlatformId,
};

use super::{
    comment_cache_key, derive_stats, empty_if_gone, summarize, FetchedComment, MediaRequirement,
    PlatformClient, PostSample,
};

const STATS_FEED_LIMIT: u32 = 20;
const COMMENT_PAGE_SIZE: u32 = 50;

pub struct TikTokClient {
    client: ApiClient,
    stats_cache: ResponseCache<AccountStats>,
    comments_cache: ResponseCache<Vec<FetchedComment>>,
    cache_ttl: Duration,
}

impl TikTokClient {
    pub fn new(config: &TikTokConfig, creds: OAuthCredentials, cache_ttl: Duration) -> Result<Self> {
        Ok(Self {
            client: ApiClient::new(
                PlatformId::TikTok,
                config.base_url.clone(),
                AuthScheme::from_oauth(creds),
            )?,
            stats_cache: ResponseCache::new(),
            comments_cache: ResponseCache::new(),
            cache_ttl,
        })
    }

    async fn fetch_stats(&self) -> Result<AccountStats> {
        let body = serde_json::json!({ "max_count": STATS_FEED_LIMIT });
        let response: DataEnvelope<VideoList> = self
            .client
            .post_json(
                "/video/list/?fields=id,title,create_time,comment_count",
                body,
            )
            .await?;

        let samples = response
            .data
            .map(|d| d.videos)
            .unwrap_or_default()
            .into_iter()
            .map(|video| PostSample {
                platform_post_id: video.id,
                summary: summarize(video.title.as_deref().unwrap_or("")),
                created_at: video.create_time.unwrap_or(0),
                comment_count: video.comment_count.unwrap_or(0),
                // The list endpoint exposes counts only.
                recent_comments: Vec::new(),
            })
            .collect();
        Ok(derive_stats(samples))
    }
}

#[async_trait]
impl PlatformClient for TikTokClient {
    fn id(&self) -> PlatformId {
        PlatformId::TikTok
    }

    fn media_requirement(&self) -> MediaRequirement {
        MediaRequirement::VideoOnly
    }

    async fn create_post(
        &self,
        content: &str,
        media: Option<&MediaRef>,
        raw_media: Option<&MediaBlob>,
    ) -> Result<String> {
        let Some(media) = media else {
            if raw_media.is_some() {
                return Err(ApiError::MediaUnavailable(
                    "video bytes cannot be uploaded directly, a public URL is required".to_string(),
                )
                .into());
            }
            return Err(
                ApiError::InvalidRequest("a post without video cannot be published".to_string())
                    .into(),
            );
        };
        if media.kind != MediaKind::Video {
            return Err(
                ApiError::InvalidRequest("only video posts are supported".to_string()).into(),
            );
        }

        let body = serde_json::json!({
            "post_info": {
                "title": content,
                "privacy_level": "PUBLIC_TO_EVERYONE",
            },
            "source_info": {
                "source": "PULL_FROM_URL",
                "video_url": media.url,
            }
        });
        let response: DataEnvelope<PublishInit> = self
            .client
            .post_json("/post/publish/video/init/", body)
            .await?;
        response
            .data
            .map(|d| d.publish_id)
            .ok_or_else(|| ApiError::Unknown("publish init returned no data".to_string()).into())
    }

    async fn get_comments(
        &self,
        platform_post_id: &str,
        query: &CommentQuery,
    ) -> Result<Vec<FetchedComment>> {
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
        let mut body = serde_json::json!({
            "video_id": platform_post_id,
            "text": text,
        });
        if let Some(comment_id) = parent_comment_id {
            body["comment_id"] = serde_json::Value::String(comment_id.to_string());
        }
        let response: DataEnvelope<CreatedComment> = self
            .client
            .post_json("/comment/reply/create/", body)
            .await?;
        response
            .data
            .map(|d| d.comment_id)
            .ok_or_else(|| ApiError::Unknown("reply creation returned no data".to_string()).into())
    }

    async fn delete_comment(&self, platform_comment_id: &str) -> Result<()> {
        let body = serde_json::json!({ "comment_id": platform_comment_id });
        let _: DataEnvelope<serde_json::Value> =
            self.client.post_json("/comment/delete/", body).await?;
        Ok(())
    }

    async fn account_stats(&self) -> Result<AccountStats> {
        self.stats_cache
            .get("stats", self.cache_ttl, || self.fetch_stats())
            .await
    }
}

impl TikTokClient {
    async fn fetch_comments(
        &self,
        platform_post_id: &str,
        query: &CommentQuery,
    ) -> Result<Vec<FetchedComment>> {
        let mut body = serde_json::json!({
            "video_id": platform_post_id,
            "max_count": query.limit.unwrap_or(COMMENT_PAGE_SIZE),
        });
        if let Some(after) = &query.after {
            body["cursor"] = serde_json::Value::String(after.clone());
        }

        let result: Result<DataEnvelope<CommentList>> =
            self.client.post_json("/comment/list/", body).await;
        let comments = empty_if_gone(
            result.map(|e| e.data.map(|d| d.comments).unwrap_or_default()),
        )?;
        Ok(comments
            .into_iter()
            .map(|c| FetchedComment {
                platform_comment_id: c.comment_id,
                text: c.text,
                author: c
                    .user
                    .map(|u| CommentAuthor {
                        id: u.open_id,
                        display_name: u.display_name,
                        handle: None,
                        avatar_url: u.avatar_url,
                    })
                    .unwrap_or_default(),
                like_count: c.like_count.unwrap_or(0),
                created_at: c.create_time.unwrap_or(0),
            })
            .collect())
    }
}

#[derive(Deserialize)]
struct DataEnvelope<T> {
    data: Option<T>,
}

#[derive(Deserialize)]
struct PublishInit {
    publish_id: String,
}

#[derive(Deserialize)]
struct VideoList {
    #[serde(default)]
    videos: Vec<Video>,
}

#[derive(Deserialize)]
struct Video {
    id: String,
    title: Option<String>,
    create_time: Option<i64>,
    comment_count: Option<u64>,
}

#[derive(Deserialize)]
struct CommentList {
    #[serde(default)]
    comments: Vec<TikTokComment>,
}

#[derive(Deserialize)]
struct TikTokComment {
    comment_id: String,
    #[serde(default)]
    text: String,
    user: Option<TikTokUser>,
    like_count: Option<u64>,
    create_time: Option<i64>,
}

#[derive(Deserialize)]
struct TikTokUser {
    #[serde(default)]
    open_id: String,
    display_name: Option<String>,
    avatar_url: Option<String>,
}

#[derive(Deserialize)]
struct CreatedComment {
    comment_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn client() -> TikTokClient {
        let config = TikTokConfig {
            enabled: true,
            client_key: "ck".to_string(),
            client_secret_file: "/dev/null".to_string(),
            token_file: "/dev/null".to_string(),
            base_url: "https://open.example.test/v2".to_string(),
        };
        let creds = OAuthCredentials {
            access_token: SecretString::from("at".to_string()),
            refresh_token: SecretString::from("rt".to_string()),
            expires_at: None,
            client_id: "ck".to_string(),
            client_secret: SecretString::from("cs".to_string()),
            token_url: "https://open.example.test/v2/oauth/token/".to_string(),
        };
        TikTokClient::new(&config, creds, Duration::from_secs(300)).unwrap()
    }

    #[tokio::test]
    async fn test_create_post_rejects_text_only() {
        let result = client().create_post("just words", None, None).await;
        assert!(matches!(
            result,
            Err(crate::error::SyndicaError::Api(ApiError::InvalidRequest(_)))
        ));
    }

    #[tokio::test]
    async fn test_create_post_rejects_image_media() {
        let media = MediaRef {
            url: "https://cdn.example.test/a.jpg".to_string(),
            kind: MediaKind::Image,
        };
        let result = client().create_post("pic", Some(&media), None).await;
        assert!(matches!(
            result,
            Err(crate::error::SyndicaError::Api(ApiError::InvalidRequest(_)))
        ));
    }

    #[tokio::test]
    async fn test_create_post_rejects_raw_bytes() {
        let blob = MediaBlob {
            bytes: vec![0; 16],
            file_name: "clip.mp4".to_string(),
            mime: "video/mp4".to_string(),
            kind: MediaKind::Video,
        };
        let result = client().create_post("clip", None, Some(&blob)).await;
        assert!(matches!(
            result,
            Err(crate::error::SyndicaError::Api(ApiError::MediaUnavailable(
                _
            )))
        ));
    }

    #[test]
    fn test_comment_list_deserializes() {
        let raw = r#"{
            "data": {
                "comments": [
                    {"comment_id": "c1", "text": "cool", "like_count": 2,
                     "create_time": 1714564800,
                     "user": {"open_id": "u1", "display_name": "Ada"}}
                ]
            }
        }"#;
        let envelope: DataEnvelope<CommentList> = serde_json::from_str(raw).unwrap();
        let comments = envelope.data.unwrap().comments;
        assert_eq!(comments[0].comment_id, "c1");
        assert_eq!(comments[0].user.as_ref().unwrap().open_id, "u1");
    }
}
