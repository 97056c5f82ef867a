//! Facebook page adapter
//!
//! Publishes through the Graph API as a page. Auth is a page access token
//! carried in the query string of every request. This is the one platform
//! that accepts raw media bytes directly, via multipart upload to the
//! photos and videos edges.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;
use serde::Deserialize;
use tracing::debug;

use crate::cache::ResponseCache;
use crate::config::FacebookConfig;
use crate::error::{ApiError, Result};
use crate::http::{ApiClient, AuthScheme};
use crate::types::{
    AccountStats, CommentAuthor, CommentQuery, MediaBlob, MediaKind, MediaRef, PlatformId,
};

use super::{
    comment_cache_key, derive_stats, empty_if_gone, parse_iso_time, summarize, FetchedComment,
    MediaRequirement, PlatformClient, PostSample,
};

const STATS_FEED_LIMIT: u32 = 25;

pub struct FacebookClient {
    client: ApiClient,
    page_id: String,
    stats_cache: ResponseCache<AccountStats>,
    comments_cache: ResponseCache<Vec<FetchedComment>>,
    cache_ttl: Duration,
}

impl FacebookClient {
    pub fn new(config: &FacebookConfig, access_key: SecretString, cache_ttl: Duration) -> Result<Self> {
        let auth = AuthScheme::QueryKey {
            param: "access_token".to_string(),
            key: access_key,
        };
        Ok(Self {
            client: ApiClient::new(PlatformId::Facebook, config.base_url.clone(), auth)?,
            page_id: config.page_id.clone(),
            stats_cache: ResponseCache::new(),
            comments_cache: ResponseCache::new(),
            cache_ttl,
        })
    }

    async fn upload_blob(&self, content: &str, blob: &MediaBlob) -> Result<String> {
        let part = reqwest::multipart::Part::bytes(blob.bytes.clone())
            .file_name(blob.file_name.clone())
            .mime_str(&blob.mime)
            .map_err(|e| ApiError::InvalidRequest(format!("invalid media mime type: {}", e)))?;

        let (path, text_field) = match blob.kind {
            MediaKind::Image => (format!("/{}/photos", self.page_id), "caption"),
            MediaKind::Video => (format!("/{}/videos", self.page_id), "description"),
        };
        let form = reqwest::multipart::Form::new()
            .part("source", part)
            .text(text_field.to_string(), content.to_string());

        let response: CreatedObject = self.client.post_multipart(&path, &[], form).await?;
        Ok(response.into_post_id())
    }

    async fn publish_media_url(&self, content: &str, media: &MediaRef) -> Result<String> {
        let (path, fields): (String, Vec<(&str, String)>) = match media.kind {
            MediaKind::Image => (
                format!("/{}/photos", self.page_id),
                vec![
                    ("url", media.url.clone()),
                    ("caption", content.to_string()),
                ],
            ),
            MediaKind::Video => (
                format!("/{}/videos", self.page_id),
                vec![
                    ("file_url", media.url.clone()),
                    ("description", content.to_string()),
                ],
            ),
        };
        let response: CreatedObject = self.client.post_form(&path, &[], &fields).await?;
        Ok(response.into_post_id())
    }

    async fn fetch_stats(&self) -> Result<AccountStats> {
        let path = format!("/{}/posts", self.page_id);
        let query = [
            (
                "fields",
                concat!(
                    "id,message,created_time,",
                    "comments.summary(true).limit(5){message,created_time}"
                )
                .to_string(),
            ),
            ("limit", STATS_FEED_LIMIT.to_string()),
        ];
        let feed: Page<FeedPost> = self.client.get_json(&path, &query).await?;

        let samples = feed
            .data
            .into_iter()
            .map(|post| {
                let comments = post.comments.unwrap_or_default();
                PostSample {
                    platform_post_id: post.id,
                    summary: summarize(post.message.as_deref().unwrap_or("")),
                    created_at: parse_iso_time(&post.created_time),
                    comment_count: comments.summary.map(|s| s.total_count).unwrap_or(0),
                    recent_comments: comments
                        .data
                        .into_iter()
                        .map(|c| {
                            (
                                summarize(c.message.as_deref().unwrap_or("")),
                                parse_iso_time(&c.created_time),
                            )
                        })
                        .collect(),
                }
            })
            .collect();
        Ok(derive_stats(samples))
    }
}

#[async_trait]
impl PlatformClient for FacebookClient {
    fn id(&self) -> PlatformId {
        PlatformId::Facebook
    }

    fn media_requirement(&self) -> MediaRequirement {
        MediaRequirement::Optional
    }

    async fn create_post(
        &self,
        content: &str,
        media: Option<&MediaRef>,
        raw_media: Option<&MediaBlob>,
    ) -> Result<String> {
        if let Some(blob) = raw_media {
            debug!(file = %blob.file_name, "uploading media bytes to page");
            return self.upload_blob(content, blob).await;
        }
        if let Some(media) = media {
            return self.publish_media_url(content, media).await;
        }

        let path = format!("/{}/feed", self.page_id);
        let response: CreatedObject = self
            .client
            .post_form(&path, &[], &[("message", content.to_string())])
            .await?;
        Ok(response.into_post_id())
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
        // Threaded: replying under a comment uses the comment's own
        // comments edge instead of the post's.
        let path = match parent_comment_id {
            Some(comment_id) => format!("/{}/comments", comment_id),
            None => format!("/{}/comments", platform_post_id),
        };
        let response: CreatedObject = self
            .client
            .post_form(&path, &[], &[("message", text.to_string())])
            .await?;
        Ok(response.into_post_id())
    }

    async fn delete_comment(&self, platform_comment_id: &str) -> Result<()> {
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

impl FacebookClient {
    async fn fetch_comments(
        &self,
        platform_post_id: &str,
        query: &CommentQuery,
    ) -> Result<Vec<FetchedComment>> {
        let path = format!("/{}/comments", platform_post_id);
        let mut params = vec![
            (
                "fields",
                "id,message,from{id,name,picture},like_count,created_time".to_string(),
            ),
            ("order", "reverse_chronological".to_string()),
        ];
        if let Some(limit) = query.limit {
            params.push(("limit", limit.to_string()));
        }
        if let Some(after) = &query.after {
            params.push(("after", after.clone()));
        }

        let result: Result<Page<GraphComment>> = self.client.get_json(&path, &params).await;
        let comments = empty_if_gone(result.map(|page| page.data))?;
        Ok(comments
            .into_iter()
            .map(|c| FetchedComment {
                platform_comment_id: c.id,
                text: c.message.unwrap_or_default(),
                author: c
                    .from
                    .map(|f| CommentAuthor {
                        id: f.id,
                        display_name: Some(f.name),
                        handle: None,
                        avatar_url: f.picture.and_then(|p| p.data).map(|d| d.url),
                    })
                    .unwrap_or_default(),
                like_count: c.like_count.unwrap_or(0),
                created_at: parse_iso_time(&c.created_time),
            })
            .collect())
    }
}

#[derive(Deserialize)]
struct CreatedObject {
    id: String,
    /// Photo and video uploads return the media object id in `id` and the
    /// feed-visible post id separately.
    #[serde(default)]
    post_id: Option<String>,
}

impl CreatedObject {
    fn into_post_id(self) -> String {
        self.post_id.unwrap_or(self.id)
    }
}

#[derive(Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[derive(Deserialize)]
struct GraphComment {
    id: String,
    message: Option<String>,
    from: Option<GraphAuthor>,
    like_count: Option<u64>,
    created_time: String,
}

#[derive(Deserialize)]
struct GraphAuthor {
    id: String,
    name: String,
    picture: Option<GraphPicture>,
}

#[derive(Deserialize)]
struct GraphPicture {
    data: Option<GraphPictureData>,
}

#[derive(Deserialize)]
struct GraphPictureData {
    url: String,
}

#[derive(Deserialize)]
struct FeedPost {
    id: String,
    message: Option<String>,
    created_time: String,
    comments: Option<CommentsEdge>,
}

#[derive(Deserialize, Default)]
struct CommentsEdge {
    #[serde(default)]
    data: Vec<EdgeComment>,
    summary: Option<EdgeSummary>,
}

#[derive(Deserialize)]
struct EdgeComment {
    message: Option<String>,
    created_time: String,
}

#[derive(Deserialize)]
struct EdgeSummary {
    total_count: u64,
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

    #[test]
    fn test_created_object_prefers_post_id() {
        let upload: CreatedObject =
            serde_json::from_str(r#"{"id": "media-1", "post_id": "page_post-1"}"#).unwrap();
        assert_eq!(upload.into_post_id(), "page_post-1");

        let feed: CreatedObject = serde_json::from_str(r#"{"id": "post-2"}"#).unwrap();
        assert_eq!(feed.into_post_id(), "post-2");
    }

    #[test]
    fn test_feed_post_deserializes_summary() {
        let raw = r#"{
            "id": "p1",
            "message": "hello",
            "created_time": "2024-05-01T12:00:00+0000",
            "comments": {
                "data": [{"message": "hi", "created_time": "2024-05-01T13:00:00+0000"}],
                "summary": {"total_count": 12}
            }
        }"#;
        let post: FeedPost = serde_json::from_str(raw).unwrap();
        let comments = post.comments.unwrap();
        assert_eq!(comments.summary.unwrap().total_count, 12);
        assert_eq!(comments.data.len(), 1);
    }
}
