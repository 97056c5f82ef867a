//! Twitter adapter (v2 API)
//!
//! Auth is OAuth 2.0 with transparent access-token refresh handled by the
//! request pipeline. Replies to a post are discovered through recent
//! search on the conversation id, since the v2 API has no direct
//! comments-on-post endpoint.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::cache::ResponseCache;
use crate::config::TwitterConfig;
use crate::credentials::OAuthCredentials;
use crate::error::{ApiError, Result};
use crate::http::{ApiClient, AuthScheme};
use crate::types::{
    AccountStats, CommentAuthor, CommentQuery, MediaBlob, MediaRef, PlatformId,
};

use super::{
    comment_cache_key, derive_stats, empty_if_gone, parse_iso_time, summarize, FetchedComment,
    MediaRequirement, PlatformClient, PostSample,
};

const STATS_FEED_LIMIT: u32 = 25;

pub struct TwitterClient {
    client: ApiClient,
    user_id: String,
    stats_cache: ResponseCache<AccountStats>,
    comments_cache: ResponseCache<Vec<FetchedComment>>,
    cache_ttl: Duration,
}

impl TwitterClient {
    pub fn new(config: &TwitterConfig, creds: OAuthCredentials, cache_ttl: Duration) -> Result<Self> {
        Ok(Self {
            client: ApiClient::new(
                PlatformId::Twitter,
                config.base_url.clone(),
                AuthScheme::from_oauth(creds),
            )?,
            user_id: config.user_id.clone(),
            stats_cache: ResponseCache::new(),
            comments_cache: ResponseCache::new(),
            cache_ttl,
        })
    }

    async fn fetch_stats(&self) -> Result<AccountStats> {
        let path = format!("/users/{}/tweets", self.user_id);
        let query = [
            ("tweet.fields", "created_at,public_metrics".to_string()),
            ("max_results", STATS_FEED_LIMIT.to_string()),
        ];
        let timeline: Envelope<Vec<Tweet>> = self.client.get_json(&path, &query).await?;

        let samples = timeline
            .data
            .unwrap_or_default()
            .into_iter()
            .map(|tweet| PostSample {
                platform_post_id: tweet.id,
                summary: summarize(&tweet.text),
                created_at: tweet.created_at.as_deref().map(parse_iso_time).unwrap_or(0),
                comment_count: tweet
                    .public_metrics
                    .map(|m| m.reply_count)
                    .unwrap_or(0),
                // The timeline endpoint carries counts but not reply bodies.
                recent_comments: Vec::new(),
            })
            .collect();
        Ok(derive_stats(samples))
    }
}

#[async_trait]
impl PlatformClient for TwitterClient {
    fn id(&self) -> PlatformId {
        PlatformId::Twitter
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
        if raw_media.is_some() && media.is_none() {
            return Err(ApiError::MediaUnavailable(
                "media bytes cannot be attached, a public URL is required".to_string(),
            )
            .into());
        }

        // Media rides along as a link in the tweet body.
        let text = match media {
            Some(media) => format!("{} {}", content, media.url),
            None => content.to_string(),
        };

        let response: Envelope<Tweet> = self
            .client
            .post_json("/tweets", serde_json::json!({ "text": text }))
            .await?;
        response
            .data
            .map(|t| t.id)
            .ok_or_else(|| ApiError::Unknown("tweet creation returned no data".to_string()).into())
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
        // Threading: replying to a reply targets that tweet's id directly.
        let target = parent_comment_id.unwrap_or(platform_post_id);
        let body = serde_json::json!({
            "text": text,
            "reply": { "in_reply_to_tweet_id": target }
        });
        let response: Envelope<Tweet> = self.client.post_json("/tweets", body).await?;
        response
            .data
            .map(|t| t.id)
            .ok_or_else(|| ApiError::Unknown("reply creation returned no data".to_string()).into())
    }

    async fn delete_comment(&self, platform_comment_id: &str) -> Result<()> {
        let path = format!("/tweets/{}", platform_comment_id);
        let _: Envelope<Deleted> = self.client.delete_json(&path, &[]).await?;
        Ok(())
    }

    async fn account_stats(&self) -> Result<AccountStats> {
        self.stats_cache
            .get("stats", self.cache_ttl, || self.fetch_stats())
            .await
    }
}

impl TwitterClient {
    async fn fetch_comments(
        &self,
        platform_post_id: &str,
        query: &CommentQuery,
    ) -> Result<Vec<FetchedComment>> {
        let max_results = query.limit.unwrap_or(STATS_FEED_LIMIT).clamp(10, 100);
        let mut params = vec![
            (
                "query",
                format!("conversation_id:{}", platform_post_id),
            ),
            (
                "tweet.fields",
                "author_id,created_at,public_metrics".to_string(),
            ),
            ("expansions", "author_id".to_string()),
            (
                "user.fields",
                "name,username,profile_image_url".to_string(),
            ),
            ("max_results", max_results.to_string()),
        ];
        if let Some(after) = &query.after {
            params.push(("next_token", after.clone()));
        }

        let result: Result<SearchEnvelope> =
            self.client.get_json("/tweets/search/recent", &params).await;
        let envelope = match empty_if_gone(result.map(|e| vec![e]))?.pop() {
            Some(envelope) => envelope,
            None => return Ok(Vec::new()),
        };

        let users: HashMap<String, User> = envelope
            .includes
            .map(|i| i.users)
            .unwrap_or_default()
            .into_iter()
            .map(|u| (u.id.clone(), u))
            .collect();

        Ok(envelope
            .data
            .unwrap_or_default()
            .into_iter()
            .map(|tweet| {
                let author = tweet
                    .author_id
                    .as_deref()
                    .and_then(|id| users.get(id))
                    .map(|u| CommentAuthor {
                        id: u.id.clone(),
                        display_name: Some(u.name.clone()),
                        handle: Some(u.username.clone()),
                        avatar_url: u.profile_image_url.clone(),
                    })
                    .unwrap_or_else(|| CommentAuthor {
                        id: tweet.author_id.clone().unwrap_or_default(),
                        ..CommentAuthor::default()
                    });
                FetchedComment {
                    platform_comment_id: tweet.id,
                    text: tweet.text,
                    author,
                    like_count: tweet.public_metrics.map(|m| m.like_count).unwrap_or(0),
                    created_at: tweet.created_at.as_deref().map(parse_iso_time).unwrap_or(0),
                }
            })
            .collect())
    }
}

#[derive(Deserialize)]
struct Envelope<T> {
    data: Option<T>,
}

#[derive(Deserialize)]
struct SearchEnvelope {
    data: Option<Vec<Tweet>>,
    includes: Option<Includes>,
}

#[derive(Deserialize, Default)]
struct Includes {
    #[serde(default)]
    users: Vec<User>,
}

#[derive(Deserialize)]
struct Tweet {
    id: String,
    #[serde(default)]
    text: String,
    author_id: Option<String>,
    created_at: Option<String>,
    public_metrics: Option<PublicMetrics>,
}

#[derive(Deserialize)]
struct PublicMetrics {
    #[serde(default)]
    reply_count: u64,
    #[serde(default)]
    like_count: u64,
}

#[derive(Deserialize)]
struct User {
    id: String,
    name: String,
    username: String,
    profile_image_url: Option<String>,
}

#[derive(Deserialize)]
struct Deleted {
    #[serde(default)]
    #[allow(dead_code)]
    deleted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_envelope_with_includes() {
        let raw = r#"{
            "data": [
                {"id": "t1", "text": "nice", "author_id": "u1",
                 "created_at": "2024-05-01T12:00:00.000Z",
                 "public_metrics": {"reply_count": 0, "like_count": 3}}
            ],
            "includes": {"users": [
                {"id": "u1", "name": "Ada", "username": "ada",
                 "profile_image_url": "https://img.example/a.png"}
            ]}
        }"#;
        let envelope: SearchEnvelope = serde_json::from_str(raw).unwrap();
        assert_eq!(envelope.data.unwrap().len(), 1);
        assert_eq!(envelope.includes.unwrap().users[0].username, "ada");
    }

    #[test]
    fn test_empty_search_envelope() {
        // Recent search omits `data` entirely when there are no matches.
        let envelope: SearchEnvelope = serde_json::from_str(r#"{"meta": {"result_count": 0}}"#).unwrap();
        assert!(envelope.data.is_none());
    }

    #[test]
    fn test_tweet_metrics_default() {
        let tweet: Tweet = serde_json::from_str(r#"{"id": "t", "text": "x"}"#).unwrap();
        assert!(tweet.public_metrics.is_none());
        assert!(tweet.created_at.is_none());
    }
}
