//! Configurable in-memory platform for tests and dry runs
//!
//! Behaves like a well-behaved platform by default; failures and canned
//! responses are injected per call site. Every request is recorded so
//! tests can assert on routing, not just outcomes.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{ApiError, Result};
use crate::types::{
    AccountStats, CommentQuery, MediaBlob, MediaRef, PlatformId,
};

use super::{FetchedComment, MediaRequirement, PlatformClient};

#[derive(Debug, Clone)]
pub struct CreatedPost {
    pub content: String,
    pub media_url: Option<String>,
    pub had_raw_media: bool,
}

#[derive(Debug, Clone)]
pub struct RecordedReply {
    pub platform_post_id: String,
    pub parent_comment_id: Option<String>,
    pub text: String,
}

#[derive(Default)]
struct MockState {
    fail_create: Option<ApiError>,
    fail_comments: Option<ApiError>,
    fail_stats: Option<ApiError>,
    comments: Vec<FetchedComment>,
    stats: Option<AccountStats>,
    created: Vec<CreatedPost>,
    replies: Vec<RecordedReply>,
    deleted: Vec<String>,
    comment_calls: u32,
    stats_calls: u32,
    next_id: u32,
}

pub struct MockPlatform {
    id: PlatformId,
    media_requirement: MediaRequirement,
    state: Mutex<MockState>,
}

impl MockPlatform {
    pub fn new(id: PlatformId) -> Self {
        Self {
            id,
            media_requirement: MediaRequirement::Optional,
            state: Mutex::new(MockState::default()),
        }
    }

    pub fn with_media_requirement(mut self, requirement: MediaRequirement) -> Self {
        self.media_requirement = requirement;
        self
    }

    /// Make every `create_post` fail with the given error until cleared.
    pub fn fail_create(&self, error: ApiError) {
        self.state.lock().unwrap().fail_create = Some(error);
    }

    pub fn fail_comments(&self, error: ApiError) {
        self.state.lock().unwrap().fail_comments = Some(error);
    }

    pub fn fail_stats(&self, error: ApiError) {
        self.state.lock().unwrap().fail_stats = Some(error);
    }

    pub fn clear_failures(&self) {
        let mut state = self.state.lock().unwrap();
        state.fail_create = None;
        state.fail_comments = None;
        state.fail_stats = None;
    }

    pub fn set_comments(&self, comments: Vec<FetchedComment>) {
        self.state.lock().unwrap().comments = comments;
    }

    pub fn set_stats(&self, stats: AccountStats) {
        self.state.lock().unwrap().stats = Some(stats);
    }

    pub fn created_posts(&self) -> Vec<CreatedPost> {
        self.state.lock().unwrap().created.clone()
    }

    pub fn replies(&self) -> Vec<RecordedReply> {
        self.state.lock().unwrap().replies.clone()
    }

    pub fn deleted_comments(&self) -> Vec<String> {
        self.state.lock().unwrap().deleted.clone()
    }

    pub fn create_calls(&self) -> u32 {
        self.state.lock().unwrap().created.len() as u32
    }

    pub fn comment_calls(&self) -> u32 {
        self.state.lock().unwrap().comment_calls
    }

    pub fn stats_calls(&self) -> u32 {
        self.state.lock().unwrap().stats_calls
    }
}

#[async_trait]
impl PlatformClient for MockPlatform {
    fn id(&self) -> PlatformId {
        self.id
    }

    fn media_requirement(&self) -> MediaRequirement {
        self.media_requirement
    }

    async fn create_post(
        &self,
        content: &str,
        media: Option<&MediaRef>,
        raw_media: Option<&MediaBlob>,
    ) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        state.created.push(CreatedPost {
            content: content.to_string(),
            media_url: media.map(|m| m.url.clone()),
            had_raw_media: raw_media.is_some(),
        });
        if let Some(error) = &state.fail_create {
            return Err(error.clone().into());
        }
        state.next_id += 1;
        Ok(format!("{}-post-{}", self.id.as_str(), state.next_id))
    }

    async fn get_comments(
        &self,
        _platform_post_id: &str,
        _query: &CommentQuery,
    ) -> Result<Vec<FetchedComment>> {
        let mut state = self.state.lock().unwrap();
        state.comment_calls += 1;
        if let Some(error) = &state.fail_comments {
            return Err(error.clone().into());
        }
        Ok(state.comments.clone())
    }

    async fn reply_to_comment(
        &self,
        platform_post_id: &str,
        text: &str,
        parent_comment_id: Option<&str>,
    ) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        state.replies.push(RecordedReply {
            platform_post_id: platform_post_id.to_string(),
            parent_comment_id: parent_comment_id.map(|s| s.to_string()),
            text: text.to_string(),
        });
        state.next_id += 1;
        Ok(format!("{}-reply-{}", self.id.as_str(), state.next_id))
    }

    async fn delete_comment(&self, platform_comment_id: &str) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .deleted
            .push(platform_comment_id.to_string());
        Ok(())
    }

    async fn account_stats(&self) -> Result<AccountStats> {
        let mut state = self.state.lock().unwrap();
        state.stats_calls += 1;
        if let Some(error) = &state.fail_stats {
            return Err(error.clone().into());
        }
        Ok(state.stats.clone().unwrap_or(AccountStats {
            total_posts: 0,
            total_comments: 0,
            engagement_rate: 0.0,
            recent_activity: Vec::new(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_creates_and_records() {
        let mock = MockPlatform::new(PlatformId::Facebook);
        let id = mock.create_post("hello", None, None).await.unwrap();
        assert_eq!(id, "facebook-post-1");
        assert_eq!(mock.create_calls(), 1);
        assert_eq!(mock.created_posts()[0].content, "hello");
    }

    #[tokio::test]
    async fn test_mock_failure_injection() {
        let mock = MockPlatform::new(PlatformId::Twitter);
        mock.fail_create(ApiError::PlatformUnavailable("503".to_string()));
        assert!(mock.create_post("x", None, None).await.is_err());
        // The attempt is still recorded.
        assert_eq!(mock.create_calls(), 1);

        mock.clear_failures();
        assert!(mock.create_post("x", None, None).await.is_ok());
    }

    #[tokio::test]
    async fn test_mock_records_reply_threading() {
        let mock = MockPlatform::new(PlatformId::Instagram);
        mock.reply_to_comment("post-1", "thanks", Some("comment-9"))
            .await
            .unwrap();
        let replies = mock.replies();
        assert_eq!(replies[0].parent_comment_id.as_deref(), Some("comment-9"));
    }
}
