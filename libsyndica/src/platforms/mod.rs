//! Platform adapter contract
//!
//! Each supported platform implements [`PlatformClient`]. The coordinator
//! and reconciler talk only to this trait: platform-specific publish flows,
//! comment threading quirks, and auth schemes stay behind it. Adapters
//! return platform-native string identifiers and never leak raw HTTP
//! details to callers.

use async_trait::async_trait;

use crate::error::{ApiError, Result, SyndicaError};
use crate::types::{
    AccountStats, ActivityEvent, ActivityKind, CommentAuthor, CommentQuery, MediaBlob, MediaRef,
    PlatformId,
};

pub mod facebook;
pub mod instagram;
pub mod mock;
pub mod tiktok;
pub mod twitter;

pub use facebook::FacebookClient;
pub use instagram::InstagramClient;
pub use mock::MockPlatform;
pub use tiktok::TikTokClient;
pub use twitter::TwitterClient;

/// Prefix marking identifiers minted locally in simulation mode. Such posts
/// never existed on the platform, so read and write paths short-circuit on
/// them instead of issuing requests that can only 404.
pub const SIMULATED_ID_PREFIX: &str = "sim-";

pub fn is_simulated_id(id: &str) -> bool {
    id.starts_with(SIMULATED_ID_PREFIX)
}

/// What a platform demands of a post's media before publishing can work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaRequirement {
    /// Text-only posts are fine.
    Optional,
    /// A post without media cannot be published.
    MediaRequired,
    /// Only video media is accepted.
    VideoOnly,
}

/// A comment as returned directly from a platform's comment endpoint.
///
/// Direct fetches always carry the platform-native comment id; the
/// reconciler attaches local post context afterward.
#[derive(Debug, Clone)]
pub struct FetchedComment {
    pub platform_comment_id: String,
    pub text: String,
    pub author: CommentAuthor,
    pub like_count: u64,
    pub created_at: i64,
}

/// Uniform adapter contract implemented per platform.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    fn id(&self) -> PlatformId;

    fn media_requirement(&self) -> MediaRequirement;

    /// Publish a post and return the platform-native post identifier.
    async fn create_post(
        &self,
        content: &str,
        media: Option<&MediaRef>,
        raw_media: Option<&MediaBlob>,
    ) -> Result<String>;

    /// Fetch comments on a published post, newest first where the platform
    /// allows ordering.
    async fn get_comments(
        &self,
        platform_post_id: &str,
        query: &CommentQuery,
    ) -> Result<Vec<FetchedComment>>;

    /// Reply to a post, or to one of its comments when `parent_comment_id`
    /// is given and the platform supports threaded replies.
    async fn reply_to_comment(
        &self,
        platform_post_id: &str,
        text: &str,
        parent_comment_id: Option<&str>,
    ) -> Result<String>;

    async fn delete_comment(&self, platform_comment_id: &str) -> Result<()>;

    /// Aggregate account statistics derived from the platform's post feed.
    async fn account_stats(&self) -> Result<AccountStats>;
}

/// Treat a vanished parent object as an empty result on read paths. Posts
/// get deleted out from under us on every platform; that is not an error
/// worth surfacing to the inbox.
pub(crate) fn empty_if_gone<T>(result: Result<Vec<T>>) -> Result<Vec<T>> {
    match result {
        Err(SyndicaError::Api(ApiError::NotFound(_))) => Ok(Vec::new()),
        other => other,
    }
}

/// One post's worth of feed data, the common denominator the adapters can
/// all produce for statistics.
pub(crate) struct PostSample {
    pub platform_post_id: String,
    pub summary: String,
    pub created_at: i64,
    pub comment_count: u64,
    /// Recent comment summaries with timestamps, already capped by the
    /// adapter's fetch.
    pub recent_comments: Vec<(String, i64)>,
}

/// Comment totals are aggregated over this many of the most recent posts
/// only, bounding the per-post detail the adapters need to fetch.
pub(crate) const COMMENT_AGGREGATION_CAP: usize = 5;

/// Fold per-post samples into [`AccountStats`].
pub(crate) fn derive_stats(mut samples: Vec<PostSample>) -> AccountStats {
    samples.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    let total_posts = samples.len() as u64;
    let total_comments: u64 = samples
        .iter()
        .take(COMMENT_AGGREGATION_CAP)
        .map(|s| s.comment_count)
        .sum();
    let engagement_rate = if total_posts == 0 {
        0.0
    } else {
        total_comments as f64 / total_posts as f64
    };

    let mut recent_activity: Vec<ActivityEvent> = Vec::new();
    for sample in &samples {
        recent_activity.push(ActivityEvent {
            kind: ActivityKind::PostCreated,
            platform_post_id: sample.platform_post_id.clone(),
            summary: sample.summary.clone(),
            occurred_at: sample.created_at,
        });
        for (text, at) in &sample.recent_comments {
            recent_activity.push(ActivityEvent {
                kind: ActivityKind::CommentReceived,
                platform_post_id: sample.platform_post_id.clone(),
                summary: text.clone(),
                occurred_at: *at,
            });
        }
    }
    recent_activity.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
    recent_activity.truncate(5);

    AccountStats {
        total_posts,
        total_comments,
        engagement_rate,
        recent_activity,
    }
}

/// Cache key for a comment-thread read, distinct per page.
pub(crate) fn comment_cache_key(platform_post_id: &str, query: &CommentQuery) -> String {
    format!(
        "comments:{}:{}:{}",
        platform_post_id,
        query.limit.map(|l| l.to_string()).unwrap_or_default(),
        query.after.as_deref().unwrap_or("")
    )
}

/// Parse an ISO 8601 timestamp as the platforms emit it, including the
/// compact offset form (`+0000`) the Graph API uses.
pub(crate) fn parse_iso_time(raw: &str) -> i64 {
    chrono::DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%z")
        .or_else(|_| chrono::DateTime::parse_from_rfc3339(raw))
        .map(|dt| dt.timestamp())
        .unwrap_or(0)
}

/// Truncate a post body into a feed summary.
pub(crate) fn summarize(content: &str) -> String {
    const MAX: usize = 80;
    let trimmed = content.trim();
    if trimmed.chars().count() <= MAX {
        trimmed.to_string()
    } else {
        let cut: String = trimmed.chars().take(MAX).collect();
        format!("{}...", cut.trim_end())
    }
}
