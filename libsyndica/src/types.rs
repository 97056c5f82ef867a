//! Core types for Syndica

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The platforms Syndica can publish to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformId {
    Facebook,
    Instagram,
    Twitter,
    TikTok,
}

impl PlatformId {
    pub const ALL: [PlatformId; 4] = [
        PlatformId::Facebook,
        PlatformId::Instagram,
        PlatformId::Twitter,
        PlatformId::TikTok,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformId::Facebook => "facebook",
            PlatformId::Instagram => "instagram",
            PlatformId::Twitter => "twitter",
            PlatformId::TikTok => "tiktok",
        }
    }
}

impl fmt::Display for PlatformId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PlatformId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "facebook" => Ok(PlatformId::Facebook),
            "instagram" => Ok(PlatformId::Instagram),
            "twitter" | "x" => Ok(PlatformId::Twitter),
            "tiktok" => Ok(PlatformId::TikTok),
            _ => Err(format!(
                "Unknown platform: '{}'. Valid options: facebook, instagram, twitter, tiktok",
                s
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Image => write!(f, "image"),
            MediaKind::Video => write!(f, "video"),
        }
    }
}

/// A publicly fetchable media reference produced by the upload collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    pub url: String,
    pub kind: MediaKind,
}

/// Raw media bytes for the platforms that accept direct multipart upload.
///
/// Adapters that cannot ingest raw bytes classify an upload attempt as
/// `MediaUnavailable` instead of inventing an identifier.
#[derive(Clone)]
pub struct MediaBlob {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub mime: String,
    pub kind: MediaKind,
}

impl fmt::Debug for MediaBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaBlob")
            .field("file_name", &self.file_name)
            .field("mime", &self.mime)
            .field("kind", &self.kind)
            .field("len", &self.bytes.len())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PostStatus {
    Draft,
    Scheduled,
    Published,
    Failed,
}

/// A post as owned by the post store.
///
/// Mutated only through store transitions; the coordinator never writes to a
/// `Post` directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub content: String,
    pub media: Option<MediaRef>,
    #[serde(skip)]
    pub raw_media: Option<MediaBlob>,
    pub platforms: Vec<PlatformId>,
    pub scheduled_at: Option<i64>,
    pub status: PostStatus,
    /// Platform-native identifiers attached after a publish pass.
    pub published_ids: BTreeMap<PlatformId, String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Post {
    pub fn new(content: String, platforms: Vec<PlatformId>) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            id: Uuid::new_v4().to_string(),
            content,
            media: None,
            raw_media: None,
            platforms,
            scheduled_at: None,
            status: PostStatus::Draft,
            published_ids: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_media(mut self, media: MediaRef) -> Self {
        self.media = Some(media);
        self
    }

    pub fn with_raw_media(mut self, raw: MediaBlob) -> Self {
        self.raw_media = Some(raw);
        self
    }
}

/// Per-platform outcome of one coordinator invocation.
///
/// `None` means that platform's attempt failed (or was skipped locally);
/// `Some(id)` is the platform's native post identifier. Produced once,
/// never mutated afterward.
pub type PublishResult = BTreeMap<PlatformId, Option<String>>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentAuthor {
    pub id: String,
    pub display_name: Option<String>,
    pub handle: Option<String>,
    pub avatar_url: Option<String>,
}

/// A comment surfaced from a platform, normalized into the shared model.
///
/// `platform_comment_id` is `None` when the comment was derived from a
/// coarse activity feed rather than fetched directly; the reconciler uses
/// that distinction to prefer authoritative entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub platform: PlatformId,
    pub local_post_id: String,
    pub platform_post_id: String,
    pub platform_comment_id: Option<String>,
    pub text: String,
    pub author: CommentAuthor,
    pub like_count: u64,
    pub created_at: i64,
    pub hidden: bool,
    pub spam: bool,
    pub replied: bool,
}

impl Comment {
    pub fn new(
        platform: PlatformId,
        local_post_id: String,
        platform_post_id: String,
        platform_comment_id: Option<String>,
        text: String,
        author: CommentAuthor,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            platform,
            local_post_id,
            platform_post_id,
            platform_comment_id,
            text,
            author,
            like_count: 0,
            created_at: chrono::Utc::now().timestamp(),
            hidden: false,
            spam: false,
            replied: false,
        }
    }

    /// Whether this comment carries a platform-native comment id.
    pub fn is_authoritative(&self) -> bool {
        self.platform_comment_id.is_some()
    }

    /// Content-identity key used by the reconciler.
    ///
    /// Trimmed text is the only correlation signal shared by both retrieval
    /// paths, so it is part of the key alongside platform and parent post.
    pub fn identity_key(&self) -> CommentKey {
        CommentKey {
            platform: self.platform,
            platform_post_id: self.platform_post_id.clone(),
            normalized_content: self.text.trim().to_string(),
        }
    }
}

/// Composite identity of a comment across both retrieval paths.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommentKey {
    pub platform: PlatformId,
    pub platform_post_id: String,
    pub normalized_content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    PostCreated,
    CommentReceived,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub kind: ActivityKind,
    pub platform_post_id: String,
    pub summary: String,
    pub occurred_at: i64,
}

/// Aggregate account statistics for one platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountStats {
    pub total_posts: u64,
    pub total_comments: u64,
    /// `total_comments / total_posts`; `0.0` when there are no posts.
    pub engagement_rate: f64,
    /// Most recent activity, timestamp descending, at most five entries.
    pub recent_activity: Vec<ActivityEvent>,
}

/// Pagination options for comment fetches.
#[derive(Debug, Clone, Default)]
pub struct CommentQuery {
    pub limit: Option<u32>,
    /// Opaque platform cursor from a previous page.
    pub after: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_id_roundtrip() {
        for platform in PlatformId::ALL {
            let parsed: PlatformId = platform.as_str().parse().unwrap();
            assert_eq!(parsed, platform);
        }
    }

    #[test]
    fn test_platform_id_parse_aliases_and_case() {
        assert_eq!("X".parse::<PlatformId>().unwrap(), PlatformId::Twitter);
        assert_eq!(
            "FaceBook".parse::<PlatformId>().unwrap(),
            PlatformId::Facebook
        );
    }

    #[test]
    fn test_platform_id_parse_unknown() {
        let err = "myspace".parse::<PlatformId>().unwrap_err();
        assert!(err.contains("myspace"));
        assert!(err.contains("facebook"));
    }

    #[test]
    fn test_post_new_defaults() {
        let post = Post::new("hello".to_string(), vec![PlatformId::Twitter]);
        assert!(Uuid::parse_str(&post.id).is_ok());
        assert_eq!(post.status, PostStatus::Draft);
        assert!(post.published_ids.is_empty());
        assert_eq!(post.scheduled_at, None);
        assert!(post.media.is_none());
        assert_eq!(post.created_at, post.updated_at);
    }

    #[test]
    fn test_post_with_media() {
        let post = Post::new("look".to_string(), vec![PlatformId::Instagram]).with_media(
            MediaRef {
                url: "https://cdn.example.com/a.jpg".to_string(),
                kind: MediaKind::Image,
            },
        );
        assert_eq!(post.media.as_ref().unwrap().kind, MediaKind::Image);
    }

    #[test]
    fn test_comment_identity_key_trims_content() {
        let mut a = Comment::new(
            PlatformId::Facebook,
            "local-1".to_string(),
            "fb-post-1".to_string(),
            Some("fb-comment-1".to_string()),
            "  nice post  ".to_string(),
            CommentAuthor::default(),
        );
        let b = Comment::new(
            PlatformId::Facebook,
            "local-1".to_string(),
            "fb-post-1".to_string(),
            None,
            "nice post".to_string(),
            CommentAuthor::default(),
        );
        assert_eq!(a.identity_key(), b.identity_key());

        a.platform_post_id = "fb-post-2".to_string();
        assert_ne!(a.identity_key(), b.identity_key());
    }

    #[test]
    fn test_comment_authoritative_flag() {
        let direct = Comment::new(
            PlatformId::Twitter,
            "local".into(),
            "tw-1".into(),
            Some("tw-c-1".into()),
            "hi".into(),
            CommentAuthor::default(),
        );
        let derived = Comment::new(
            PlatformId::Twitter,
            "local".into(),
            "tw-1".into(),
            None,
            "hi".into(),
            CommentAuthor::default(),
        );
        assert!(direct.is_authoritative());
        assert!(!derived.is_authoritative());
    }

    #[test]
    fn test_media_blob_debug_hides_bytes() {
        let blob = MediaBlob {
            bytes: vec![0u8; 1024],
            file_name: "clip.mp4".to_string(),
            mime: "video/mp4".to_string(),
            kind: MediaKind::Video,
        };
        let debug = format!("{:?}", blob);
        assert!(debug.contains("clip.mp4"));
        assert!(debug.contains("1024"));
        assert!(!debug.contains("[0"));
    }

    #[test]
    fn test_post_serialization_roundtrip() {
        let post = Post::new("serialize me".to_string(), vec![PlatformId::Facebook]);
        let json = serde_json::to_string(&post).unwrap();
        let back: Post = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, post.id);
        assert_eq!(back.platforms, post.platforms);
        assert_eq!(back.status, post.status);
    }
}
