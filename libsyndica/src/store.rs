//! In-memory post and comment stores
//!
//! Durable persistence is an external collaborator; the core works against
//! these single-writer in-memory stores. Posts are mutated only through
//! store transitions, and the comment collection for a platform is always
//! replaced wholesale (swap, never clear-then-refill) so a reader can never
//! observe a transiently empty set mid-reconciliation.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use crate::error::{Result, StoreError, SyndicaError};
use crate::types::{Comment, PlatformId, Post, PostStatus, PublishResult};

/// Owner of all local posts.
pub struct PostStore {
    posts: Mutex<HashMap<String, Post>>,
}

impl PostStore {
    pub fn new() -> Self {
        Self {
            posts: Mutex::new(HashMap::new()),
        }
    }

    /// Load a snapshot written by [`PostStore::save`]. A missing file is an
    /// empty store, not an error.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::new()),
            Err(e) => {
                return Err(StoreError::Io {
                    path: path.display().to_string(),
                    source: e,
                }
                .into())
            }
        };
        let posts: Vec<Post> = serde_json::from_str(&content).map_err(|e| StoreError::Corrupt {
            path: path.display().to_string(),
            source: e,
        })?;
        let store = Self::new();
        for post in posts {
            store.insert(post);
        }
        Ok(store)
    }

    /// Persist all posts as a JSON snapshot.
    pub fn save(&self, path: &Path) -> Result<()> {
        let io_err = |e: std::io::Error| StoreError::Io {
            path: path.display().to_string(),
            source: e,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let posts = self.list();
        let json = serde_json::to_string_pretty(&posts).map_err(|e| StoreError::Corrupt {
            path: path.display().to_string(),
            source: e,
        })?;
        std::fs::write(path, json).map_err(io_err)?;
        Ok(())
    }

    pub fn insert(&self, post: Post) {
        self.posts
            .lock()
            .expect("post store poisoned")
            .insert(post.id.clone(), post);
    }

    pub fn get(&self, id: &str) -> Option<Post> {
        self.posts.lock().expect("post store poisoned").get(id).cloned()
    }

    pub fn list(&self) -> Vec<Post> {
        let mut posts: Vec<Post> = self
            .posts
            .lock()
            .expect("post store poisoned")
            .values()
            .cloned()
            .collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        posts
    }

    /// Find the local post that was published to `platform` under the given
    /// platform-native id.
    pub fn find_by_published_id(&self, platform: PlatformId, external_id: &str) -> Option<Post> {
        self.posts
            .lock()
            .expect("post store poisoned")
            .values()
            .find(|p| {
                p.published_ids
                    .get(&platform)
                    .is_some_and(|id| id == external_id)
            })
            .cloned()
    }

    /// Most recently published local post on `platform`, used as the
    /// fallback parent when a comment cannot be resolved directly.
    pub fn latest_published_for(&self, platform: PlatformId) -> Option<Post> {
        self.posts
            .lock()
            .expect("post store poisoned")
            .values()
            .filter(|p| p.published_ids.contains_key(&platform))
            .max_by_key(|p| p.updated_at)
            .cloned()
    }

    /// Mark a draft as scheduled for later publication.
    pub fn schedule(&self, post_id: &str, at: i64) -> Result<()> {
        let mut posts = self.posts.lock().expect("post store poisoned");
        let post = posts
            .get_mut(post_id)
            .ok_or_else(|| SyndicaError::InvalidInput(format!("unknown post: {}", post_id)))?;
        post.scheduled_at = Some(at);
        post.status = PostStatus::Scheduled;
        post.updated_at = chrono::Utc::now().timestamp();
        Ok(())
    }

    /// Merge a coordinator result into the post: attach the ids of the
    /// platforms that succeeded and transition the lifecycle status.
    ///
    /// The batch interpretation lives here, not in the coordinator: at
    /// least one success means `Published`, none means `Failed`.
    pub fn apply_publish_result(&self, post_id: &str, result: &PublishResult) -> Result<PostStatus> {
        let mut posts = self.posts.lock().expect("post store poisoned");
        let post = posts
            .get_mut(post_id)
            .ok_or_else(|| SyndicaError::InvalidInput(format!("unknown post: {}", post_id)))?;

        let mut any_success = false;
        for (platform, outcome) in result {
            if let Some(id) = outcome {
                post.published_ids.insert(*platform, id.clone());
                any_success = true;
            }
        }

        post.status = if any_success {
            PostStatus::Published
        } else {
            PostStatus::Failed
        };
        post.updated_at = chrono::Utc::now().timestamp();
        Ok(post.status)
    }
}

impl Default for PostStore {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentFlag {
    Hidden,
    Spam,
    Replied,
}

/// Holds the reconciled comment inbox, one collection per platform.
pub struct CommentStore {
    by_platform: Mutex<HashMap<PlatformId, Vec<Comment>>>,
}

impl CommentStore {
    pub fn new() -> Self {
        Self {
            by_platform: Mutex::new(HashMap::new()),
        }
    }

    /// Swap in the reconciled set for one platform. The previous collection
    /// is discarded in the same operation, which keeps repeated fetch
    /// cycles from accumulating duplicates.
    pub fn replace_platform(&self, platform: PlatformId, comments: Vec<Comment>) {
        self.by_platform
            .lock()
            .expect("comment store poisoned")
            .insert(platform, comments);
    }

    pub fn for_platform(&self, platform: PlatformId) -> Vec<Comment> {
        self.by_platform
            .lock()
            .expect("comment store poisoned")
            .get(&platform)
            .cloned()
            .unwrap_or_default()
    }

    pub fn for_post(&self, local_post_id: &str) -> Vec<Comment> {
        self.all()
            .into_iter()
            .filter(|c| c.local_post_id == local_post_id)
            .collect()
    }

    /// All comments across platforms, newest first.
    pub fn all(&self) -> Vec<Comment> {
        let mut comments: Vec<Comment> = self
            .by_platform
            .lock()
            .expect("comment store poisoned")
            .values()
            .flatten()
            .cloned()
            .collect();
        comments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        comments
    }

    pub fn len(&self) -> usize {
        self.by_platform
            .lock()
            .expect("comment store poisoned")
            .values()
            .map(|v| v.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Operator moderation: set one flag on a comment. Returns false when
    /// the comment is not present.
    pub fn set_flag(&self, comment_id: &str, flag: CommentFlag, value: bool) -> bool {
        let mut map = self.by_platform.lock().expect("comment store poisoned");
        for comments in map.values_mut() {
            if let Some(comment) = comments.iter_mut().find(|c| c.id == comment_id) {
                match flag {
                    CommentFlag::Hidden => comment.hidden = value,
                    CommentFlag::Spam => comment.spam = value,
                    CommentFlag::Replied => comment.replied = value,
                }
                return true;
            }
        }
        false
    }

    /// Explicit operator deletion of a single comment.
    pub fn delete(&self, comment_id: &str) -> bool {
        let mut map = self.by_platform.lock().expect("comment store poisoned");
        for comments in map.values_mut() {
            let before = comments.len();
            comments.retain(|c| c.id != comment_id);
            if comments.len() != before {
                return true;
            }
        }
        false
    }

    /// Full reset of the local comment cache.
    pub fn reset(&self) {
        self.by_platform
            .lock()
            .expect("comment store poisoned")
            .clear();
    }
}

impl Default for CommentStore {
    fn default() -> Self {
        Self::new()
    }
}
