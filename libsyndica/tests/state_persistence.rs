//! Post state survives across separate store instances, the way the
//! publish and inbox binaries hand state to each other.

use anyhow::Result;
use libsyndica::platforms::MockPlatform;
use libsyndica::registry::AdapterRegistry;
use libsyndica::{CommentStore, Coordinator, PlatformId, Post, PostStore, Reconciler};
use std::sync::Arc;
use tempfile::TempDir;

#[tokio::test]
async fn test_publish_state_feeds_later_reconcile() -> Result<()> {
    let dir = TempDir::new()?;
    let state_path = dir.path().join("posts.json");

    let mock = Arc::new(MockPlatform::new(PlatformId::Twitter));
    let mut registry = AdapterRegistry::empty();
    registry.register(mock.clone());
    let registry = Arc::new(registry);

    // First process: publish and persist.
    let post_id = {
        let posts = PostStore::load(&state_path)?;
        let post = Post::new("persisted".to_string(), vec![PlatformId::Twitter]);
        let id = post.id.clone();
        posts.insert(post.clone());

        let result = Coordinator::new(registry.clone()).publish(&post).await;
        posts.apply_publish_result(&id, &result)?;
        posts.save(&state_path)?;
        id
    };

    // Second process: reload and reconcile against the published ids.
    let posts = Arc::new(PostStore::load(&state_path)?);
    assert!(posts
        .get(&post_id)
        .unwrap()
        .published_ids
        .contains_key(&PlatformId::Twitter));

    mock.set_comments(vec![libsyndica::platforms::FetchedComment {
        platform_comment_id: "tw-c1".to_string(),
        text: "still here".to_string(),
        author: Default::default(),
        like_count: 0,
        created_at: 42,
    }]);

    let comments = Arc::new(CommentStore::new());
    Reconciler::new(registry, posts, comments.clone())
        .run_cycle()
        .await;

    let inbox = comments.all();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].local_post_id, post_id);
    Ok(())
}
