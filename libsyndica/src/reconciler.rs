//! Comment reconciliation
//!
//! Comments arrive through two paths: direct fetches against a post's
//! comment endpoint (authoritative, platform-native ids) and entries
//! derived from the coarse activity feed (approximate, no native id). A
//! cycle merges both into one deduplicated set per platform and swaps it
//! into the comment store in a single operation. Identity across the two
//! paths is the composite of platform, parent post id, and trimmed text.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::platforms::FetchedComment;
use crate::registry::AdapterRegistry;
use crate::store::{CommentStore, PostStore};
use crate::types::{
    ActivityEvent, ActivityKind, Comment, CommentAuthor, CommentKey, CommentQuery, PlatformId,
};

/// Per-platform outcome of one reconciliation cycle.
#[derive(Debug, Clone, Default)]
pub struct PlatformCycle {
    /// Comments fetched directly from post comment endpoints.
    pub fetched: usize,
    /// Comments derived from the activity feed.
    pub derived: usize,
    /// Deduplicated total swapped into the store.
    pub stored: usize,
    /// Activity entries dropped because no local post could be resolved.
    pub dropped: usize,
    /// True when a fetch error left this platform's stored comments as
    /// they were.
    pub failed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    /// True when another cycle was already running and this one did
    /// nothing.
    pub skipped: bool,
    pub platforms: BTreeMap<PlatformId, PlatformCycle>,
}

pub struct Reconciler {
    registry: Arc<AdapterRegistry>,
    posts: Arc<PostStore>,
    comments: Arc<CommentStore>,
    in_flight: AtomicBool,
}

impl Reconciler {
    pub fn new(
        registry: Arc<AdapterRegistry>,
        posts: Arc<PostStore>,
        comments: Arc<CommentStore>,
    ) -> Self {
        Self {
            registry,
            posts,
            comments,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Run one full reconciliation cycle across all configured platforms.
    ///
    /// Overlapping invocations are a no-op: if a cycle is already in
    /// flight the report comes back with `skipped` set.
    pub async fn run_cycle(&self) -> CycleReport {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            debug!("reconciliation already in flight, skipping");
            return CycleReport {
                skipped: true,
                ..CycleReport::default()
            };
        }
        let _guard = InFlightGuard(&self.in_flight);

        let mut report = CycleReport::default();
        for adapter in self.registry.iter() {
            let platform = adapter.id();
            let cycle = self.reconcile_platform(platform).await;
            info!(
                %platform,
                fetched = cycle.fetched,
                derived = cycle.derived,
                stored = cycle.stored,
                failed = cycle.failed,
                "reconciliation cycle complete"
            );
            report.platforms.insert(platform, cycle);
        }
        report
    }

    async fn reconcile_platform(&self, platform: PlatformId) -> PlatformCycle {
        let Some(adapter) = self.registry.get(platform) else {
            return PlatformCycle::default();
        };
        let mut cycle = PlatformCycle::default();

        // Direct path: every local post published on this platform.
        let mut direct: Vec<Comment> = Vec::new();
        for post in self.posts.list() {
            let Some(external_id) = post.published_ids.get(&platform) else {
                continue;
            };
            match adapter
                .get_comments(external_id, &CommentQuery::default())
                .await
            {
                Ok(fetched) => {
                    cycle.fetched += fetched.len();
                    direct.extend(fetched.into_iter().map(|c| {
                        into_comment(platform, post.id.clone(), external_id.clone(), c)
                    }));
                }
                Err(e) => {
                    // Leave the previous reconciled set in place rather
                    // than swapping in a partial one.
                    warn!(%platform, post = %post.id, error = %e, "comment fetch failed");
                    cycle.failed = true;
                    return cycle;
                }
            }
        }

        // Approximate path: the activity feed, which may mention comments
        // the direct path has not surfaced yet.
        let derived = match adapter.account_stats().await {
            Ok(stats) => {
                let (derived, dropped) = self.derive_from_activity(platform, &stats.recent_activity);
                cycle.dropped = dropped;
                derived
            }
            Err(e) => {
                warn!(%platform, error = %e, "activity fetch failed, using direct comments only");
                Vec::new()
            }
        };
        cycle.derived = derived.len();

        let merged = merge(direct, derived);
        cycle.stored = merged.len();
        self.comments.replace_platform(platform, merged);
        cycle
    }

    /// Turn activity feed entries into approximate comments. Entries whose
    /// platform post cannot be matched to any local post fall back to the
    /// most recently published post on that platform; with no published
    /// posts at all they are dropped.
    fn derive_from_activity(
        &self,
        platform: PlatformId,
        events: &[ActivityEvent],
    ) -> (Vec<Comment>, usize) {
        let mut derived = Vec::new();
        let mut dropped = 0;

        for event in events {
            if event.kind != ActivityKind::CommentReceived {
                continue;
            }
            let local_post_id = match self
                .posts
                .find_by_published_id(platform, &event.platform_post_id)
            {
                Some(post) => post.id,
                None => match self.posts.latest_published_for(platform) {
                    Some(post) => {
                        debug!(
                            %platform,
                            external = %event.platform_post_id,
                            fallback = %post.id,
                            "activity entry attached to most recent post"
                        );
                        post.id
                    }
                    None => {
                        debug!(
                            %platform,
                            external = %event.platform_post_id,
                            "dropping unresolvable activity entry"
                        );
                        dropped += 1;
                        continue;
                    }
                },
            };

            let mut comment = Comment::new(
                platform,
                local_post_id,
                event.platform_post_id.clone(),
                None,
                event.summary.clone(),
                CommentAuthor::default(),
            );
            comment.created_at = event.occurred_at;
            derived.push(comment);
        }

        (derived, dropped)
    }
}

struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

fn into_comment(
    platform: PlatformId,
    local_post_id: String,
    platform_post_id: String,
    fetched: FetchedComment,
) -> Comment {
    let mut comment = Comment::new(
        platform,
        local_post_id,
        platform_post_id,
        Some(fetched.platform_comment_id),
        fetched.text,
        fetched.author,
    );
    comment.like_count = fetched.like_count;
    comment.created_at = fetched.created_at;
    comment
}

/// Deduplicate by identity key. An authoritative comment always wins over
/// an approximate one under the same key; an approximate comment never
/// displaces anything.
fn merge(direct: Vec<Comment>, derived: Vec<Comment>) -> Vec<Comment> {
    let mut by_key: HashMap<CommentKey, Comment> = HashMap::new();
    for comment in direct.into_iter().chain(derived) {
        match by_key.get(&comment.identity_key()) {
            Some(existing) if existing.is_authoritative() => {}
            _ => {
                by_key.insert(comment.identity_key(), comment);
            }
        }
    }
    let mut merged: Vec<Comment> = by_key.into_values().collect();
    merged.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    merged
}
