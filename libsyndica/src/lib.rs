//! libsyndica - multi-platform social publishing core
//!
//! Syndica publishes posts to several social platforms at once and keeps a
//! reconciled local view of the comments they receive. The pieces:
//!
//! - [`platforms`]: one adapter per platform behind a uniform
//!   [`platforms::PlatformClient`] contract
//! - [`registry`]: builds adapters from config and credentials, failing
//!   fast on missing secrets
//! - [`coordinator`]: fans a post out to its target platforms with
//!   partial-success semantics
//! - [`reconciler`]: merges directly fetched and activity-derived comments
//!   into one deduplicated inbox
//! - [`cache`]: stale-on-error response caching for expensive reads
//!
//! Binaries (`syn-post`, `syn-inbox`) are thin wrappers over this crate.

pub mod cache;
pub mod config;
pub mod coordinator;
pub mod credentials;
pub mod error;
pub mod http;
pub mod logging;
pub mod platforms;
pub mod reconciler;
pub mod registry;
pub mod store;
pub mod types;

pub use config::Config;
pub use coordinator::Coordinator;
pub use credentials::{CredentialBundle, CredentialStore, FileCredentialStore};
pub use error::{ApiError, ConfigError, CredentialError, Result, StoreError, SyndicaError};
pub use reconciler::{CycleReport, Reconciler};
pub use registry::AdapterRegistry;
pub use store::{CommentFlag, CommentStore, PostStore};
pub use types::{
    AccountStats, ActivityEvent, ActivityKind, Comment, CommentAuthor, CommentQuery, MediaBlob,
    MediaKind, MediaRef, PlatformId, Post, PostStatus, PublishResult,
};
