//! Response cache with stale-on-error fallback
//!
//! Read endpoints that are expensive or rate-limited (media lists, comment
//! threads, account stats) go through a per-adapter [`ResponseCache`]. A
//! fresh entry short-circuits the refresh; a failed refresh falls back to
//! the last good value regardless of age, because for display reads a stale
//! answer beats an error. The cache is never consulted before a write
//! decision.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::Result;

struct CacheEntry<V> {
    value: V,
    fetched_at: Instant,
}

/// In-memory cache keyed by resource key, one instance per adapter.
pub struct ResponseCache<V> {
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
}

impl<V: Clone> ResponseCache<V> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Return the cached value for `key` if fresher than `ttl`; otherwise
    /// call `refresh`. A successful refresh is stored and returned. A failed
    /// refresh returns the stale value when one exists; the error propagates
    /// only when nothing was ever fetched for this key.
    pub async fn get<F, Fut>(&self, key: &str, ttl: Duration, refresh: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        {
            let entries = self.entries.lock().expect("cache lock poisoned");
            if let Some(entry) = entries.get(key) {
                if entry.fetched_at.elapsed() < ttl {
                    debug!(key, "cache hit");
                    return Ok(entry.value.clone());
                }
            }
        }

        match refresh().await {
            Ok(value) => {
                let mut entries = self.entries.lock().expect("cache lock poisoned");
                entries.insert(
                    key.to_string(),
                    CacheEntry {
                        value: value.clone(),
                        fetched_at: Instant::now(),
                    },
                );
                Ok(value)
            }
            Err(e) => {
                let entries = self.entries.lock().expect("cache lock poisoned");
                match entries.get(key) {
                    Some(entry) => {
                        warn!(key, error = %e, "refresh failed, serving stale cached value");
                        Ok(entry.value.clone())
                    }
                    None => Err(e),
                }
            }
        }
    }

    /// Drop the entry for `key`, forcing the next read to refresh.
    pub fn invalidate(&self, key: &str) {
        self.entries
            .lock()
            .expect("cache lock poisoned")
            .remove(key);
    }

    pub fn clear(&self) {
        self.entries.lock().expect("cache lock poisoned").clear();
    }
}

impl<V: Clone> Default for ResponseCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const LONG: Duration = Duration::from_secs(3600);
    const ZERO: Duration = Duration::from_secs(0);

    #[tokio::test]
    async fn test_fresh_entry_calls_refresh_once() {
        let cache: ResponseCache<u32> = ResponseCache::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value = cache
                .get("stats", LONG, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(7)
                })
                .await
                .unwrap();
            assert_eq!(value, 7);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stale_value_served_on_refresh_failure() {
        let cache: ResponseCache<u32> = ResponseCache::new();

        // Seed, then force every later read to refresh via a zero TTL.
        cache.get("k", LONG, || async { Ok(1) }).await.unwrap();

        let value = cache
            .get("k", ZERO, || async {
                Err(ApiError::PlatformUnavailable("503".to_string()).into())
            })
            .await
            .unwrap();
        assert_eq!(value, 1, "stale value should be served, not an error");
    }

    #[tokio::test]
    async fn test_error_propagates_with_no_prior_value() {
        let cache: ResponseCache<u32> = ResponseCache::new();

        let result = cache
            .get("never-fetched", LONG, || async {
                Err(ApiError::NetworkUnreachable("down".to_string()).into())
            })
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_successful_refresh_replaces_stale_value() {
        let cache: ResponseCache<u32> = ResponseCache::new();

        cache.get("k", LONG, || async { Ok(1) }).await.unwrap();
        let value = cache.get("k", ZERO, || async { Ok(2) }).await.unwrap();
        assert_eq!(value, 2);

        // And the new value is now the cached one.
        let value = cache
            .get("k", LONG, || async {
                Err(ApiError::Unknown("unused".to_string()).into())
            })
            .await
            .unwrap();
        assert_eq!(value, 2);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refresh() {
        let cache: ResponseCache<u32> = ResponseCache::new();
        let calls = AtomicUsize::new(0);

        let fetch = || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(9)
        };
        cache.get("k", LONG, fetch).await.unwrap();
        cache.invalidate("k");
        cache.get("k", LONG, fetch).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalidate_also_drops_stale_fallback() {
        let cache: ResponseCache<u32> = ResponseCache::new();

        cache.get("k", LONG, || async { Ok(1) }).await.unwrap();
        cache.invalidate("k");

        let result = cache
            .get("k", LONG, || async {
                Err(ApiError::PlatformUnavailable("503".to_string()).into())
            })
            .await;
        assert!(result.is_err(), "invalidated entry must not serve stale data");
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let cache: ResponseCache<u32> = ResponseCache::new();

        cache.get("a", LONG, || async { Ok(1) }).await.unwrap();
        let b = cache.get("b", LONG, || async { Ok(2) }).await.unwrap();
        assert_eq!(b, 2);
    }
}
