//! In-memory TTL cache with request coalescing, grounded on
//! `src/database/netbox_cache.py`'s `_cache`/`_inflight_requests` module
//! globals — re-expressed as an explicit struct owned by `AppContext`
//! rather than a process singleton (spec.md §9's "global mutable caches"
//! re-architecture note).

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OnceCell};

/// Typed TTL defaults (spec.md §4.2). VRFs/tenant/roles/site-groups/
/// VLAN-groups use `LONG`; the tenant id and full prefix list use `MEDIUM`.
pub mod ttl {
    use std::time::Duration;

    pub const SHORT: Duration = Duration::from_secs(300);
    pub const MEDIUM: Duration = Duration::from_secs(600);
    pub const LONG: Duration = Duration::from_secs(3600);
}

#[derive(Clone)]
struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    fn is_fresh(&self) -> bool {
        self.inserted_at.elapsed() < self.ttl
    }
}

type InflightCell<V, E> = Arc<OnceCell<Result<V, E>>>;

/// A TTL cache over a single value type, with coalesced fetches keyed by
/// string. One instance per logical cache (`prefixes`, `vlans`, ...) —
/// `AppContext` owns one per kind rather than a single `Any`-typed map, to
/// keep callers' types concrete.
pub struct ReferenceCache<V, E> {
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
    inflight: Mutex<HashMap<String, InflightCell<V, E>>>,
}

impl<V, E> Default for ReferenceCache<V, E>
where
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V, E> ReferenceCache<V, E>
where
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// Non-fetching lookup: `None` on miss or expiry.
    pub async fn get(&self, key: &str) -> Option<V> {
        let entries = self.entries.lock().await;
        entries.get(key).filter(|e| e.is_fresh()).map(|e| e.value.clone())
    }

    pub async fn set(&self, key: &str, value: V, ttl: Duration) {
        let mut entries = self.entries.lock().await;
        entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                inserted_at: Instant::now(),
                ttl,
            },
        );
    }

    pub async fn invalidate(&self, key: &str) {
        let mut entries = self.entries.lock().await;
        entries.remove(key);
    }

    /// Fetch-with-coalescing: on a cache miss, concurrent callers for the
    /// same key share one in-flight fetch instead of issuing parallel
    /// requests. On completion (success or failure) the in-flight entry is
    /// unregistered; on success the value is cached under `ttl`.
    pub async fn get_or_fetch<F, Fut>(&self, key: &str, ttl: Duration, fetch: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(key).await {
            return Ok(value);
        }

        let cell = {
            let mut inflight = self.inflight.lock().await;
            inflight.entry(key.to_string()).or_insert_with(|| Arc::new(OnceCell::new())).clone()
        };

        let result = cell.get_or_try_init(fetch).await.cloned();

        {
            let mut inflight = self.inflight.lock().await;
            inflight.remove(key);
        }

        if let Ok(value) = &result {
            self.set(key, value.clone(), ttl).await;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn miss_then_hit() {
        let cache: ReferenceCache<String, String> = ReferenceCache::new();
        let result = cache
            .get_or_fetch("tenant", ttl::MEDIUM, || async { Ok::<_, String>("redbull".to_string()) })
            .await
            .unwrap();
        assert_eq!(result, "redbull");
        assert_eq!(cache.get("tenant").await, Some("redbull".to_string()));
    }

    #[tokio::test]
    async fn concurrent_misses_coalesce_into_one_fetch() {
        let cache: Arc<ReferenceCache<u32, String>> = Arc::new(ReferenceCache::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..10 {
            let cache = cache.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_fetch("vrfs", ttl::LONG, || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok::<_, String>(42)
                    })
                    .await
            }));
        }

        for h in handles {
            assert_eq!(h.await.unwrap().unwrap(), 42);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalidate_forces_refetch() {
        let cache: ReferenceCache<u32, String> = ReferenceCache::new();
        cache.set("prefixes", 1, ttl::MEDIUM).await;
        cache.invalidate("prefixes").await;
        assert_eq!(cache.get("prefixes").await, None);
    }
}
