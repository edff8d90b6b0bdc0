//! # Cache Layer Module
//!
//! ## Purpose
//! Expiring cache with per-key single-flight semantics. The engine runs two
//! independent instances: a short-lived summary cache keyed by request shape
//! and a longer-lived raw-price cache keyed by region.
//!
//! ## Input/Output Specification
//! - **Input**: cache key plus an async compute closure for misses
//! - **Output**: shared (`Arc`) cached value, computed at most once per key at
//!   any point in time
//!
//! ## Semantics
//! - Entries are replaced whole, never mutated in place; readers can never
//!   observe a half-updated value.
//! - Expired entries are lazily replaced on next access, so memory is bounded
//!   by the number of distinct keys observed.
//! - Concurrent requests for the same key serialize on a per-key async mutex:
//!   the first computes, the rest wake up to a fresh entry and share it.
//!   Single-flight is a correctness requirement here, not an optimization:
//!   duplicate live fetches would double-count against upstream rate limits.
//! - A failed computation caches nothing; the next requester retries.

use crate::errors::Result;
use dashmap::DashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// A cached value with its creation time and lifetime
struct CacheEntry<V> {
    value: Arc<V>,
    created_at: Instant,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    fn is_fresh(&self) -> bool {
        self.created_at.elapsed() < self.ttl
    }
}

type Slot<V> = Arc<Mutex<Option<CacheEntry<V>>>>;

/// Expiring single-flight cache
pub struct TtlCache<K, V> {
    ttl: Duration,
    slots: DashMap<K, Slot<V>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slots: DashMap::new(),
        }
    }

    fn slot(&self, key: &K) -> Slot<V> {
        self.slots
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone()
    }

    /// Return the fresh cached value for `key`, or run `compute` to produce it.
    ///
    /// Holding the per-key lock across the computation gives single-flight:
    /// concurrent callers for the same key await the lock and then find the
    /// entry the winner wrote. Errors are propagated and not cached.
    pub async fn get_or_compute<F, Fut>(&self, key: &K, compute: F) -> Result<Arc<V>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        let slot = self.slot(key);
        let mut guard = slot.lock().await;

        if let Some(entry) = guard.as_ref() {
            if entry.is_fresh() {
                return Ok(entry.value.clone());
            }
        }

        let value = Arc::new(compute().await?);
        *guard = Some(CacheEntry {
            value: value.clone(),
            created_at: Instant::now(),
            ttl: self.ttl,
        });
        Ok(value)
    }

    /// Non-blocking freshness probe. Returns the value only when a fresh entry
    /// exists right now; a key with a computation in flight reads as absent.
    pub fn peek(&self, key: &K) -> Option<Arc<V>> {
        let slot = self.slots.get(key)?.clone();
        let guard = slot.try_lock().ok()?;
        guard
            .as_ref()
            .filter(|entry| entry.is_fresh())
            .map(|entry| entry.value.clone())
    }

    /// Number of keys ever observed (fresh or expired)
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::PricingError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn computes_once_and_caches() {
        let cache: TtlCache<String, u64> = TtlCache::new(Duration::from_secs(60));
        let calls = AtomicUsize::new(0);

        let key = "k".to_string();
        for _ in 0..3 {
            let value = cache
                .get_or_compute(&key, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(42)
                })
                .await
                .unwrap();
            assert_eq!(*value, 42);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_requests_share_one_flight() {
        let cache: Arc<TtlCache<String, u64>> = Arc::new(TtlCache::new(Duration::from_secs(60)));
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..10 {
            let cache = cache.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                let key = "shared".to_string();
                cache
                    .get_or_compute(&key, || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok(7u64)
                    })
                    .await
                    .unwrap()
            }));
        }

        for handle in handles {
            assert_eq!(*handle.await.unwrap(), 7);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expired_entries_are_replaced() {
        let cache: TtlCache<String, u64> = TtlCache::new(Duration::from_millis(30));
        let calls = AtomicUsize::new(0);
        let key = "k".to_string();

        let compute = || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(1u64)
        };
        cache.get_or_compute(&key, compute).await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(cache.peek(&key).is_none());

        cache
            .get_or_compute(&key, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(2u64)
            })
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let cache: TtlCache<String, u64> = TtlCache::new(Duration::from_secs(60));
        let key = "k".to_string();

        let err = cache
            .get_or_compute(&key, || async {
                Err(PricingError::Internal {
                    message: "boom".to_string(),
                })
            })
            .await;
        assert!(err.is_err());
        assert!(cache.peek(&key).is_none());

        let value = cache.get_or_compute(&key, || async { Ok(9u64) }).await.unwrap();
        assert_eq!(*value, 9);
    }

    #[tokio::test]
    async fn peek_only_sees_fresh_entries() {
        let cache: TtlCache<String, u64> = TtlCache::new(Duration::from_secs(60));
        let key = "k".to_string();
        assert!(cache.peek(&key).is_none());

        cache.get_or_compute(&key, || async { Ok(5u64) }).await.unwrap();
        assert_eq!(*cache.peek(&key).unwrap(), 5);
    }
}
