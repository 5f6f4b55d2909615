//! # Remote-Read Cache
//!
//! Time-boxed caching for the request-style accessors, with a
//! stale-fallback-on-failure policy: a fetch that fails is answered from the
//! last successful value of any age rather than surfacing an error, so the
//! worst case the 3D layers ever see is slightly old data.
//!
//! Entries are never actively expired: a stale entry is superseded by the
//! next successful fetch or kept indefinitely as a fallback. Each fetch is
//! tagged with a monotonic sequence number taken at start; a completion
//! older than what the entry already holds is discarded, so two overlapping
//! revalidations can never roll the cache backwards.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use tokio::time::{Duration, Instant};

struct CacheEntry<T> {
    value: T,
    fetched_at: Instant,
    seq: u64,
}

/// A keyed cache with a fixed freshness window.
pub struct TimedCache<T> {
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry<T>>>,
    next_seq: AtomicU64,
}

impl<T: Clone> TimedCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
            next_seq: AtomicU64::new(1),
        }
    }

    /// Returns the cached value for `key` when it is younger than the TTL;
    /// otherwise runs `fetch` and applies the overwrite/stale-fallback
    /// policy. `force` skips the fresh-hit branch entirely.
    ///
    /// Returns `None` only when the fetch fails and no value was ever
    /// cached; callers translate that into their documented empty value.
    pub async fn get_or_fetch<F, Fut>(&self, key: &str, force: bool, fetch: F) -> Option<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        if !force {
            let entries = self.entries.lock().expect("Cache lock poisoned");
            if let Some(entry) = entries.get(key) {
                if entry.fetched_at.elapsed() < self.ttl {
                    log::trace!("Cache hit for '{}'", key);
                    return Some(entry.value.clone());
                }
            }
        }

        // Taken before the await so overlapping fetches order by start time.
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);

        match fetch().await {
            Ok(value) => {
                let mut entries = self.entries.lock().expect("Cache lock poisoned");
                match entries.get(key) {
                    Some(existing) if existing.seq > seq => {
                        log::debug!(
                            "Discarding out-of-order completion for '{}' (a newer fetch already landed)",
                            key
                        );
                        Some(existing.value.clone())
                    }
                    _ => {
                        entries.insert(
                            key.to_string(),
                            CacheEntry {
                                value: value.clone(),
                                fetched_at: Instant::now(),
                                seq,
                            },
                        );
                        Some(value)
                    }
                }
            }
            Err(e) => {
                let entries = self.entries.lock().expect("Cache lock poisoned");
                match entries.get(key) {
                    Some(entry) => {
                        log::warn!("Fetch for '{}' failed: {}. Serving cached value.", key, e);
                        Some(entry.value.clone())
                    }
                    None => {
                        log::warn!("Fetch for '{}' failed: {}. No cached value available.", key, e);
                        None
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::sync::Arc;
    use tokio::sync::oneshot;

    const TTL: Duration = Duration::from_millis(30_000);

    #[tokio::test(start_paused = true)]
    async fn fresh_hit_skips_the_network() {
        let cache = TimedCache::new(TTL);
        let calls = AtomicU32::new(0);

        let fetch = || async {
            calls.fetch_add(1, Ordering::Relaxed);
            Ok(42u32)
        };
        assert_eq!(cache.get_or_fetch("k", false, fetch).await, Some(42));
        assert_eq!(calls.load(Ordering::Relaxed), 1);

        tokio::time::advance(Duration::from_millis(10_000)).await;
        let fetch = || async {
            calls.fetch_add(1, Ordering::Relaxed);
            Ok(43u32)
        };
        // Still fresh at t=10s: cached value, no second call.
        assert_eq!(cache.get_or_fetch("k", false, fetch).await, Some(42));
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entry_triggers_exactly_one_refetch() {
        let cache = TimedCache::new(TTL);
        let calls = AtomicU32::new(0);

        let fetch = || async {
            calls.fetch_add(1, Ordering::Relaxed);
            Ok(1u32)
        };
        cache.get_or_fetch("k", false, fetch).await;

        tokio::time::advance(Duration::from_millis(31_000)).await;
        let fetch = || async {
            calls.fetch_add(1, Ordering::Relaxed);
            Ok(2u32)
        };
        assert_eq!(cache.get_or_fetch("k", false, fetch).await, Some(2));
        assert_eq!(calls.load(Ordering::Relaxed), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_revalidation_serves_the_stale_value() {
        let cache = TimedCache::new(TTL);

        cache.get_or_fetch("k", false, || async { Ok(7u32) }).await;
        tokio::time::advance(Duration::from_millis(31_000)).await;

        let result = cache
            .get_or_fetch("k", false, || async { anyhow::bail!("backend down") })
            .await;
        assert_eq!(result, Some(7));
    }

    #[tokio::test(start_paused = true)]
    async fn first_fetch_failure_yields_none() {
        let cache: TimedCache<u32> = TimedCache::new(TTL);
        let result = cache
            .get_or_fetch("k", false, || async { anyhow::bail!("backend down") })
            .await;
        assert_eq!(result, None);
    }

    #[tokio::test(start_paused = true)]
    async fn force_bypasses_a_fresh_entry() {
        let cache = TimedCache::new(TTL);
        let calls = AtomicU32::new(0);

        let fetch = || async {
            calls.fetch_add(1, Ordering::Relaxed);
            Ok(1u32)
        };
        cache.get_or_fetch("k", false, fetch).await;

        let fetch = || async {
            calls.fetch_add(1, Ordering::Relaxed);
            Ok(2u32)
        };
        assert_eq!(cache.get_or_fetch("k", true, fetch).await, Some(2));
        assert_eq!(calls.load(Ordering::Relaxed), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn keys_are_independent() {
        let cache = TimedCache::new(TTL);
        cache.get_or_fetch("a", false, || async { Ok(1u32) }).await;
        cache.get_or_fetch("b", false, || async { Ok(2u32) }).await;

        assert_eq!(cache.get_or_fetch("a", false, || async { Ok(9u32) }).await, Some(1));
        assert_eq!(cache.get_or_fetch("b", false, || async { Ok(9u32) }).await, Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn out_of_order_completion_is_discarded() {
        let cache = Arc::new(TimedCache::new(TTL));
        let (older_gate_tx, older_gate_rx) = oneshot::channel::<()>();
        let (newer_gate_tx, newer_gate_rx) = oneshot::channel::<()>();

        // Started first (lower seq), finishes last.
        let older = {
            let cache = Arc::clone(&cache);
            async move {
                cache
                    .get_or_fetch("k", false, move || async move {
                        older_gate_rx.await.ok();
                        Ok(1u32)
                    })
                    .await
            }
        };
        // Started second (higher seq), finishes first.
        let newer = {
            let cache = Arc::clone(&cache);
            async move {
                cache
                    .get_or_fetch("k", false, move || async move {
                        newer_gate_rx.await.ok();
                        Ok(2u32)
                    })
                    .await
            }
        };

        let older_task = tokio::spawn(older);
        tokio::task::yield_now().await; // let the older fetch claim its seq
        let newer_task = tokio::spawn(newer);
        tokio::task::yield_now().await;

        newer_gate_tx.send(()).unwrap();
        let newer_result = newer_task.await.unwrap();
        assert_eq!(newer_result, Some(2));

        older_gate_tx.send(()).unwrap();
        let older_result = older_task.await.unwrap();
        // The older completion is discarded; the fresher value wins.
        assert_eq!(older_result, Some(2));

        let final_value = cache.get_or_fetch("k", false, || async { Ok(9u32) }).await;
        assert_eq!(final_value, Some(2));
    }
}
