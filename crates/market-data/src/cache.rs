//! Generic TTL cache with request coalescing.
//!
//! Entries are checked for expiry on read; nothing is evicted in the
//! background because the key space is bounded by the active watchlist.
//! Expired entries stay readable through [`ResourceCache::get_stale`] as a
//! last-resort fallback and are overwritten by the next successful fetch.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use log::warn;

#[derive(Clone, Debug)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

/// Outcome of [`ResourceCache::get_or_fetch`].
#[derive(Clone, Debug, PartialEq)]
pub enum CacheLookup<V> {
    /// Served from a fresh entry (possibly one filled by a concurrent caller).
    Cached(V),
    /// This call ran the fetch.
    Fetched(V),
}

impl<V> CacheLookup<V> {
    pub fn into_inner(self) -> V {
        match self {
            Self::Cached(v) | Self::Fetched(v) => v,
        }
    }
}

/// One async lock per key with a fetch in progress. It remembers the
/// failure of the last fetch for the callers still queued on it.
type FetchSlot<E> = Arc<tokio::sync::Mutex<Option<E>>>;

pub struct ResourceCache<K, V, E = ()> {
    entries: Mutex<HashMap<K, CacheEntry<V>>>,
    inflight: Mutex<HashMap<K, FetchSlot<E>>>,
}

impl<K, V, E> ResourceCache<K, V, E>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            inflight: Mutex::new(HashMap::new()),
        }
    }

    fn lock_entries(&self) -> MutexGuard<'_, HashMap<K, CacheEntry<V>>> {
        self.entries.lock().unwrap_or_else(|poisoned| {
            warn!("Cache entries mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn lock_inflight(&self) -> MutexGuard<'_, HashMap<K, FetchSlot<E>>> {
        self.inflight.lock().unwrap_or_else(|poisoned| {
            warn!("Cache inflight mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Fresh value and its expiry, or `None` when missing or expired.
    pub fn get(&self, key: &K) -> Option<(V, Instant)> {
        self.get_at(key, Instant::now())
    }

    pub fn get_at(&self, key: &K, now: Instant) -> Option<(V, Instant)> {
        self.lock_entries()
            .get(key)
            .filter(|entry| now < entry.expires_at)
            .map(|entry| (entry.value.clone(), entry.expires_at))
    }

    pub fn put(&self, key: K, value: V, ttl: Duration) {
        let expires_at = Instant::now() + ttl;
        self.lock_entries()
            .insert(key, CacheEntry { value, expires_at });
    }

    /// Last stored value regardless of expiry.
    pub fn get_stale(&self, key: &K) -> Option<V> {
        self.lock_entries().get(key).map(|entry| entry.value.clone())
    }

    pub fn len(&self) -> usize {
        self.lock_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Serve a fresh entry, or run `fetch` once for all concurrent callers of
    /// the same key and cache its success for `ttl`.
    ///
    /// Callers that queued behind a successful fetch get its value as
    /// `Cached`. Callers queued behind a failed fetch get the same error
    /// without fetching again. The failure is forgotten once the last of them
    /// returns and is never cached.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        key: &K,
        ttl: Duration,
        fetch: F,
    ) -> Result<CacheLookup<V>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
        E: Clone,
    {
        if let Some((value, _)) = self.get(key) {
            return Ok(CacheLookup::Cached(value));
        }

        let key_lock = self
            .lock_inflight()
            .entry(key.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(None)))
            .clone();

        let result = {
            let mut failure = key_lock.lock().await;

            if let Some((value, _)) = self.get(key) {
                Ok(CacheLookup::Cached(value))
            } else if let Some(e) = failure.as_ref() {
                Err(e.clone())
            } else {
                match fetch().await {
                    Ok(value) => {
                        self.put(key.clone(), value.clone(), ttl);
                        Ok(CacheLookup::Fetched(value))
                    }
                    Err(e) => {
                        *failure = Some(e.clone());
                        Err(e)
                    }
                }
            }
        };

        // Last one out removes the key lock (the map holds one reference, we hold another).
        let mut inflight = self.lock_inflight();
        if let Some(existing) = inflight.get(key) {
            if Arc::ptr_eq(existing, &key_lock) && Arc::strong_count(&key_lock) <= 2 {
                inflight.remove(key);
            }
        }

        result
    }
}

impl<K, V, E> Default for ResourceCache<K, V, E>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
