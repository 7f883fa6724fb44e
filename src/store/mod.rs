//! # Keyed TTL Store
//!
//! A concurrent key-value store with optional per-entry time-to-live.
//! Expiry is enforced at read time (expired entries are simply not returned)
//! and reclaimed by an explicit eviction pass, so callers never scatter
//! expiry checks. `spawn_evictor` runs that pass on an interval.

use dashmap::DashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    expires_at: Option<Instant>,
}

impl<V> Entry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

#[derive(Debug)]
pub struct TtlStore<K, V>
where
    K: Eq + Hash,
{
    entries: DashMap<K, Entry<V>>,
}

impl<K, V> Default for TtlStore<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl<K, V> TtlStore<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, optionally bounded by a time-to-live.
    pub fn insert(&self, key: K, value: V, ttl: Option<Duration>) {
        let entry = Entry {
            value,
            expires_at: ttl.map(|d| Instant::now() + d),
        };
        self.entries.insert(key, entry);
    }

    /// Fetch a value. Expired entries are treated as absent; reclamation is
    /// left to the eviction pass.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        self.entries.get(key).and_then(|entry| {
            if entry.is_expired(now) {
                None
            } else {
                Some(entry.value.clone())
            }
        })
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.entries.remove(key).map(|(_, entry)| entry.value)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Number of entries, including not-yet-evicted expired ones.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove all expired entries, returning how many were reclaimed.
    pub fn evict_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before - self.entries.len()
    }

    /// Spawn a background task that runs the eviction pass on an interval.
    /// Dropping the returned handle does not stop the task; abort it on
    /// shutdown.
    pub fn spawn_evictor(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let evicted = store.evict_expired();
                if evicted > 0 {
                    debug!(evicted, "ttl store eviction pass");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    #[tokio::test]
    async fn test_insert_and_get_without_ttl() {
        let store: TtlStore<String, u32> = TtlStore::new();
        store.insert("a".into(), 1, None);
        assert_eq!(store.get(&"a".into()), Some(1));
        assert!(store.contains(&"a".into()));
    }

    #[tokio::test]
    async fn test_expired_entry_is_absent_on_read() {
        let store: TtlStore<String, u32> = TtlStore::new();
        store.insert("a".into(), 1, Some(Duration::from_millis(10)));
        sleep(Duration::from_millis(25)).await;
        assert_eq!(store.get(&"a".into()), None);
        // Still physically present until eviction runs.
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_eviction_pass_reclaims_expired() {
        let store: TtlStore<String, u32> = TtlStore::new();
        store.insert("a".into(), 1, Some(Duration::from_millis(10)));
        store.insert("b".into(), 2, None);
        sleep(Duration::from_millis(25)).await;
        assert_eq!(store.evict_expired(), 1);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&"b".into()), Some(2));
    }

    #[tokio::test]
    async fn test_background_evictor() {
        let store: Arc<TtlStore<String, u32>> = Arc::new(TtlStore::new());
        store.insert("a".into(), 1, Some(Duration::from_millis(10)));
        let handle = store.spawn_evictor(Duration::from_millis(20));
        sleep(Duration::from_millis(60)).await;
        assert_eq!(store.len(), 0);
        handle.abort();
    }
}
