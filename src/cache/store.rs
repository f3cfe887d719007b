//! Cache Store Module
//!
//! Main cache engine: a locked HashMap of entries, each owning the timer that
//! will expire it.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::runtime::Handle;
use tracing::debug;

use crate::cache::{CacheEntry, CacheStats, StatsCounters};
use crate::error::{CacheError, Result};
use crate::scheduler::{ExpiryScheduler, ShutdownSummary};

// == Store Inner ==
struct StoreInner<K, V> {
    /// Key-value storage
    entries: RwLock<HashMap<K, CacheEntry<V>>>,
    /// Timers owned by this store alone
    scheduler: ExpiryScheduler,
    /// Performance statistics
    stats: StatsCounters,
    /// TTL applied when a write does not carry one
    default_ttl: Duration,
    /// Source of entry generations
    generations: AtomicU64,
}

impl<K, V> StoreInner<K, V>
where
    K: Eq + Hash + Debug,
{
    // == Expire ==
    /// Timer callback: removes `key` only if it still holds the entry with
    /// `generation`.
    fn expire(&self, key: &K, generation: u64) {
        let mut entries = self.entries.write();
        let current = entries
            .get(key)
            .is_some_and(|entry| entry.generation() == generation);

        if current {
            entries.remove(key);
            self.stats.record_expiration();
            debug!(key = ?key, generation, "Entry expired");
        } else {
            debug!(key = ?key, generation, "Ignoring expiry of replaced entry");
        }
    }
}

// == Cache Store ==
/// Concurrent key-value cache where every entry expires after a TTL.
///
/// Cloning is cheap and yields another handle to the same store. All
/// mutations, including timer-driven expiry, go through one lock over the
/// key space, so per-key operations are linearizable.
pub struct CacheStore<K = String, V = String> {
    inner: Arc<StoreInner<K, V>>,
}

impl<K, V> Clone for CacheStore<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> CacheStore<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    // == Constructors ==
    /// Creates an empty store whose timers run on the current tokio runtime.
    ///
    /// # Panics
    /// Panics when called outside of a tokio runtime.
    pub fn new(default_ttl: Duration) -> Self {
        Self::with_scheduler(ExpiryScheduler::current(), default_ttl)
    }

    /// Creates an empty store whose timers run on `runtime`.
    pub fn with_runtime(runtime: Handle, default_ttl: Duration) -> Self {
        Self::with_scheduler(ExpiryScheduler::new(runtime), default_ttl)
    }

    fn with_scheduler(scheduler: ExpiryScheduler, default_ttl: Duration) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                entries: RwLock::new(HashMap::new()),
                scheduler,
                stats: StatsCounters::new(),
                default_ttl,
                generations: AtomicU64::new(1),
            }),
        }
    }

    // == Get ==
    /// Returns the value for `key`, or `None` if it was never set or has
    /// expired.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let entries = self.inner.entries.read();
        match entries.get(key) {
            Some(entry) if !entry.is_expired() => {
                self.inner.stats.record_hit();
                Some(entry.value.clone())
            }
            _ => {
                self.inner.stats.record_miss();
                None
            }
        }
    }

    // == Set ==
    /// Stores a key-value pair that expires after `ttl`, or after the
    /// store's default TTL when `ttl` is `None`.
    ///
    /// An existing entry for `key` is replaced and its timer cancelled; the
    /// new entry gets a fresh timer. A zero TTL is rejected.
    pub fn set(&self, key: K, value: V, ttl: Option<Duration>) -> Result<()> {
        let ttl = self.resolve_ttl(ttl)?;
        let mut entries = self.inner.entries.write();
        self.install(&mut entries, key, value, ttl)
    }

    // == Remove ==
    /// Removes `key`, cancelling its timer, and returns the previous value.
    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let removed = self.inner.entries.write().remove(key)?;
        removed.cancel_expiry();

        if removed.is_expired() {
            self.inner.stats.record_expiration();
            return None;
        }
        self.inner.stats.record_removal();
        Some(removed.value)
    }

    // == Introspection ==
    /// Returns true if `key` holds a live entry.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner
            .entries
            .read()
            .get(key)
            .is_some_and(|entry| !entry.is_expired())
    }

    /// Time left before `key` expires.
    pub fn ttl_remaining<Q>(&self, key: &Q) -> Option<Duration>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner
            .entries
            .read()
            .get(key)
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.ttl_remaining())
    }

    /// Returns the current number of entries in the cache.
    pub fn len(&self) -> usize {
        self.inner.entries.read().len()
    }

    /// Returns true if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.entries.read().is_empty()
    }

    pub fn default_ttl(&self) -> Duration {
        self.inner.default_ttl
    }

    /// Number of expiry timers that are still waiting to fire.
    pub fn pending_timers(&self) -> usize {
        self.inner.scheduler.pending()
    }

    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.inner.stats.snapshot(self.len())
    }

    // == Shutdown ==
    /// Stops the expiry scheduler, waiting up to `grace` for running
    /// callbacks. The store must not be used afterwards.
    pub async fn shutdown(&self, grace: Duration) -> ShutdownSummary {
        self.inner.scheduler.shutdown(grace).await
    }

    // == Bulk Access ==
    /// Copies every live key-value pair.
    ///
    /// The read lock is held only while copying, so the result reflects one
    /// instant but may be stale by the time the caller uses it.
    pub(crate) fn snapshot_entries(&self) -> Vec<(K, V)> {
        self.inner
            .entries
            .read()
            .iter()
            .filter(|(_, entry)| !entry.is_expired())
            .map(|(key, entry)| (key.clone(), entry.value.clone()))
            .collect()
    }

    /// Replaces the store contents with `items`, each under the default TTL.
    ///
    /// Entries and their timers are built before the write lock is taken;
    /// the lock only covers swapping the maps.
    pub(crate) fn replace_all(&self, items: Vec<(K, V)>) -> Result<usize> {
        let ttl = self.resolve_ttl(None)?;
        if self.inner.scheduler.is_closed() {
            return Err(CacheError::ShutDown);
        }

        let mut fresh = HashMap::with_capacity(items.len());
        for (key, value) in items {
            match self.new_entry(&key, value, ttl) {
                Ok(entry) => {
                    if let Some(previous) = fresh.insert(key, entry) {
                        previous.cancel_expiry();
                    }
                }
                Err(err) => {
                    for entry in fresh.values() {
                        entry.cancel_expiry();
                    }
                    return Err(err);
                }
            }
        }

        let (previous, count) = {
            let mut entries = self.inner.entries.write();
            let previous = std::mem::replace(&mut *entries, fresh);

            // A timer that fired before the swap found nothing to remove.
            let before = entries.len();
            entries.retain(|_, entry| !entry.expiry().has_fired());
            for _ in entries.len()..before {
                self.inner.stats.record_expiration();
            }
            (previous, entries.len())
        };

        for entry in previous.values() {
            entry.cancel_expiry();
        }
        for _ in 0..count {
            self.inner.stats.record_set();
        }
        Ok(count)
    }

    // == Internals ==
    fn resolve_ttl(&self, ttl: Option<Duration>) -> Result<Duration> {
        let ttl = ttl.unwrap_or(self.inner.default_ttl);
        if ttl.is_zero() {
            return Err(CacheError::InvalidRequest(
                "TTL must be a positive number of milliseconds".to_string(),
            ));
        }
        Ok(ttl)
    }

    fn install(
        &self,
        entries: &mut HashMap<K, CacheEntry<V>>,
        key: K,
        value: V,
        ttl: Duration,
    ) -> Result<()> {
        // Schedule before touching the old entry so a rejected timer leaves it intact.
        let entry = self.new_entry(&key, value, ttl)?;

        if let Some(previous) = entries.get(&key) {
            previous.cancel_expiry();
        }

        entries.insert(key, entry);
        self.inner.stats.record_set();
        Ok(())
    }

    /// Builds an entry for `key` with a freshly scheduled expiry timer.
    fn new_entry(&self, key: &K, value: V, ttl: Duration) -> Result<CacheEntry<V>> {
        let generation = self.inner.generations.fetch_add(1, Ordering::Relaxed);
        let store = Arc::downgrade(&self.inner);
        let expiring = key.clone();

        let timer = self.inner.scheduler.schedule(ttl, move || {
            if let Some(inner) = store.upgrade() {
                inner.expire(&expiring, generation);
            }
        })?;

        debug!(key = ?key, generation, ttl_ms = ttl.as_millis() as u64, "SET");
        Ok(CacheEntry::new(value, generation, ttl, timer))
    }
}

impl<K, V> Debug for CacheStore<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("entries", &self.inner.entries.read().len())
            .field("default_ttl", &self.inner.default_ttl)
            .finish()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    const DEFAULT_TTL: Duration = Duration::from_millis(5000);

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    async fn sleep_ms(millis: u64) {
        tokio::time::sleep(ms(millis)).await;
    }

    fn generation_of(store: &CacheStore, key: &str) -> u64 {
        store.inner.entries.read().get(key).unwrap().generation()
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_new() {
        let store: CacheStore = CacheStore::new(DEFAULT_TTL);
        assert_eq!(store.len(), 0);
        assert!(store.is_empty());
        assert_eq!(store.default_ttl(), DEFAULT_TTL);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_set_and_get() {
        let store = CacheStore::new(DEFAULT_TTL);

        store.set("key1".to_string(), "value1".to_string(), None).unwrap();

        assert_eq!(store.get("key1"), Some("value1".to_string()));
        assert_eq!(store.len(), 1);
        assert_eq!(store.pending_timers(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_get_nonexistent() {
        let store: CacheStore = CacheStore::new(DEFAULT_TTL);
        assert_eq!(store.get("nonexistent"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_remove() {
        let store = CacheStore::new(DEFAULT_TTL);

        store.set("key1".to_string(), "value1".to_string(), None).unwrap();

        assert_eq!(store.remove("key1"), Some("value1".to_string()));
        assert!(store.is_empty());
        assert_eq!(store.get("key1"), None);
        assert_eq!(store.pending_timers(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_remove_nonexistent() {
        let store: CacheStore = CacheStore::new(DEFAULT_TTL);
        assert_eq!(store.remove("nonexistent"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_overwrite() {
        let store = CacheStore::new(DEFAULT_TTL);

        store.set("key1".to_string(), "value1".to_string(), None).unwrap();
        store.set("key1".to_string(), "value2".to_string(), None).unwrap();

        assert_eq!(store.get("key1"), Some("value2".to_string()));
        assert_eq!(store.len(), 1);
        assert_eq!(store.pending_timers(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_ttl_expiration() {
        let store = CacheStore::new(DEFAULT_TTL);

        store.set("key1".to_string(), "value1".to_string(), Some(ms(1000))).unwrap();
        assert_eq!(store.get("key1"), Some("value1".to_string()));

        sleep_ms(1001).await;

        assert_eq!(store.get("key1"), None);
        assert!(store.is_empty(), "Timer should have removed the entry");
        assert_eq!(store.stats().expirations, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_default_ttl_applies() {
        let store = CacheStore::new(ms(300));

        store.set("key1".to_string(), "value1".to_string(), None).unwrap();

        sleep_ms(299).await;
        assert!(store.contains_key("key1"));

        sleep_ms(2).await;
        assert!(!store.contains_key("key1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reschedule_resets_deadline() {
        let store = CacheStore::new(DEFAULT_TTL);

        store.set("key".to_string(), "v1".to_string(), Some(ms(1000))).unwrap();
        sleep_ms(500).await;
        store.set("key".to_string(), "v2".to_string(), Some(ms(1000))).unwrap();

        sleep_ms(600).await;
        assert_eq!(store.get("key"), Some("v2".to_string()));

        sleep_ms(500).await;
        assert_eq!(store.get("key"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_expiry_does_not_remove_new_value() {
        let store = CacheStore::new(DEFAULT_TTL);

        store.set("key".to_string(), "v1".to_string(), None).unwrap();
        let stale = generation_of(&store, "key");
        store.set("key".to_string(), "v2".to_string(), None).unwrap();

        // A timer that fired before the overwrite could cancel it.
        store.inner.expire(&"key".to_string(), stale);

        assert_eq!(store.get("key"), Some("v2".to_string()));
        assert_eq!(store.stats().expirations, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expire_current_generation_removes() {
        let store = CacheStore::new(DEFAULT_TTL);

        store.set("key".to_string(), "v1".to_string(), None).unwrap();
        let current = generation_of(&store, "key");
        store.inner.expire(&"key".to_string(), current);

        assert_eq!(store.get("key"), None);
        assert_eq!(store.stats().expirations, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_past_deadline_counts_expiration() {
        let store = CacheStore::new(DEFAULT_TTL);
        store.set("key".to_string(), "v".to_string(), Some(ms(1000))).unwrap();

        // Keep the timer from running so the entry outlives its deadline.
        store.inner.entries.read().get("key").unwrap().cancel_expiry();
        tokio::time::advance(ms(1001)).await;

        assert_eq!(store.remove("key"), None);
        let stats = store.stats();
        assert_eq!(stats.expirations, 1);
        assert_eq!(stats.removals, 0);
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_ttl_rejected() {
        let store = CacheStore::new(DEFAULT_TTL);

        let result = store.set("key".to_string(), "value".to_string(), Some(Duration::ZERO));

        assert!(matches!(result, Err(CacheError::InvalidRequest(_))));
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_remaining() {
        let store = CacheStore::new(DEFAULT_TTL);

        store.set("key".to_string(), "value".to_string(), Some(ms(1000))).unwrap();
        sleep_ms(400).await;

        assert_eq!(store.ttl_remaining("key"), Some(ms(600)));
        assert_eq!(store.ttl_remaining("missing"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_stats() {
        let store = CacheStore::new(DEFAULT_TTL);

        store.set("key1".to_string(), "value1".to_string(), None).unwrap();
        store.get("key1"); // hit
        store.get("nonexistent"); // miss
        store.remove("key1");

        let stats = store.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.sets, 1);
        assert_eq!(stats.removals, 1);
        assert_eq!(stats.total_entries, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replace_all_uses_default_ttl() {
        let store = CacheStore::new(ms(2000));

        store.set("old".to_string(), "gone".to_string(), Some(ms(60_000))).unwrap();
        let count = store
            .replace_all(vec![
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "2".to_string()),
            ])
            .unwrap();

        assert_eq!(count, 2);
        assert_eq!(store.get("old"), None);
        assert_eq!(store.pending_timers(), 2);
        assert_eq!(store.ttl_remaining("a"), Some(ms(2000)));

        sleep_ms(2001).await;
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_replace_all_keeps_one_timer_per_entry() {
        let store = CacheStore::new(DEFAULT_TTL);
        for i in 0..500 {
            store.set(format!("key{i}"), "old".to_string(), None).unwrap();
        }

        let items: Vec<_> = (250..1250)
            .map(|i| (format!("key{i}"), "new".to_string()))
            .collect();
        assert_eq!(store.replace_all(items).unwrap(), 1000);

        assert_eq!(store.len(), 1000);
        assert_eq!(store.pending_timers(), 1000);
        assert_eq!(store.get("key0"), None);
        assert_eq!(store.get("key300"), Some("new".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_replace_all_after_shutdown_leaves_store_untouched() {
        let store = CacheStore::new(DEFAULT_TTL);
        store.set("keep".to_string(), "v".to_string(), None).unwrap();
        store.shutdown(ms(10)).await;

        let result = store.replace_all(vec![("a".to_string(), "1".to_string())]);

        assert!(matches!(result, Err(CacheError::ShutDown)));
        assert_eq!(store.get("keep"), Some("v".to_string()));
        assert_eq!(store.get("a"), None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_readers_see_old_or_new_contents_during_replace() {
        let store = CacheStore::new(DEFAULT_TTL);
        for i in 0..2000 {
            store.set(format!("key{i}"), "old".to_string(), None).unwrap();
        }

        let reader = {
            let store = store.clone();
            tokio::spawn(async move {
                for round in 0..2000 {
                    let value = store.get(&format!("key{}", round % 2000));
                    assert!(
                        matches!(value.as_deref(), Some("old") | Some("new")),
                        "key vanished mid-replace: {value:?}"
                    );
                    tokio::task::yield_now().await;
                }
            })
        };

        let items: Vec<_> = (0..2000)
            .map(|i| (format!("key{i}"), "new".to_string()))
            .collect();
        store.replace_all(items).unwrap();

        reader.await.unwrap();
        assert_eq!(store.get("key1999"), Some("new".to_string()));
        assert_eq!(store.pending_timers(), 2000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_entries_copies_values() {
        let store = CacheStore::new(DEFAULT_TTL);
        store.set("a".to_string(), "1".to_string(), None).unwrap();
        store.set("b".to_string(), "2".to_string(), None).unwrap();

        let mut entries = store.snapshot_entries();
        entries.sort();

        assert_eq!(
            entries,
            vec![
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "2".to_string()),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_timers_and_rejects_writes() {
        let store = CacheStore::new(DEFAULT_TTL);
        store.set("a".to_string(), "1".to_string(), None).unwrap();
        store.set("b".to_string(), "2".to_string(), None).unwrap();

        let summary = store.shutdown(ms(100)).await;

        assert_eq!(summary.cancelled, 2);
        assert_eq!(store.pending_timers(), 0);
        let result = store.set("c".to_string(), "3".to_string(), None);
        assert!(matches!(result, Err(CacheError::ShutDown)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writers_on_one_key_keep_one_timer() {
        let store = CacheStore::new(Duration::from_secs(60));
        let mut threads = Vec::new();

        for worker in 0..8 {
            let store = store.clone();
            threads.push(std::thread::spawn(move || {
                for i in 0..200 {
                    let value = format!("{worker}-{i}");
                    match i % 3 {
                        0 | 1 => store.set("shared".to_string(), value, None).unwrap(),
                        _ => {
                            store.remove("shared");
                        }
                    }
                    store.get("shared");
                }
            }));
        }
        for thread in threads {
            thread.join().unwrap();
        }

        assert_eq!(store.pending_timers(), store.len());
        assert!(store.len() <= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stores_do_not_share_timers() {
        let first = CacheStore::new(DEFAULT_TTL);
        let second = CacheStore::new(DEFAULT_TTL);

        first.set("k".to_string(), "1".to_string(), None).unwrap();
        second.set("k".to_string(), "2".to_string(), None).unwrap();
        first.shutdown(ms(10)).await;

        assert_eq!(second.pending_timers(), 1);
        assert_eq!(second.get("k"), Some("2".to_string()));
    }
}
