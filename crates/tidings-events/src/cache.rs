//! In-process notification configuration cache
//!
//! Maps bucket paths to their configuration, or to "known absent". Reads take
//! a shared lock and never wait on each other; `set`, `invalidate` and `fill`
//! take the exclusive lock, so a completed write is visible to every read that
//! starts after it.
//!
//! Configured entries never expire. They change only through
//! `set`/`invalidate`, which the manager calls after a successful store write
//! on *this* process. Other processes sharing the same store keep serving
//! their own cached copy until they write or restart; there is no cross-node
//! invalidation.
//!
//! Absent entries are keyed by whatever bucket names events arrive with, so
//! they are held to a fixed number. Once full, remembering a new absent path
//! evicts an arbitrary older one.

use metrics::counter;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tidings_core::types::{BucketPath, NotificationConfiguration};

use crate::metrics::names;

/// Absent paths remembered by [`ConfigCache::new`].
pub const DEFAULT_ABSENT_ENTRIES: usize = 4096;

/// Result of a cache lookup
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
    /// A configuration is cached for the path
    Hit(Arc<NotificationConfiguration>),
    /// The path is cached as having no configuration
    Absent,
    /// Nothing cached; the store must be consulted
    Miss,
}

#[derive(Debug, Default)]
struct CacheState {
    configured: HashMap<BucketPath, Arc<NotificationConfiguration>>,
    absent: HashSet<BucketPath>,
    /// Bumped by every write so a fill can detect that it raced with one.
    epoch: u64,
}

impl CacheState {
    fn contains(&self, path: &BucketPath) -> bool {
        self.configured.contains_key(path) || self.absent.contains(path)
    }
}

#[derive(Debug)]
pub struct ConfigCache {
    state: RwLock<CacheState>,
    max_absent: usize,
}

impl Default for ConfigCache {
    fn default() -> Self {
        Self::with_absent_limit(DEFAULT_ABSENT_ENTRIES)
    }
}

impl ConfigCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache that remembers at most `max_absent` paths without a
    /// configuration. Zero disables caching absence.
    pub fn with_absent_limit(max_absent: usize) -> Self {
        Self {
            state: RwLock::new(CacheState::default()),
            max_absent,
        }
    }

    pub fn lookup(&self, path: &BucketPath) -> CacheLookup {
        let lookup = {
            let state = self.state.read();
            match state.configured.get(path) {
                Some(config) => CacheLookup::Hit(config.clone()),
                None if state.absent.contains(path) => CacheLookup::Absent,
                None => CacheLookup::Miss,
            }
        };

        match lookup {
            CacheLookup::Miss => counter!(names::CACHE_MISSES_TOTAL).increment(1),
            _ => counter!(names::CACHE_HITS_TOTAL).increment(1),
        }

        lookup
    }

    /// Configuration cached for `path`, if one is present.
    pub fn get(&self, path: &BucketPath) -> Option<Arc<NotificationConfiguration>> {
        match self.lookup(path) {
            CacheLookup::Hit(config) => Some(config),
            CacheLookup::Absent | CacheLookup::Miss => None,
        }
    }

    /// Current write epoch. Read it before loading from the store and pass it
    /// to [`ConfigCache::fill`].
    pub fn epoch(&self) -> u64 {
        self.state.read().epoch
    }

    /// Record the authoritative configuration after a store write.
    pub fn set(&self, path: BucketPath, config: Arc<NotificationConfiguration>) {
        let mut state = self.state.write();
        state.absent.remove(&path);
        state.configured.insert(path, config);
        state.epoch += 1;
    }

    /// Forget whatever is cached for `path`.
    pub fn invalidate(&self, path: &BucketPath) {
        let mut state = self.state.write();
        state.configured.remove(path);
        state.absent.remove(path);
        state.epoch += 1;
    }

    /// Populate a missing entry with a value loaded from the store.
    ///
    /// Skipped when any write happened since `observed_epoch` or when the path
    /// already has an entry, so a slow load cannot resurrect a value that a
    /// concurrent put or delete has replaced. Returns whether it inserted.
    pub fn fill(
        &self,
        path: BucketPath,
        config: Option<Arc<NotificationConfiguration>>,
        observed_epoch: u64,
    ) -> bool {
        let mut state = self.state.write();
        if state.epoch != observed_epoch || state.contains(&path) {
            return false;
        }

        match config {
            Some(config) => {
                state.configured.insert(path, config);
            }
            None => {
                if self.max_absent == 0 {
                    return false;
                }
                if state.absent.len() >= self.max_absent {
                    let evicted = state.absent.iter().next().cloned();
                    if let Some(evicted) = evicted {
                        state.absent.remove(&evicted);
                    }
                }
                state.absent.insert(path);
            }
        }
        true
    }

    pub fn len(&self) -> usize {
        let state = self.state.read();
        state.configured.len() + state.absent.len()
    }

    /// Number of paths cached as having no configuration.
    pub fn absent_len(&self) -> usize {
        self.state.read().absent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut state = self.state.write();
        state.configured.clear();
        state.absent.clear();
        state.epoch += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(bucket: &str) -> BucketPath {
        BucketPath::new(Some("tenant-1"), bucket).unwrap()
    }

    fn config(bucket: &str) -> Arc<NotificationConfiguration> {
        Arc::new(NotificationConfiguration::new(Some("tenant-1"), bucket))
    }

    #[test]
    fn test_set_then_lookup() {
        let cache = ConfigCache::new();
        assert_eq!(cache.lookup(&path("a")), CacheLookup::Miss);

        let cfg = config("a");
        cache.set(path("a"), cfg.clone());
        assert_eq!(cache.lookup(&path("a")), CacheLookup::Hit(cfg.clone()));
        assert_eq!(cache.get(&path("a")), Some(cfg));
        assert_eq!(cache.lookup(&path("b")), CacheLookup::Miss);
    }

    #[test]
    fn test_invalidate_removes_entry() {
        let cache = ConfigCache::new();
        cache.set(path("a"), config("a"));
        cache.invalidate(&path("a"));
        assert_eq!(cache.lookup(&path("a")), CacheLookup::Miss);
        assert!(cache.is_empty());

        // Invalidating an unknown path is harmless.
        cache.invalidate(&path("zzz"));
    }

    #[test]
    fn test_fill_records_absence() {
        let cache = ConfigCache::new();
        let epoch = cache.epoch();
        assert!(cache.fill(path("a"), None, epoch));
        assert_eq!(cache.lookup(&path("a")), CacheLookup::Absent);
        assert_eq!(cache.get(&path("a")), None);
    }

    #[test]
    fn test_fill_loses_to_concurrent_write() {
        let cache = ConfigCache::new();
        let epoch = cache.epoch();

        // A put lands while the loader is still reading the old value.
        let fresh = config("a");
        cache.set(path("a"), fresh.clone());

        assert!(!cache.fill(path("a"), None, epoch));
        assert_eq!(cache.lookup(&path("a")), CacheLookup::Hit(fresh));

        // Same for a delete racing with a load of a different path.
        let epoch = cache.epoch();
        cache.invalidate(&path("a"));
        assert!(!cache.fill(path("b"), Some(config("b")), epoch));
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_fill_does_not_overwrite() {
        let cache = ConfigCache::new();
        let cfg = config("a");
        cache.set(path("a"), cfg.clone());
        assert!(!cache.fill(path("a"), None, cache.epoch()));
        assert_eq!(cache.get(&path("a")), Some(cfg));
    }

    #[test]
    fn test_absent_entries_are_bounded() {
        let cache = ConfigCache::with_absent_limit(100);
        cache.set(path("configured"), config("configured"));

        for i in 0..1000 {
            assert!(cache.fill(path(&format!("unknown-{}", i)), None, cache.epoch()));
        }
        assert_eq!(cache.absent_len(), 100);
        assert_eq!(cache.len(), 101);

        // The most recent absence is kept and configured entries are never evicted.
        assert_eq!(cache.lookup(&path("unknown-999")), CacheLookup::Absent);
        assert!(matches!(cache.lookup(&path("configured")), CacheLookup::Hit(_)));
    }

    #[test]
    fn test_zero_absent_limit_disables_negative_caching() {
        let cache = ConfigCache::with_absent_limit(0);
        assert!(!cache.fill(path("a"), None, cache.epoch()));
        assert_eq!(cache.lookup(&path("a")), CacheLookup::Miss);
        assert!(cache.fill(path("b"), Some(config("b")), cache.epoch()));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_set_replaces_absence() {
        let cache = ConfigCache::new();
        assert!(cache.fill(path("a"), None, cache.epoch()));
        let cfg = config("a");
        cache.set(path("a"), cfg.clone());
        assert_eq!(cache.lookup(&path("a")), CacheLookup::Hit(cfg));
        assert_eq!(cache.absent_len(), 0);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_concurrent_readers_see_completed_writes() {
        let cache = Arc::new(ConfigCache::new());
        cache.set(path("a"), config("a"));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        assert!(matches!(cache.lookup(&path("a")), CacheLookup::Hit(_)));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        cache.clear();
        assert!(cache.is_empty());
    }
}
