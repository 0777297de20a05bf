/// Prepared statement cache
///
/// Keeps prepared statements keyed by their ECSQL text so that repeated
/// reads of the same path shape skip preparation. Bounded by entry count
/// with least-recently-used eviction.
///
/// # Configuration
///
/// - `ECDBMAP_STATEMENT_CACHE_MAX_ENTRIES` (default: 256)
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use super::executor::PreparedStatement;

#[derive(Debug, Clone)]
struct CacheEntry {
    statement: PreparedStatement,
    /// Logical access tick (for LRU)
    last_accessed: u64,
    access_count: u64,
}

/// Statement cache with LRU eviction
#[derive(Debug)]
pub struct StatementCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    max_entries: usize,
    clock: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl StatementCache {
    pub fn new(max_entries: usize) -> Self {
        StatementCache {
            entries: Mutex::new(HashMap::new()),
            max_entries: max_entries.max(1),
            clock: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    /// Get a prepared statement for `ecsql`, if cached
    pub fn get(&self, ecsql: &str) -> Option<PreparedStatement> {
        let tick = self.tick();
        let mut entries = self.lock();
        if let Some(entry) = entries.get_mut(ecsql) {
            entry.last_accessed = tick;
            entry.access_count += 1;
            self.hits.fetch_add(1, Ordering::Relaxed);
            log::debug!("Statement cache hit: {}", ecsql);
            Some(entry.statement.clone())
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            log::debug!("Statement cache miss: {}", ecsql);
            None
        }
    }

    /// Insert a prepared statement; may evict the least recently used one
    pub fn insert(&self, statement: PreparedStatement) {
        let tick = self.tick();
        let mut entries = self.lock();
        if !entries.contains_key(&statement.ecsql) && entries.len() >= self.max_entries {
            self.evict_lru(&mut entries);
        }
        entries.insert(
            statement.ecsql.clone(),
            CacheEntry {
                statement,
                last_accessed: tick,
                access_count: 0,
            },
        );
    }

    fn evict_lru(&self, entries: &mut HashMap<String, CacheEntry>) {
        if let Some(key) = entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_accessed)
            .map(|(key, _)| key.clone())
        {
            entries.remove(&key);
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn metrics(&self) -> CacheMetrics {
        let entries = self.lock();
        CacheMetrics {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            size: entries.len(),
            max_entries: self.max_entries,
        }
    }
}

/// Cache metrics for monitoring
#[derive(Debug, Clone, PartialEq)]
pub struct CacheMetrics {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub size: usize,
    pub max_entries: usize,
}

impl CacheMetrics {
    /// Cache hit rate (0.0 to 1.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Entry utilization (0.0 to 1.0)
    pub fn entry_utilization(&self) -> f64 {
        if self.max_entries == 0 {
            0.0
        } else {
            self.size as f64 / self.max_entries as f64
        }
    }
}
