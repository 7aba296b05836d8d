//! Query execution with TTL result caching.
//!
//! Results are cached keyed by a stable hash of (SQL text, parameters) and
//! expire after a fixed time-to-live, checked on lookup. Concurrent misses
//! for the same key may each execute once (bounded first-population race);
//! the last writer wins. Within a TTL window a populated key never
//! re-executes.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::Mutex;

use crate::error::Error;
use crate::manager::ConnectionManager;
use crate::rows::{Params, Table};

/// How long a cached result stays valid.
pub const RESULT_TTL: Duration = Duration::from_secs(300);

/// Default number of distinct (sql, params) entries kept.
pub const DEFAULT_CACHE_CAPACITY: usize = 128;

/// Result cache tuning.
#[derive(Debug, Clone)]
pub struct QueryCacheConfig {
    /// Time-to-live per entry.
    pub ttl: Duration,
    /// Maximum number of entries; least recently used entries evict first.
    pub capacity: usize,
}

impl Default for QueryCacheConfig {
    fn default() -> Self {
        Self {
            ttl: RESULT_TTL,
            capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl QueryCacheConfig {
    /// Set the time-to-live.
    #[must_use]
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the entry capacity.
    #[must_use]
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }
}

/// Stable cache key over the exact (sql, params) pair.
#[must_use]
pub fn query_key(sql: &str, params: Option<&Params>) -> u64 {
    let mut hasher = DefaultHasher::new();
    sql.hash(&mut hasher);
    if let Some(params) = params {
        for (name, value) in params {
            name.hash(&mut hasher);
            value.hash(&mut hasher);
        }
    }
    hasher.finish()
}

struct CacheEntry {
    table: Arc<Table>,
    stored_at: Instant,
}

/// TTL-keyed result cache with LRU eviction.
struct ResultCache {
    entries: Mutex<LruCache<u64, CacheEntry>>,
    ttl: Duration,
}

impl ResultCache {
    fn new(config: &QueryCacheConfig) -> Self {
        let capacity = NonZeroUsize::new(config.capacity.max(1))
            .unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl: config.ttl,
        }
    }

    fn get(&self, key: u64) -> Option<Arc<Table>> {
        let mut entries = self.entries.lock();
        match entries.get(&key) {
            Some(entry) if entry.stored_at.elapsed() < self.ttl => {
                tracing::trace!(key, "result cache hit");
                Some(Arc::clone(&entry.table))
            }
            Some(_) => {
                tracing::trace!(key, "result cache entry expired");
                entries.pop(&key);
                None
            }
            None => {
                tracing::trace!(key, "result cache miss");
                None
            }
        }
    }

    fn put(&self, key: u64, table: Arc<Table>) {
        self.entries.lock().put(
            key,
            CacheEntry {
                table,
                stored_at: Instant::now(),
            },
        );
    }
}

/// Runs SQL against the shared connection, caching results.
///
/// The only operation the presentation layer needs.
pub struct QueryExecutor {
    manager: Arc<ConnectionManager>,
    cache: ResultCache,
}

impl QueryExecutor {
    /// Create an executor with the default cache tuning.
    #[must_use]
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        Self::with_cache_config(manager, QueryCacheConfig::default())
    }

    /// Create an executor with custom cache tuning.
    #[must_use]
    pub fn with_cache_config(manager: Arc<ConnectionManager>, config: QueryCacheConfig) -> Self {
        Self {
            cache: ResultCache::new(&config),
            manager,
        }
    }

    /// Run a statement, returning the cached result when one is fresh.
    ///
    /// A cache hit performs no I/O. A miss fetches the shared connection
    /// (opening it on first use), executes, caches the materialized table
    /// for the TTL, and returns it. Execution errors propagate unchanged
    /// and nothing is cached for them.
    pub async fn run_query(&self, sql: &str, params: Option<&Params>) -> Result<Arc<Table>, Error> {
        let key = query_key(sql, params);
        if let Some(table) = self.cache.get(key) {
            return Ok(table);
        }

        let connection = self.manager.get_connection().await?;
        let table = Arc::new(connection.execute(sql, params).await?);
        self.cache.put(key, Arc::clone(&table));
        tracing::debug!(rows = table.len(), "query executed and cached");
        Ok(table)
    }
}

impl std::fmt::Debug for QueryExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryExecutor")
            .field("ttl", &self.cache.ttl)
            .finish_non_exhaustive()
    }
}
