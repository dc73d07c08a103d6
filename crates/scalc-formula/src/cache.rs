//! Bounded memoization tables shared by parses
//!
//! Two tables live in a [`ParseCache`]: embedded-literal trees keyed by
//! `(settings id, trimmed source)` and custom reference resolvers keyed by
//! `(settings id, name)`. Both evict the least recently used entry once full.
//! Entries are immutable once inserted; builders run outside the lock, so two
//! threads racing on the same key both build and the last insert wins.

use crate::literal::LiteralNode;
use crate::settings::ReferenceFn;
use ahash::AHashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Entries per table unless configured otherwise
pub const DEFAULT_CAPACITY: usize = 128;

type CacheKey = (u64, String);

/// Fixed-capacity map with least-recently-used eviction
struct LruTable<K, V> {
    capacity: usize,
    tick: u64,
    entries: AHashMap<K, (V, u64)>,
}

impl<K: Eq + Hash + Clone, V: Clone> LruTable<K, V> {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            tick: 0,
            entries: AHashMap::with_capacity(capacity.min(1024)),
        }
    }

    fn get(&mut self, key: &K) -> Option<V> {
        self.tick += 1;
        let tick = self.tick;
        self.entries.get_mut(key).map(|(value, used)| {
            *used = tick;
            value.clone()
        })
    }

    /// Insert, returning true when another entry had to be evicted
    fn insert(&mut self, key: K, value: V) -> bool {
        if self.capacity == 0 {
            return false;
        }
        self.tick += 1;
        let mut evicted = false;
        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            // Linear scan; tables are small
            let oldest = self
                .entries
                .iter()
                .min_by_key(|(_, (_, used))| *used)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                self.entries.remove(&oldest);
                evicted = true;
            }
        }
        self.entries.insert(key, (value, self.tick));
        evicted
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Counters observed through [`ParseCache::stats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub literal_hits: u64,
    /// Each miss ran the relaxed-syntax normalizer once
    pub literal_misses: u64,
    pub resolver_hits: u64,
    pub resolver_misses: u64,
    pub evictions: u64,
}

/// Literal-tree and resolver caches
pub struct ParseCache {
    capacity: usize,
    literals: Mutex<LruTable<CacheKey, Arc<LiteralNode>>>,
    resolvers: Mutex<LruTable<CacheKey, ReferenceFn>>,
    literal_hits: AtomicU64,
    literal_misses: AtomicU64,
    resolver_hits: AtomicU64,
    resolver_misses: AtomicU64,
    evictions: AtomicU64,
}

impl Default for ParseCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ParseCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Caches holding up to `capacity` entries per table (0 disables caching)
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            literals: Mutex::new(LruTable::new(capacity)),
            resolvers: Mutex::new(LruTable::new(capacity)),
            literal_hits: AtomicU64::new(0),
            literal_misses: AtomicU64::new(0),
            resolver_hits: AtomicU64::new(0),
            resolver_misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Cached literal tree for `source`, building it on a miss
    ///
    /// A failed build is not stored, so the next lookup builds again.
    pub fn literal_tree<F, E>(
        &self,
        settings_id: u64,
        source: &str,
        build: F,
    ) -> Result<Arc<LiteralNode>, E>
    where
        F: FnOnce(&str) -> Result<LiteralNode, E>,
    {
        let key = (settings_id, source.trim().to_string());
        let cached = self
            .literals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key);
        if let Some(tree) = cached {
            self.literal_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(tree);
        }

        self.literal_misses.fetch_add(1, Ordering::Relaxed);
        let tree = Arc::new(build(&key.1)?);
        let evicted = self
            .literals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, Arc::clone(&tree));
        self.note_eviction(evicted, "literal");
        Ok(tree)
    }

    /// Cached resolver for reference `name`, building it on a miss
    pub fn resolver<F, E>(&self, settings_id: u64, name: &str, build: F) -> Result<ReferenceFn, E>
    where
        F: FnOnce(&str) -> Result<ReferenceFn, E>,
    {
        let key = (settings_id, name.to_string());
        let cached = self
            .resolvers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key);
        if let Some(resolver) = cached {
            self.resolver_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(resolver);
        }

        self.resolver_misses.fetch_add(1, Ordering::Relaxed);
        let resolver = build(name)?;
        let evicted = self
            .resolvers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, Arc::clone(&resolver));
        self.note_eviction(evicted, "resolver");
        Ok(resolver)
    }

    fn note_eviction(&self, evicted: bool, table: &str) {
        if evicted {
            self.evictions.fetch_add(1, Ordering::Relaxed);
            log::trace!("evicted least recently used {} cache entry", table);
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            literal_hits: self.literal_hits.load(Ordering::Relaxed),
            literal_misses: self.literal_misses.load(Ordering::Relaxed),
            resolver_hits: self.resolver_hits.load(Ordering::Relaxed),
            resolver_misses: self.resolver_misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    /// Number of cached (literal trees, resolvers)
    pub fn len(&self) -> (usize, usize) {
        let literals = self.literals.lock().unwrap_or_else(PoisonError::into_inner).len();
        let resolvers = self.resolvers.lock().unwrap_or_else(PoisonError::into_inner).len();
        (literals, resolvers)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == (0, 0)
    }

    /// Drop every entry; counters are kept
    pub fn clear(&self) {
        self.literals.lock().unwrap_or_else(PoisonError::into_inner).clear();
        self.resolvers.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl fmt::Debug for ParseCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParseCache")
            .field("capacity", &self.capacity)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}
