use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::Serialize;

use super::pattern::{Pattern, PatternError};

pub const DEFAULT_PATTERN_TTL: Duration = Duration::from_secs(300);
pub const DEFAULT_PATTERN_CAPACITY: usize = 256;

#[derive(Debug)]
struct CachedPattern {
    pattern: Arc<Pattern>,
    compiled_at: Instant,
}

impl CachedPattern {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.compiled_at.elapsed() > ttl
    }
}

/// Compiled-pattern cache shared by the format registry and any ad-hoc
/// matcher.
///
/// Entries expire `ttl` after compilation and are recompiled on the next
/// lookup. When the map is full, expired entries are purged first; if that
/// frees nothing the whole map is dropped.
#[derive(Debug)]
pub struct PatternCache {
    entries: DashMap<String, CachedPattern>,
    ttl: Duration,
    max_entries: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl PatternCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            max_entries: max_entries.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Return the cached matcher for `source`, compiling it on a miss.
    pub fn get_or_compile(&self, source: &str) -> Result<Arc<Pattern>, PatternError> {
        // The read guard must be gone before we write to the same shard.
        let cached = self
            .entries
            .get(source)
            .filter(|entry| !entry.is_expired(self.ttl))
            .map(|entry| Arc::clone(&entry.pattern));

        if let Some(pattern) = cached {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(pattern);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let pattern = Arc::new(Pattern::new(source)?);

        if !self.entries.contains_key(source) && self.entries.len() >= self.max_entries {
            let purged = self.purge_expired();
            if purged == 0 {
                tracing::debug!(max = self.max_entries, "pattern cache full, clearing");
                self.entries.clear();
            }
        }

        self.entries.insert(
            source.to_string(),
            CachedPattern {
                pattern: Arc::clone(&pattern),
                compiled_at: Instant::now(),
            },
        );
        Ok(pattern)
    }

    /// Drop expired entries; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        let ttl = self.ttl;
        self.entries.retain(|_, entry| !entry.is_expired(ttl));
        before.saturating_sub(self.entries.len())
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> PatternCacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;
        PatternCacheStats {
            size: self.entries.len(),
            max_entries: self.max_entries,
            hits,
            misses,
            hit_rate: if lookups > 0 { hits as f64 / lookups as f64 } else { 0.0 },
        }
    }
}

impl Default for PatternCache {
    fn default() -> Self {
        Self::new(DEFAULT_PATTERN_TTL, DEFAULT_PATTERN_CAPACITY)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PatternCacheStats {
    pub size: usize,
    pub max_entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
}
