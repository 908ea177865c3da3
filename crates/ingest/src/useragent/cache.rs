use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use crate::parser::traits::UserAgentParser;

use super::model::UserAgentInfo;

pub const DEFAULT_UA_CACHE_SIZE: usize = 10_000;

/// Memoizes any [`UserAgentParser`] by the literal user-agent string.
///
/// The map is bounded by `max_size`: once it is full, the whole map is
/// dropped before the next insert.
#[derive(Debug)]
pub struct CachedUserAgentParser<P> {
    inner: P,
    cache: DashMap<String, UserAgentInfo>,
    max_size: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<P: UserAgentParser> CachedUserAgentParser<P> {
    pub fn new(inner: P, max_size: usize) -> Self {
        Self {
            inner,
            cache: DashMap::new(),
            max_size: max_size.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    /// `(current size, max size)`
    pub fn cache_stats(&self) -> (usize, usize) {
        (self.cache.len(), self.max_size)
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn clear(&self) {
        self.cache.clear();
    }
}

impl<P: UserAgentParser> UserAgentParser for CachedUserAgentParser<P> {
    fn parse(&self, user_agent: &str) -> UserAgentInfo {
        if let Some(info) = self.cache.get(user_agent) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return info.clone();
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let info = self.inner.parse(user_agent);

        if self.cache.len() >= self.max_size {
            tracing::debug!(max = self.max_size, "user-agent cache full, clearing");
            self.cache.clear();
        }
        self.cache.insert(user_agent.to_string(), info.clone());
        info
    }
}
