//! Model: ParserConfig and its defaults.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::parser::timestamp::NGINX_TIME_LAYOUT;

/// Settings for one `LogParser`. Fixed once the parser is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Initial capacity of pooled read buffers, bytes
    pub buffer_size: usize,
    /// Lines per batch; smaller inputs are parsed sequentially
    pub batch_size: usize,
    /// 0 means one worker per logical CPU
    pub worker_count: usize,
    pub enable_geo: bool,
    pub enable_ua: bool,
    /// chrono layout tried first for `$time_local`
    pub time_layout: String,
    pub strict_mode: bool,
    pub max_line_length: usize,

    pub ua_cache_size: usize,
    pub pattern_cache_ttl_secs: u64,
    pub pattern_cache_max_entries: usize,
    pub detection_sample_size: usize,
    pub detection_threshold: f64,
    pub entry_pool_capacity: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            buffer_size: 64 * 1024,
            batch_size: 1000,
            worker_count: 0,
            enable_geo: true,
            enable_ua: true,
            time_layout: NGINX_TIME_LAYOUT.to_string(),
            strict_mode: false,
            max_line_length: 16 * 1024,
            ua_cache_size: 10_000,
            pattern_cache_ttl_secs: 300,
            pattern_cache_max_entries: 256,
            detection_sample_size: 100,
            detection_threshold: 0.8,
            entry_pool_capacity: 4096,
        }
    }
}

impl ParserConfig {
    pub fn pattern_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.pattern_cache_ttl_secs)
    }

    /// Workers for a parallel batch of `lines`: the configured count (or
    /// the CPU count), reduced so each worker gets at least 10 lines.
    pub fn effective_workers(&self, lines: usize) -> usize {
        let configured = if self.worker_count > 0 {
            self.worker_count
        } else {
            std::thread::available_parallelism().map_or(1, |n| n.get())
        };
        configured.min((lines / 10).max(1)).max(1)
    }
}
