use std::fmt::Write as _;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

use super::serde_utils::duration_as_millis;

/// One parsed access-log line.
///
/// Text fields are owned; the zero-copy view produced by the scanner is
/// materialized into this struct before it leaves the parser.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccessLogEntry {
    /// xxh3 hash of `raw`, 16 lowercase hex chars
    pub id: String,
    /// Unix seconds, 0 when the timestamp could not be parsed
    pub timestamp: i64,
    pub ip: String,

    pub region_code: String,
    pub province: String,
    pub city: String,

    pub method: String,
    pub path: String,
    pub protocol: String,
    /// HTTP status in [100, 600), 0 when absent or rejected
    pub status: u16,
    pub bytes_sent: u64,
    pub referer: String,
    pub user_agent: String,

    pub browser: String,
    pub browser_version: String,
    pub os: String,
    pub os_version: String,
    pub device_type: String,

    /// Seconds, 0 when absent
    pub request_time: f64,
    /// Seconds, `None` when absent (`-` in the source)
    pub upstream_time: Option<f64>,

    /// Original line (always preserved)
    pub raw: String,
}

impl AccessLogEntry {
    /// Clear every field while keeping string capacity for reuse.
    pub fn reset(&mut self) {
        self.id.clear();
        self.timestamp = 0;
        self.ip.clear();
        self.region_code.clear();
        self.province.clear();
        self.city.clear();
        self.method.clear();
        self.path.clear();
        self.protocol.clear();
        self.status = 0;
        self.bytes_sent = 0;
        self.referer.clear();
        self.user_agent.clear();
        self.browser.clear();
        self.browser_version.clear();
        self.os.clear();
        self.os_version.clear();
        self.device_type.clear();
        self.request_time = 0.0;
        self.upstream_time = None;
        self.raw.clear();
    }

    /// Write the content id of `raw` into `self.id`.
    pub(crate) fn assign_id(&mut self, raw: &str) {
        self.id.clear();
        // Writing into a String cannot fail.
        let _ = write!(self.id, "{:016x}", xxh3_64(raw.as_bytes()));
    }
}

/// Content id of a raw line: a pure function of its bytes.
pub fn entry_id(raw: &str) -> String {
    format!("{:016x}", xxh3_64(raw.as_bytes()))
}

/// Aggregate outcome of a batch or stream parse.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParseResult {
    pub entries: Vec<AccessLogEntry>,
    /// Number of input lines handed to the call (not the number completed)
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    #[serde(with = "duration_as_millis")]
    pub duration: Duration,
    pub error_rate: f64,
}

impl ParseResult {
    pub fn new(entries: Vec<AccessLogEntry>, processed: usize, failed: usize, duration: Duration) -> Self {
        let succeeded = entries.len();
        Self {
            entries,
            processed,
            succeeded,
            failed,
            duration,
            error_rate: error_rate(failed, processed),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// True when every input line produced either an entry or a failure.
    pub fn is_complete(&self) -> bool {
        self.succeeded + self.failed == self.processed
    }

    /// Fold another batch result into this one. `error_rate` is left for
    /// [`ParseResult::finish`].
    pub(crate) fn absorb(&mut self, other: ParseResult) {
        self.processed += other.processed;
        self.succeeded += other.succeeded;
        self.failed += other.failed;
        self.entries.extend(other.entries);
    }

    pub(crate) fn finish(&mut self, duration: Duration) {
        self.duration = duration;
        self.error_rate = error_rate(self.failed, self.processed);
    }
}

fn error_rate(failed: usize, processed: usize) -> f64 {
    if processed == 0 {
        0.0
    } else {
        failed as f64 / processed as f64
    }
}

/// A stream that stopped early: what was parsed so far plus the reason.
#[derive(Debug, Error)]
#[error("stream aborted after {} lines: {error}", partial.processed)]
pub struct StreamAbort {
    pub partial: ParseResult,
    #[source]
    pub error: ParseError,
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Empty line")]
    EmptyLine,

    #[error("Line too long: {len} bytes (max: {max} bytes)")]
    LineTooLong { len: usize, max: usize },

    #[error("Unsupported log format: {0}")]
    UnsupportedLogFormat(String),

    /// Reserved for strict timestamp enforcement; unparsable timestamps are
    /// not fatal today.
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Stream read failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cancelled")]
    Cancelled,

    #[error("Parse worker failed: {0}")]
    WorkerFailed(String),
}
