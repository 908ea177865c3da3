//! Access-log parsing.
//!
//! - `scanner.rs`: zero-copy field scanner for one line
//! - `engine.rs`: `LogParser` (materialization, enrichment, pools)
//! - `batch.rs` / `stream.rs`: multi-line entry points
//! - `formats.rs` / `detector.rs`: named layouts and format detection
//! - `cache.rs` / `pattern.rs`: compiled-pattern cache
//! - `metrics.rs`: parsing counters
//!
//! Every entry point is bounded by `max_line_length` and never panics on
//! malformed input; in lenient mode an unreadable line still yields a
//! degraded entry that keeps the raw text.

pub mod batch;
pub mod cache;
pub mod detector;
pub mod engine;
pub mod formats;
pub mod metrics;
pub mod model;
pub mod pattern;
pub mod pool;
pub mod scanner;
pub mod stream;
pub mod timestamp;
pub mod traits;
mod serde_utils;

pub use detector::{DetectionReport, FormatDetector};
pub use engine::LogParser;
pub use formats::{FormatRegistry, LogFormat};
pub use metrics::MetricsSnapshot;
pub use model::{entry_id, AccessLogEntry, ParseError, ParseResult, StreamAbort};
pub use stream::STREAM_CANCEL_CHECK_INTERVAL;
pub use traits::{GeoError, GeoIpService, GeoLocation, UserAgentParser};
