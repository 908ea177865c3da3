use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use super::model::ParseError;

/// Error categories for metrics recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricErrorType {
    EmptyLine,
    TooLong,
    /// Structural failure in strict mode
    Unsupported,
    Other,
}

impl From<&ParseError> for MetricErrorType {
    fn from(err: &ParseError) -> Self {
        match err {
            ParseError::EmptyLine => Self::EmptyLine,
            ParseError::LineTooLong { .. } => Self::TooLong,
            ParseError::UnsupportedLogFormat(_) => Self::Unsupported,
            _ => Self::Other,
        }
    }
}

/// A wrapper that forces the wrapped data onto its own cache line(s).
///
/// Each metric group is updated from different worker threads; keeping the
/// groups 64-byte aligned stops them from sharing a cache line.
#[repr(align(64))]
#[derive(Debug, Default)]
pub struct CacheAligned<T>(pub T);

#[derive(Debug, Default)]
pub struct DetectionMetrics {
    pub attempts: AtomicU64,
    pub success: AtomicU64,
    pub fallback: AtomicU64,
}

/// Per-line outcome counters (hottest path)
#[derive(Debug, Default)]
pub struct LineMetrics {
    pub parsed: AtomicU64,
    /// Lenient-mode fallbacks, counted in `parsed` as well
    pub degraded: AtomicU64,
    pub time_nanos: AtomicU64,
}

#[derive(Debug, Default)]
pub struct ErrorMetrics {
    pub empty: AtomicU64,
    pub too_long: AtomicU64,
    pub unsupported: AtomicU64,
    pub other: AtomicU64,
}

#[derive(Debug, Default)]
pub struct EnrichmentMetrics {
    pub geo_lookups: AtomicU64,
    pub geo_failures: AtomicU64,
    pub ua_classified: AtomicU64,
}

/// Counters shared by every parse call of one `LogParser`.
///
/// All operations use `Ordering::Relaxed`; `snapshot()` is not transactional
/// across groups.
#[derive(Debug, Default)]
pub struct ParsingMetrics {
    pub detection: CacheAligned<DetectionMetrics>,
    pub lines: CacheAligned<LineMetrics>,
    pub errors: CacheAligned<ErrorMetrics>,
    pub enrichment: CacheAligned<EnrichmentMetrics>,
}

impl ParsingMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_detection(&self, success: bool) {
        self.detection.0.attempts.fetch_add(1, Ordering::Relaxed);
        if success {
            self.detection.0.success.fetch_add(1, Ordering::Relaxed);
        } else {
            self.detection.0.fallback.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a line that produced an entry.
    #[inline]
    pub fn record_parse(&self, degraded: bool, time_nanos: u64) {
        self.lines.0.parsed.fetch_add(1, Ordering::Relaxed);
        self.lines.0.time_nanos.fetch_add(time_nanos, Ordering::Relaxed);
        if degraded {
            self.lines.0.degraded.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn record_error(&self, error_type: MetricErrorType) {
        let counter = match error_type {
            MetricErrorType::EmptyLine => &self.errors.0.empty,
            MetricErrorType::TooLong => &self.errors.0.too_long,
            MetricErrorType::Unsupported => &self.errors.0.unsupported,
            MetricErrorType::Other => &self.errors.0.other,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_geo_lookup(&self, failed: bool) {
        self.enrichment.0.geo_lookups.fetch_add(1, Ordering::Relaxed);
        if failed {
            self.enrichment.0.geo_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn record_ua_classified(&self) {
        self.enrichment.0.ua_classified.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let lines_parsed = self.lines.0.parsed.load(Ordering::Relaxed);
        let total_time_ns = self.lines.0.time_nanos.load(Ordering::Relaxed);

        let empty_lines = self.errors.0.empty.load(Ordering::Relaxed);
        let lines_too_long = self.errors.0.too_long.load(Ordering::Relaxed);
        let unsupported_lines = self.errors.0.unsupported.load(Ordering::Relaxed);
        let other_errors = self.errors.0.other.load(Ordering::Relaxed);
        let total_errors = empty_lines + lines_too_long + unsupported_lines + other_errors;
        let total_attempts = lines_parsed + total_errors;

        MetricsSnapshot {
            detection_attempts: self.detection.0.attempts.load(Ordering::Relaxed),
            detection_success: self.detection.0.success.load(Ordering::Relaxed),
            detection_fallback: self.detection.0.fallback.load(Ordering::Relaxed),

            lines_parsed,
            lines_degraded: self.lines.0.degraded.load(Ordering::Relaxed),
            avg_parse_time_us: if lines_parsed > 0 {
                (total_time_ns as f64 / lines_parsed as f64) / 1000.0
            } else {
                0.0
            },

            empty_lines,
            lines_too_long,
            unsupported_lines,
            other_errors,
            success_rate: if total_attempts > 0 {
                lines_parsed as f64 / total_attempts as f64
            } else {
                1.0
            },

            geo_lookups: self.enrichment.0.geo_lookups.load(Ordering::Relaxed),
            geo_failures: self.enrichment.0.geo_failures.load(Ordering::Relaxed),
            ua_classified: self.enrichment.0.ua_classified.load(Ordering::Relaxed),
        }
    }
}

/// A read-only snapshot of parsing metrics, serializable for logs.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub detection_attempts: u64,
    pub detection_success: u64,
    pub detection_fallback: u64,

    pub lines_parsed: u64,
    pub lines_degraded: u64,
    pub avg_parse_time_us: f64,

    pub empty_lines: u64,
    pub lines_too_long: u64,
    pub unsupported_lines: u64,
    pub other_errors: u64,
    pub success_rate: f64,

    pub geo_lookups: u64,
    pub geo_failures: u64,
    pub ua_classified: u64,
}
