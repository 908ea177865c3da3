use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;

use crate::conf::{ConfigError, ParserConfig};
use crate::useragent::{CachedUserAgentParser, UserAgentClassifier};

use super::cache::{PatternCache, PatternCacheStats};
use super::detector::{DetectionReport, FormatDetector};
use super::formats::{FormatRegistry, LogFormat};
use super::metrics::{MetricErrorType, MetricsSnapshot, ParsingMetrics};
use super::model::{AccessLogEntry, ParseError};
use super::pool::{BufferPool, EntryPool, PoolStats};
use super::scanner::{scan_line, ScannedLine};
use super::timestamp::TimestampParser;
use super::traits::{GeoIpService, UserAgentParser};

/// Free buffers kept by the stream reader's pool.
const BUFFER_POOL_CAPACITY: usize = 64;

/// Turns access-log lines into [`AccessLogEntry`] values.
///
/// Built once per configuration and shared (`Send + Sync`); every entry
/// point takes `&self`. Single lines go through [`LogParser::parse_line`],
/// slices through [`LogParser::parse_lines`] and async readers through
/// [`LogParser::parse_stream`].
pub struct LogParser {
    config: ParserConfig,
    timestamps: TimestampParser,
    entries: EntryPool,
    buffers: BufferPool,
    patterns: Arc<PatternCache>,
    formats: FormatRegistry,
    detector: FormatDetector,
    metrics: Arc<ParsingMetrics>,
    ua: Arc<dyn UserAgentParser>,
    geo: Option<Arc<dyn GeoIpService>>,
}

impl std::fmt::Debug for LogParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogParser")
            .field("config", &self.config)
            .field("formats", &self.formats.names())
            .field("geo", &self.geo.is_some())
            .finish_non_exhaustive()
    }
}

impl LogParser {
    pub fn new(
        config: ParserConfig,
        ua: Arc<dyn UserAgentParser>,
        geo: Option<Arc<dyn GeoIpService>>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let patterns = Arc::new(PatternCache::new(
            config.pattern_cache_ttl(),
            config.pattern_cache_max_entries,
        ));
        let formats = FormatRegistry::with_builtin(Arc::clone(&patterns))
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        let metrics = Arc::new(ParsingMetrics::new());
        let detector = FormatDetector::new(config.detection_sample_size, config.detection_threshold)
            .with_metrics(Arc::clone(&metrics));

        Ok(Self {
            timestamps: TimestampParser::new(config.time_layout.clone()),
            entries: EntryPool::new(config.entry_pool_capacity),
            buffers: BufferPool::new(config.buffer_size, BUFFER_POOL_CAPACITY),
            patterns,
            formats,
            detector,
            metrics,
            ua,
            geo: geo.filter(|_| config.enable_geo),
            config,
        })
    }

    /// Parser with the built-in classifier behind a `ua_cache_size` cache
    /// and no geo lookup.
    pub fn with_default_classifier(config: ParserConfig) -> Result<Self, ConfigError> {
        let ua = Arc::new(CachedUserAgentParser::new(
            UserAgentClassifier::new(),
            config.ua_cache_size,
        ));
        Self::new(config, ua, None)
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Parse one line.
    ///
    /// In lenient mode any non-empty line within `max_line_length` yields an
    /// entry; lines the scanner cannot read become degraded entries that only
    /// carry `raw`, `id` and the current time.
    pub fn parse_line(&self, line: &str) -> Result<AccessLogEntry, ParseError> {
        let started = Instant::now();
        match self.parse_line_inner(line) {
            Ok((entry, degraded)) => {
                self.metrics
                    .record_parse(degraded, started.elapsed().as_nanos() as u64);
                Ok(entry)
            }
            Err(e) => {
                self.metrics.record_error(MetricErrorType::from(&e));
                Err(e)
            }
        }
    }

    fn parse_line_inner(&self, line: &str) -> Result<(AccessLogEntry, bool), ParseError> {
        if line.is_empty() {
            return Err(ParseError::EmptyLine);
        }
        if line.len() > self.config.max_line_length {
            return Err(ParseError::LineTooLong {
                len: line.len(),
                max: self.config.max_line_length,
            });
        }

        match scan_line(line, self.config.strict_mode) {
            Ok(scanned) => {
                let mut entry = self.entries.acquire();
                self.materialize(&scanned, line, &mut entry);
                self.enrich(&mut entry);
                Ok((entry, false))
            }
            Err(e) if self.config.strict_mode => Err(ParseError::UnsupportedLogFormat(e.to_string())),
            Err(e) => {
                tracing::debug!(error = %e, "Unparsable line kept as degraded entry");
                Ok((self.degraded(line), true))
            }
        }
    }

    fn materialize(&self, s: &ScannedLine<'_>, line: &str, entry: &mut AccessLogEntry) {
        entry.raw.push_str(line);
        entry.assign_id(line);
        entry.timestamp = s
            .time_local
            .and_then(|t| self.timestamps.parse(t))
            .unwrap_or(0);
        entry.ip.push_str(s.ip);
        entry.method.push_str(s.method);
        entry.path.push_str(s.path);
        entry.protocol.push_str(s.protocol);
        entry.status = s.status;
        entry.bytes_sent = s.bytes_sent;
        entry.referer.push_str(s.referer);
        entry.user_agent.push_str(s.user_agent);
        entry.request_time = s.request_time;
        entry.upstream_time = s.upstream_time;
    }

    fn degraded(&self, line: &str) -> AccessLogEntry {
        let mut entry = self.entries.acquire();
        entry.raw.push_str(line);
        entry.assign_id(line);
        entry.timestamp = Utc::now().timestamp();
        entry
    }

    fn enrich(&self, entry: &mut AccessLogEntry) {
        if let Some(geo) = &self.geo {
            if !entry.ip.is_empty() && entry.ip != "-" {
                match geo.search(&entry.ip) {
                    Ok(Some(location)) => {
                        entry.region_code = location.region_code;
                        entry.province = location.province;
                        entry.city = location.city;
                        self.metrics.record_geo_lookup(false);
                    }
                    Ok(None) => self.metrics.record_geo_lookup(false),
                    Err(e) => {
                        tracing::debug!(ip = %entry.ip, error = %e, "Geo lookup failed");
                        self.metrics.record_geo_lookup(true);
                    }
                }
            }
        }

        if self.config.enable_ua && !entry.user_agent.is_empty() && entry.user_agent != "-" {
            let info = self.ua.parse(&entry.user_agent);
            entry.browser = info.browser;
            entry.browser_version = info.browser_version;
            entry.os = info.os;
            entry.os_version = info.os_version;
            entry.device_type.push_str(info.device_type.as_str());
            self.metrics.record_ua_classified();
        }
    }

    /// Hand an entry back so its string buffers can be reused.
    pub fn recycle(&self, entry: AccessLogEntry) {
        self.entries.release(entry);
    }

    pub fn recycle_all(&self, entries: impl IntoIterator<Item = AccessLogEntry>) {
        for entry in entries {
            self.entries.release(entry);
        }
    }

    /// Dominant registered format of `lines`, if one reaches the detection
    /// threshold. Informational only; parsing does not depend on it.
    pub fn detect_format<S: AsRef<str>>(&self, lines: &[S]) -> Option<LogFormat> {
        self.detector.detect(&self.formats, lines)
    }

    pub fn detect_report<S: AsRef<str>>(&self, lines: &[S]) -> DetectionReport {
        self.detector.detect_report(&self.formats, lines)
    }

    pub fn formats(&self) -> &FormatRegistry {
        &self.formats
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn pattern_cache_stats(&self) -> PatternCacheStats {
        self.patterns.stats()
    }

    pub fn entry_pool_stats(&self) -> PoolStats {
        self.entries.stats()
    }

    pub fn buffer_pool_stats(&self) -> PoolStats {
        self.buffers.stats()
    }

    pub(crate) fn buffers(&self) -> &BufferPool {
        &self.buffers
    }

    /// Count an error that stopped a whole stream. Cancellation is not one.
    pub(crate) fn record_stream_error(&self, error: &ParseError) {
        if !matches!(error, ParseError::Cancelled) {
            self.metrics.record_error(MetricErrorType::from(error));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::model::entry_id;
    use crate::parser::traits::{
        DeviceType, GeoError, GeoLocation, MockGeoIpService, MockUserAgentParser, UserAgentInfo,
    };

    const COMBINED: &str = r#"127.0.0.1 - - [25/Dec/2023:10:00:00 +0000] "GET /index.html HTTP/1.1" 200 1234 "https://example.com" "Mozilla/5.0""#;
    const CHROME: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/96.0.4664.110 Safari/537.36";

    fn parser() -> LogParser {
        LogParser::with_default_classifier(ParserConfig::default()).unwrap()
    }

    fn strict() -> LogParser {
        LogParser::with_default_classifier(ParserConfig {
            strict_mode: true,
            ..Default::default()
        })
        .unwrap()
    }

    fn with_geo(geo: MockGeoIpService) -> LogParser {
        LogParser::new(
            ParserConfig::default(),
            Arc::new(UserAgentClassifier::new()),
            Some(Arc::new(geo)),
        )
        .unwrap()
    }

    #[test]
    fn test_round_trip_combined() {
        let e = parser().parse_line(COMBINED).unwrap();
        assert_eq!(e.ip, "127.0.0.1");
        assert_eq!(e.method, "GET");
        assert_eq!(e.path, "/index.html");
        assert_eq!(e.protocol, "HTTP/1.1");
        assert_eq!(e.status, 200);
        assert_eq!(e.bytes_sent, 1234);
        assert_eq!(e.referer, "https://example.com");
        assert_eq!(e.user_agent, "Mozilla/5.0");
        assert_eq!(e.timestamp, 1_703_498_400);
        assert_eq!(e.raw, COMBINED);
        assert_eq!(e.id, entry_id(COMBINED));
    }

    #[test]
    fn test_degraded_line() {
        let p = parser();
        let before = Utc::now().timestamp();
        let e = p.parse_line("not a valid log line").unwrap();
        assert_eq!(e.raw, "not a valid log line");
        assert_eq!(e.id, entry_id("not a valid log line"));
        assert!(e.timestamp >= before);
        assert!(e.ip.is_empty() && e.method.is_empty() && e.path.is_empty());
        assert_eq!(e.status, 0);
        assert_eq!(e.bytes_sent, 0);
        assert!(e.browser.is_empty());
        assert_eq!(p.metrics().lines_degraded, 1);
    }

    #[test]
    fn test_strict_mode_rejects() {
        let p = strict();
        assert!(matches!(
            p.parse_line("not a valid log line"),
            Err(ParseError::UnsupportedLogFormat(_))
        ));
        let no_bracket = r#"127.0.0.1 - - 25/Dec/2023:10:00:00 "GET / HTTP/1.1" 200 1"#;
        assert!(matches!(p.parse_line(no_bracket), Err(ParseError::UnsupportedLogFormat(_))));
        assert!(p.parse_line(COMBINED).is_ok());
        assert_eq!(p.metrics().unsupported_lines, 2);
    }

    #[test]
    fn test_empty_and_too_long() {
        let p = LogParser::with_default_classifier(ParserConfig {
            max_line_length: 64,
            ..Default::default()
        })
        .unwrap();
        assert!(matches!(p.parse_line(""), Err(ParseError::EmptyLine)));
        let long = "x".repeat(65);
        assert!(matches!(
            p.parse_line(&long),
            Err(ParseError::LineTooLong { len: 65, max: 64 })
        ));
        assert!(p.parse_line(&"x".repeat(64)).is_ok());

        let snap = p.metrics();
        assert_eq!(snap.empty_lines, 1);
        assert_eq!(snap.lines_too_long, 1);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let err = LogParser::with_default_classifier(ParserConfig {
            max_line_length: 0,
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_timings() {
        let p = parser();
        let timed = r#"10.0.0.1 - - [25/Dec/2023:10:00:00 +0000] "GET / HTTP/1.1" 200 1234 "-" "Mozilla/5.0" 30.123456 45.987654"#;
        let e = p.parse_line(timed).unwrap();
        assert_eq!(e.request_time, 30.123456);
        assert_eq!(e.upstream_time, Some(45.987654));

        let dashed = r#"10.0.0.1 - - [25/Dec/2023:10:00:00 +0000] "GET / HTTP/1.1" 200 1234 "-" "-""#;
        let e = p.parse_line(dashed).unwrap();
        assert_eq!(e.request_time, 0.0);
        assert_eq!(e.upstream_time, None);
        assert_eq!(e.referer, "-");
        assert_eq!(e.user_agent, "-");
        assert!(e.browser.is_empty());
    }

    #[test]
    fn test_status_bounds() {
        let p = parser();
        let bad = COMBINED.replace(" 200 ", " 999 ");
        assert_eq!(p.parse_line(&bad).unwrap().status, 0);
        let dash_bytes = COMBINED.replace(" 1234 ", " - ");
        assert_eq!(p.parse_line(&dash_bytes).unwrap().bytes_sent, 0);
    }

    #[test]
    fn test_unparsable_timestamp_is_zero() {
        let line = COMBINED.replace("25/Dec/2023:10:00:00 +0000", "sometime last week");
        let e = parser().parse_line(&line).unwrap();
        assert_eq!(e.timestamp, 0);
        assert_eq!(e.status, 200);
    }

    #[test]
    fn test_ua_enrichment() {
        let line = COMBINED.replace("\"Mozilla/5.0\"", &format!("\"{CHROME}\""));
        let e = parser().parse_line(&line).unwrap();
        assert_eq!(e.browser, "Chrome");
        assert_eq!(e.os, "Windows");
        assert_eq!(e.device_type, "Desktop");
    }

    #[test]
    fn test_ua_disabled_skips_classifier() {
        let mut ua = MockUserAgentParser::new();
        ua.expect_parse().never();
        let p = LogParser::new(
            ParserConfig {
                enable_ua: false,
                ..Default::default()
            },
            Arc::new(ua),
            None,
        )
        .unwrap();
        let e = p.parse_line(COMBINED).unwrap();
        assert!(e.browser.is_empty());
    }

    #[test]
    fn test_custom_ua_parser() {
        let mut ua = MockUserAgentParser::new();
        ua.expect_parse()
            .withf(|agent: &str| agent == "Mozilla/5.0")
            .times(1)
            .returning(|_| UserAgentInfo {
                browser: "Probe".into(),
                browser_version: "1".into(),
                os: "TestOS".into(),
                os_version: String::new(),
                device_type: DeviceType::IoT,
            });
        let p = LogParser::new(ParserConfig::default(), Arc::new(ua), None).unwrap();
        let e = p.parse_line(COMBINED).unwrap();
        assert_eq!(e.browser, "Probe");
        assert_eq!(e.device_type, "IoT");
    }

    #[test]
    fn test_geo_enrichment() {
        let mut geo = MockGeoIpService::new();
        geo.expect_search()
            .withf(|ip: &str| ip == "127.0.0.1")
            .times(1)
            .returning(|_| {
                Ok(Some(GeoLocation {
                    country: "CN".into(),
                    region_code: "310000".into(),
                    province: "Shanghai".into(),
                    city: "Shanghai".into(),
                }))
            });
        let p = with_geo(geo);
        let e = p.parse_line(COMBINED).unwrap();
        assert_eq!(e.region_code, "310000");
        assert_eq!(e.province, "Shanghai");
        assert_eq!(e.city, "Shanghai");
        assert_eq!(p.metrics().geo_lookups, 1);
    }

    #[test]
    fn test_geo_failure_is_swallowed() {
        let mut geo = MockGeoIpService::new();
        geo.expect_search()
            .returning(|ip| Err(GeoError::InvalidAddress(ip.to_string())));
        let p = with_geo(geo);
        let e = p.parse_line(COMBINED).unwrap();
        assert!(e.region_code.is_empty());
        assert_eq!(p.metrics().geo_failures, 1);
    }

    #[test]
    fn test_geo_skipped_for_dash_and_when_disabled() {
        let mut geo = MockGeoIpService::new();
        geo.expect_search().never();
        let p = with_geo(geo);
        let line = COMBINED.replacen("127.0.0.1", "-", 1);
        assert!(p.parse_line(&line).is_ok());

        let mut geo = MockGeoIpService::new();
        geo.expect_search().never();
        let p = LogParser::new(
            ParserConfig {
                enable_geo: false,
                ..Default::default()
            },
            Arc::new(UserAgentClassifier::new()),
            Some(Arc::new(geo)),
        )
        .unwrap();
        assert!(p.parse_line(COMBINED).is_ok());
    }

    #[test]
    fn test_recycled_entry_is_clean() {
        let p = parser();
        let first = p.parse_line(COMBINED).unwrap();
        p.recycle(first);
        let second = p.parse_line("not a valid log line").unwrap();
        assert!(second.path.is_empty());
        assert!(second.referer.is_empty());
        assert_eq!(p.entry_pool_stats().reused, 1);
    }

    #[test]
    fn test_id_is_pure_under_concurrency() {
        let p = Arc::new(parser());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let p = Arc::clone(&p);
                std::thread::spawn(move || {
                    (0..50).map(|_| p.parse_line(COMBINED).unwrap().id).collect::<Vec<_>>()
                })
            })
            .collect();
        let expected = entry_id(COMBINED);
        for h in handles {
            assert!(h.join().unwrap().iter().all(|id| *id == expected));
        }
    }

    #[test]
    fn test_detect_format() {
        let p = parser();
        assert_eq!(p.detect_format(&[COMBINED, COMBINED]).unwrap().name, "combined");
        assert!(p.detect_format(&["a", "b"]).is_none());
        assert_eq!(p.metrics().detection_attempts, 2);
        assert!(p.pattern_cache_stats().size >= 3);
    }

    #[test]
    fn test_lenient_never_errors_on_noise() {
        let p = parser();
        for line in [
            "x",
            "\"\"\"\"\"\"\"\"\"\"\"\"\"\"\"\"\"\"\"\"\"\"\"\"",
            "1.1.1.1 - - [ unterminated bracket and then some text",
            "1.1.1.1 - - [25/Dec/2023:10:00:00 +0000] \"GET /unterminated request",
            "héllo wörld ünïcödé  ✓ ✓ ✓ ✓ ✓ ✓ ✓ ✓",
        ] {
            let e = p.parse_line(line).unwrap();
            assert_eq!(e.raw, line);
        }
    }
}
