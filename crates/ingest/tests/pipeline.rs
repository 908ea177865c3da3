use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ingest::conf::ParserConfig;
use ingest::parser::{
    entry_id, GeoError, GeoIpService, GeoLocation, LogParser, ParseError, UserAgentParser,
};
use ingest::useragent::{CachedUserAgentParser, DeviceType, UserAgentClassifier};
use tokio_util::sync::CancellationToken;

const COMBINED: &str = r#"203.0.113.7 - alice [10/Oct/2023:13:55:36 +0000] "POST /api/v1/orders?id=42 HTTP/2.0" 201 512 "https://shop.example.com/cart" "Mozilla/5.0 (iPhone; CPU iPhone OS 16_5 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.5 Mobile/15E148 Safari/604.1" 0.042 0.040"#;

const BOT: &str = r#"66.249.66.1 - - [10/Oct/2023:13:55:37 +0000] "GET /robots.txt HTTP/1.1" 200 68 "-" "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)""#;

fn line(i: usize) -> String {
    format!(
        r#"198.51.100.{} - - [10/Oct/2023:13:55:36 +0000] "GET /page/{} HTTP/1.1" 200 {} "-" "curl/8.4.0""#,
        i % 250,
        i,
        i * 10
    )
}

/// In-memory geo table keyed by address.
struct StaticGeo {
    table: HashMap<&'static str, GeoLocation>,
    calls: AtomicUsize,
}

impl StaticGeo {
    fn new() -> Self {
        let mut table = HashMap::new();
        table.insert(
            "203.0.113.7",
            GeoLocation {
                country: "CN".to_string(),
                region_code: "440000".to_string(),
                province: "Guangdong".to_string(),
                city: "Shenzhen".to_string(),
            },
        );
        Self {
            table,
            calls: AtomicUsize::new(0),
        }
    }
}

impl GeoIpService for StaticGeo {
    fn search(&self, ip: &str) -> Result<Option<GeoLocation>, GeoError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if ip.parse::<std::net::IpAddr>().is_err() {
            return Err(GeoError::InvalidAddress(ip.to_string()));
        }
        Ok(self.table.get(ip).cloned())
    }
}

#[test]
fn test_full_entry_with_enrichment() {
    let geo = Arc::new(StaticGeo::new());
    let parser = LogParser::new(
        ParserConfig::default(),
        Arc::new(UserAgentClassifier::new()),
        Some(geo.clone()),
    )
    .unwrap();

    let e = parser.parse_line(COMBINED).unwrap();
    assert_eq!(e.id, entry_id(COMBINED));
    assert_eq!(e.ip, "203.0.113.7");
    assert_eq!(e.timestamp, 1_696_946_136);
    assert_eq!(e.method, "POST");
    assert_eq!(e.path, "/api/v1/orders?id=42");
    assert_eq!(e.protocol, "HTTP/2.0");
    assert_eq!(e.status, 201);
    assert_eq!(e.bytes_sent, 512);
    assert_eq!(e.referer, "https://shop.example.com/cart");
    assert_eq!(e.request_time, 0.042);
    assert_eq!(e.upstream_time, Some(0.040));

    assert_eq!(e.region_code, "440000");
    assert_eq!(e.province, "Guangdong");
    assert_eq!(e.city, "Shenzhen");
    assert_eq!(geo.calls.load(Ordering::Relaxed), 1);

    assert_eq!(e.browser, "Safari");
    assert_eq!(e.os, "iOS");
    assert_eq!(e.device_type, DeviceType::IPhone.as_str());

    let snap = parser.metrics();
    assert_eq!(snap.lines_parsed, 1);
    assert_eq!(snap.geo_lookups, 1);
    assert_eq!(snap.ua_classified, 1);
}

#[test]
fn test_geo_disabled_by_config() {
    let geo = Arc::new(StaticGeo::new());
    let parser = LogParser::new(
        ParserConfig {
            enable_geo: false,
            ..Default::default()
        },
        Arc::new(UserAgentClassifier::new()),
        Some(geo.clone()),
    )
    .unwrap();

    let e = parser.parse_line(COMBINED).unwrap();
    assert!(e.region_code.is_empty());
    assert_eq!(geo.calls.load(Ordering::Relaxed), 0);
}

#[test]
fn test_bot_classification() {
    let parser = LogParser::with_default_classifier(ParserConfig::default()).unwrap();
    let e = parser.parse_line(BOT).unwrap();
    assert_eq!(e.browser, "Googlebot");
    assert_eq!(e.device_type, DeviceType::Bot.as_str());

    let classifier = UserAgentClassifier::new();
    assert!(classifier.is_bot(&e.user_agent));
    assert!(!classifier.is_mobile(&e.user_agent));
}

#[test]
fn test_lenient_and_strict_modes() {
    let lenient = LogParser::with_default_classifier(ParserConfig::default()).unwrap();
    let e = lenient.parse_line("kernel: eth0 link up").unwrap();
    assert_eq!(e.raw, "kernel: eth0 link up");
    assert_eq!(e.status, 0);
    assert!(e.ip.is_empty());
    assert!(matches!(lenient.parse_line(""), Err(ParseError::EmptyLine)));

    let strict = LogParser::with_default_classifier(ParserConfig {
        strict_mode: true,
        ..Default::default()
    })
    .unwrap();
    assert!(matches!(
        strict.parse_line("kernel: eth0 link up"),
        Err(ParseError::UnsupportedLogFormat(_))
    ));
    assert!(strict.parse_line(COMBINED).is_ok());
}

#[test]
fn test_format_detection() {
    let parser = LogParser::with_default_classifier(ParserConfig::default()).unwrap();

    let sample = [COMBINED, BOT, COMBINED];
    let report = parser.detect_report(&sample);
    assert_eq!(report.sampled, 3);
    assert!(report.confidence >= 0.8);
    assert_eq!(report.format.map(|f| f.name), Some("combined".to_string()));

    let noise = ["Starting server", "Listening on :8080", "ready"];
    assert!(parser.detect_format(&noise).is_none());

    let snap = parser.metrics();
    assert_eq!(snap.detection_attempts, 2);
    assert_eq!(snap.detection_success, 1);
    assert_eq!(snap.detection_fallback, 1);
}

#[test]
fn test_parse_lines_accounting() {
    let parser = LogParser::with_default_classifier(ParserConfig {
        batch_size: 64,
        worker_count: 4,
        ..Default::default()
    })
    .unwrap();

    let mut lines: Vec<String> = (0..1000).map(line).collect();
    lines[7] = String::new();
    lines[500] = "x".repeat(ParserConfig::default().max_line_length + 1);

    let result = parser.parse_lines(&lines, &CancellationToken::new());
    assert_eq!(result.processed, 1000);
    assert_eq!(result.failed, 2);
    assert_eq!(result.succeeded, 998);
    assert_eq!(result.entries.len(), 998);
    assert!((result.error_rate - 0.002).abs() < 1e-12);

    parser.recycle_all(result.entries);
    assert!(parser.entry_pool_stats().available > 0);
}

#[tokio::test]
async fn test_stream_end_to_end() {
    let parser = Arc::new(LogParser::with_default_classifier(ParserConfig::default()).unwrap());
    let mut input = String::new();
    for i in 0..2500 {
        input.push_str(&line(i));
        input.push('\n');
    }
    input.push_str(COMBINED);
    input.push_str("\r\n");

    let result = parser
        .parse_stream(input.as_bytes(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(result.processed, 2501);
    assert_eq!(result.succeeded, 2501);
    assert_eq!(result.failed, 0);
    assert!(result.entries.iter().any(|e| e.raw == COMBINED && e.status == 201));
}

#[tokio::test]
async fn test_stream_cancelled_keeps_partial() {
    let parser = Arc::new(LogParser::with_default_classifier(ParserConfig::default()).unwrap());
    let input: String = (0..4096).map(|i| format!("{}\n", line(i))).collect();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let abort = parser.parse_stream(input.as_bytes(), &cancel).await.unwrap_err();
    assert!(matches!(abort.error, ParseError::Cancelled));
    assert!(abort.partial.processed < 4096);
    assert!(abort.to_string().contains("stream aborted"));
}

#[test]
fn test_cached_classifier_is_shared() {
    let classifier = Arc::new(CachedUserAgentParser::new(UserAgentClassifier::new(), 128));
    let parser = LogParser::new(ParserConfig::default(), classifier.clone(), None).unwrap();

    for _ in 0..10 {
        parser.parse_line(BOT).unwrap();
    }
    assert_eq!(classifier.misses(), 1);
    assert_eq!(classifier.hits(), 9);
    assert_eq!(classifier.cache_stats(), (1, 128));
}
