use std::sync::Arc;

use serde::Serialize;

use super::formats::{FormatRegistry, LogFormat};
use super::metrics::ParsingMetrics;

pub const DEFAULT_SAMPLE_SIZE: usize = 100;
pub const DEFAULT_THRESHOLD: f64 = 0.8;

/// Match ratio of one registered format over the sample.
#[derive(Debug, Clone, Serialize)]
pub struct FormatScore {
    pub name: String,
    pub matched: usize,
    pub ratio: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DetectionReport {
    pub format: Option<LogFormat>,
    /// Ratio of the chosen format, or the best ratio seen when none passed
    pub confidence: f64,
    /// Non-blank lines actually matched
    pub sampled: usize,
    /// One score per registered format, in priority order
    pub scores: Vec<FormatScore>,
}

/// Picks the dominant format of a sample of lines.
///
/// Every non-blank line within the first `sample_size` lines is matched
/// against every registered format. The format with the highest match ratio
/// wins if that ratio reaches `threshold`; equal ratios go to the format
/// registered first.
#[derive(Debug, Clone)]
pub struct FormatDetector {
    sample_size: usize,
    threshold: f64,
    metrics: Option<Arc<ParsingMetrics>>,
}

impl FormatDetector {
    pub fn new(sample_size: usize, threshold: f64) -> Self {
        Self {
            sample_size: sample_size.max(1),
            threshold,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<ParsingMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn sample_size(&self) -> usize {
        self.sample_size
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn detect<S: AsRef<str>>(&self, registry: &FormatRegistry, lines: &[S]) -> Option<LogFormat> {
        self.detect_report(registry, lines).format
    }

    pub fn detect_report<S: AsRef<str>>(&self, registry: &FormatRegistry, lines: &[S]) -> DetectionReport {
        let sample: Vec<&str> = lines
            .iter()
            .take(self.sample_size)
            .map(|l| l.as_ref())
            .filter(|l| !l.trim().is_empty())
            .collect();

        let formats = registry.compiled();
        let scores: Vec<FormatScore> = formats
            .iter()
            .map(|f| {
                let matched = sample.iter().filter(|line| f.matches(line)).count();
                FormatScore {
                    name: f.format.name.clone(),
                    matched,
                    ratio: if sample.is_empty() {
                        0.0
                    } else {
                        matched as f64 / sample.len() as f64
                    },
                }
            })
            .collect();

        // Strictly greater keeps the earlier (higher priority) format on ties.
        let mut best: Option<usize> = None;
        for (i, score) in scores.iter().enumerate() {
            if best.map_or(true, |b| score.ratio > scores[b].ratio) {
                best = Some(i);
            }
        }

        let confidence = best.map_or(0.0, |i| scores[i].ratio);
        let format = best
            .filter(|_| !sample.is_empty() && confidence >= self.threshold)
            .map(|i| formats[i].format.clone());

        if let Some(metrics) = &self.metrics {
            metrics.record_detection(format.is_some());
        }
        match &format {
            Some(f) => tracing::debug!(format = %f.name, confidence, sampled = sample.len(), "format detected"),
            None => tracing::debug!(confidence, sampled = sample.len(), "no format reached threshold"),
        }

        DetectionReport {
            format,
            confidence,
            sampled: sample.len(),
            scores,
        }
    }
}

impl Default for FormatDetector {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_SIZE, DEFAULT_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::cache::PatternCache;

    fn registry() -> FormatRegistry {
        FormatRegistry::with_builtin(Arc::new(PatternCache::default())).unwrap()
    }

    fn combined_lines(n: usize) -> Vec<String> {
        (0..n)
            .map(|i| {
                format!(
                    r#"10.0.0.{} - - [25/Dec/2023:10:00:{:02} +0000] "GET /item/{} HTTP/1.1" 200 {} "https://example.com" "Mozilla/5.0""#,
                    i % 255,
                    i % 60,
                    i,
                    100 + i
                )
            })
            .collect()
    }

    #[test]
    fn test_detects_combined() {
        let lines = combined_lines(20);
        let format = FormatDetector::default().detect(&registry(), &lines).unwrap();
        // combined lines also satisfy `main`; priority breaks the tie
        assert_eq!(format.name, "combined");
    }

    #[test]
    fn test_detects_main() {
        let lines = vec![r#"1.2.3.4 - - [25/Dec/2023:10:00:00 +0000] "GET / HTTP/1.1" 304 -"#; 5];
        assert_eq!(FormatDetector::default().detect(&registry(), &lines).unwrap().name, "main");
    }

    #[test]
    fn test_detects_detailed() {
        let lines = vec![
            r#"1.2.3.4 - - [25/Dec/2023:10:00:00 +0000] "GET / HTTP/1.1" 200 5 "-" "curl/8.0" "10.1.1.1" 0.010 0.008"#;
            3
        ];
        assert_eq!(FormatDetector::default().detect(&registry(), &lines).unwrap().name, "detailed");
    }

    #[test]
    fn test_unrelated_text_is_none() {
        let lines = vec!["hello world", "this is not an access log", "neither is this line"];
        assert!(FormatDetector::default().detect(&registry(), &lines).is_none());
    }

    #[test]
    fn test_empty_and_blank_sample_is_none() {
        let detector = FormatDetector::default();
        let empty: Vec<&str> = Vec::new();
        assert!(detector.detect(&registry(), &empty).is_none());

        let report = detector.detect_report(&registry(), &["", "   ", "\t"]);
        assert!(report.format.is_none());
        assert_eq!(report.sampled, 0);
        assert_eq!(report.confidence, 0.0);
    }

    #[test]
    fn test_blank_lines_do_not_dilute_ratio() {
        let mut lines = combined_lines(4);
        lines.insert(1, String::new());
        lines.insert(3, "   ".to_string());
        let report = FormatDetector::default().detect_report(&registry(), &lines);
        assert_eq!(report.sampled, 4);
        assert_eq!(report.confidence, 1.0);
    }

    #[test]
    fn test_below_threshold() {
        let mut lines = combined_lines(7);
        lines.extend(["junk".to_string(), "junk".to_string(), "junk".to_string()]);
        let report = FormatDetector::default().detect_report(&registry(), &lines);
        assert!(report.format.is_none());
        assert!((report.confidence - 0.7).abs() < 1e-9);

        let lenient = FormatDetector::new(100, 0.6);
        assert_eq!(lenient.detect(&registry(), &lines).unwrap().name, "combined");
    }

    #[test]
    fn test_sample_window() {
        let mut lines = combined_lines(10);
        lines.extend(std::iter::repeat("junk".to_string()).take(90));
        let detector = FormatDetector::new(10, 0.8);
        assert_eq!(detector.detect(&registry(), &lines).unwrap().name, "combined");
        assert!(FormatDetector::default().detect(&registry(), &lines).is_none());
    }

    #[test]
    fn test_report_lists_every_format() {
        let report = FormatDetector::default().detect_report(&registry(), &combined_lines(3));
        let names: Vec<_> = report.scores.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["detailed", "combined", "main"]);
        assert_eq!(report.scores[0].matched, 0);
        assert_eq!(report.scores[1].matched, 3);
        assert_eq!(report.scores[2].matched, 3);
    }

    #[test]
    fn test_records_metrics() {
        let metrics = Arc::new(ParsingMetrics::new());
        let detector = FormatDetector::default().with_metrics(Arc::clone(&metrics));
        detector.detect(&registry(), &combined_lines(2));
        detector.detect(&registry(), &["nope"]);
        let snap = metrics.snapshot();
        assert_eq!(snap.detection_attempts, 2);
        assert_eq!(snap.detection_success, 1);
        assert_eq!(snap.detection_fallback, 1);
    }
}
