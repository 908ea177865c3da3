use chrono::{DateTime, NaiveDateTime};

/// nginx `$time_local`
pub const NGINX_TIME_LAYOUT: &str = "%d/%b/%Y:%H:%M:%S %z";

/// Tried in order after the configured layout. Layouts without an offset
/// are read as UTC.
const FALLBACK_LAYOUTS: &[Layout] = &[
    Layout::Rfc3339,
    Layout::Naive("%Y-%m-%d %H:%M:%S"),
    Layout::Naive("%d/%b/%Y:%H:%M:%S"),
];

#[derive(Debug, Clone, Copy)]
enum Layout {
    Rfc3339,
    Naive(&'static str),
}

/// Parses bracketed access-log timestamps into unix seconds.
#[derive(Debug, Clone)]
pub struct TimestampParser {
    primary: String,
}

impl TimestampParser {
    pub fn new(primary: impl Into<String>) -> Self {
        Self { primary: primary.into() }
    }

    pub fn primary_layout(&self) -> &str {
        &self.primary
    }

    /// Unix seconds, or `None` when no layout matches.
    pub fn parse(&self, text: &str) -> Option<i64> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        parse_with_offset(text, &self.primary)
            .or_else(|| parse_naive(text, &self.primary))
            .or_else(|| {
                FALLBACK_LAYOUTS.iter().find_map(|layout| match layout {
                    Layout::Rfc3339 => DateTime::parse_from_rfc3339(text).ok().map(|dt| dt.timestamp()),
                    Layout::Naive(fmt) => parse_naive(text, fmt),
                })
            })
    }
}

impl Default for TimestampParser {
    fn default() -> Self {
        Self::new(NGINX_TIME_LAYOUT)
    }
}

fn parse_with_offset(text: &str, layout: &str) -> Option<i64> {
    DateTime::parse_from_str(text, layout).ok().map(|dt| dt.timestamp())
}

fn parse_naive(text: &str, layout: &str) -> Option<i64> {
    NaiveDateTime::parse_from_str(text, layout)
        .ok()
        .map(|dt| dt.and_utc().timestamp())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nginx_layout_with_offset() {
        let p = TimestampParser::default();
        assert_eq!(p.parse("25/Dec/2023:10:00:00 +0000"), Some(1_703_498_400));
        // +0100 is one hour ahead of UTC
        assert_eq!(p.parse("25/Dec/2023:11:00:00 +0100"), Some(1_703_498_400));
    }

    #[test]
    fn test_rfc3339_fallback() {
        let p = TimestampParser::default();
        assert_eq!(p.parse("2023-12-25T10:00:00Z"), Some(1_703_498_400));
        assert_eq!(p.parse("2023-12-25T12:00:00+02:00"), Some(1_703_498_400));
    }

    #[test]
    fn test_plain_datetime_fallback() {
        let p = TimestampParser::default();
        assert_eq!(p.parse("2023-12-25 10:00:00"), Some(1_703_498_400));
    }

    #[test]
    fn test_nginx_without_zone_fallback() {
        let p = TimestampParser::default();
        assert_eq!(p.parse("25/Dec/2023:10:00:00"), Some(1_703_498_400));
    }

    #[test]
    fn test_custom_primary_layout_without_zone() {
        let p = TimestampParser::new("%Y/%m/%d %H:%M:%S");
        assert_eq!(p.parse("2023/12/25 10:00:00"), Some(1_703_498_400));
    }

    #[test]
    fn test_unparsable() {
        let p = TimestampParser::default();
        assert_eq!(p.parse(""), None);
        assert_eq!(p.parse("yesterday"), None);
        assert_eq!(p.parse("32/Dec/2023:10:00:00 +0000"), None);
    }
}
