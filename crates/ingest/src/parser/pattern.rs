use grep_matcher::{Captures, Matcher};
use grep_regex::{RegexMatcher, RegexMatcherBuilder};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatternError {
    #[error("Invalid regex pattern {pattern:?}: {reason}")]
    InvalidRegex { pattern: String, reason: String },
}

/// A compiled matcher plus the source it was built from.
#[derive(Clone, Debug)]
pub struct Pattern {
    source: String,
    matcher: RegexMatcher,
}

impl Pattern {
    pub fn new(source: &str) -> Result<Self, PatternError> {
        let matcher = RegexMatcherBuilder::new()
            .multi_line(false)
            .build(source)
            .map_err(|e| PatternError::InvalidRegex {
                pattern: source.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            source: source.to_string(),
            matcher,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    #[inline]
    pub fn is_match(&self, text: &str) -> bool {
        self.matcher.is_match(text.as_bytes()).unwrap_or(false)
    }

    /// Text of capture group `group` in the leftmost match.
    pub fn capture<'t>(&self, text: &'t str, group: usize) -> Option<&'t str> {
        let mut caps = self.matcher.new_captures().ok()?;
        if !self.matcher.captures(text.as_bytes(), &mut caps).ok()? {
            return None;
        }
        let m = caps.get(group)?;
        text.get(m.start()..m.end())
    }
}
