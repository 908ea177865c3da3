//! Named access-log layouts and the registry the detector matches against.
//!
//! Formats are only used to recognise and report what a log looks like; the
//! scanner reads every layout the same way.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;

use super::cache::PatternCache;
use super::pattern::{Pattern, PatternError};

/// A double-quoted field, honouring `\"` escapes.
const QUOTED: &str = r#""(?:[^"\\]|\\.)*""#;

/// `$remote_addr - $remote_user [$time_local]`
const PREFIX: &str = r"^\S+ \S+ \S+ \[[^\]]+\]";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogFormat {
    pub name: String,
    pub pattern: String,
    pub fields: Vec<String>,
}

impl LogFormat {
    pub fn new(name: impl Into<String>, pattern: impl Into<String>, fields: &[&str]) -> Self {
        Self {
            name: name.into(),
            pattern: pattern.into(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
        }
    }

    /// nginx `main`: request line, status and bytes, referer and agent optional.
    pub fn main() -> Self {
        Self::new(
            "main",
            format!(r#"{PREFIX} {QUOTED} \d{{3}} (?:\d+|-)(?: {QUOTED} {QUOTED})?\s*$"#),
            &[
                "remote_addr",
                "remote_user",
                "time_local",
                "request",
                "status",
                "body_bytes_sent",
                "http_referer",
                "http_user_agent",
            ],
        )
    }

    /// nginx `combined`, optionally followed by request and upstream times.
    pub fn combined() -> Self {
        Self::new(
            "combined",
            format!(
                r#"{PREFIX} {QUOTED} \d{{3}} (?:\d+|-) {QUOTED} {QUOTED}(?: (?:[\d.]+|-))?(?: (?:[\d.]+|-))?\s*$"#
            ),
            &[
                "remote_addr",
                "remote_user",
                "time_local",
                "request",
                "status",
                "body_bytes_sent",
                "http_referer",
                "http_user_agent",
                "request_time",
                "upstream_response_time",
            ],
        )
    }

    /// `combined` plus a quoted `X-Forwarded-For` and trailing timing fields.
    pub fn detailed() -> Self {
        Self::new(
            "detailed",
            format!(
                r#"{PREFIX} {QUOTED} \d{{3}} (?:\d+|-) {QUOTED} {QUOTED} {QUOTED}(?: \S+)+\s*$"#
            ),
            &[
                "remote_addr",
                "remote_user",
                "time_local",
                "request",
                "status",
                "body_bytes_sent",
                "http_referer",
                "http_user_agent",
                "http_x_forwarded_for",
                "request_time",
                "upstream_response_time",
            ],
        )
    }

    /// Built-in formats, most specific first.
    pub fn builtin() -> Vec<Self> {
        vec![Self::detailed(), Self::combined(), Self::main()]
    }
}

/// A registered format together with its compiled matcher.
#[derive(Debug, Clone)]
pub struct CompiledFormat {
    pub format: LogFormat,
    pub pattern: Arc<Pattern>,
}

impl CompiledFormat {
    pub fn matches(&self, line: &str) -> bool {
        self.pattern.is_match(line)
    }
}

/// Formats in priority order. Earlier entries win ties during detection.
#[derive(Debug)]
pub struct FormatRegistry {
    formats: RwLock<Vec<CompiledFormat>>,
    cache: Arc<PatternCache>,
}

impl FormatRegistry {
    pub fn empty(cache: Arc<PatternCache>) -> Self {
        Self {
            formats: RwLock::new(Vec::new()),
            cache,
        }
    }

    /// Registry preloaded with `detailed`, `combined` and `main`.
    pub fn with_builtin(cache: Arc<PatternCache>) -> Result<Self, PatternError> {
        let registry = Self::empty(cache);
        for format in LogFormat::builtin() {
            registry.register(format)?;
        }
        Ok(registry)
    }

    fn compile(&self, format: LogFormat) -> Result<CompiledFormat, PatternError> {
        let pattern = self.cache.get_or_compile(&format.pattern)?;
        Ok(CompiledFormat { format, pattern })
    }

    /// Append `format` at the lowest priority. A format with the same name
    /// is replaced in place.
    pub fn register(&self, format: LogFormat) -> Result<(), PatternError> {
        let compiled = self.compile(format)?;
        let mut formats = self.formats.write();
        match formats.iter_mut().find(|f| f.format.name == compiled.format.name) {
            Some(slot) => *slot = compiled,
            None => formats.push(compiled),
        }
        Ok(())
    }

    /// Insert `format` at the highest priority, removing any format with the
    /// same name.
    pub fn register_first(&self, format: LogFormat) -> Result<(), PatternError> {
        let compiled = self.compile(format)?;
        let mut formats = self.formats.write();
        formats.retain(|f| f.format.name != compiled.format.name);
        formats.insert(0, compiled);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<LogFormat> {
        self.formats
            .read()
            .iter()
            .find(|f| f.format.name == name)
            .map(|f| f.format.clone())
    }

    pub fn names(&self) -> Vec<String> {
        self.formats.read().iter().map(|f| f.format.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.formats.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.formats.read().is_empty()
    }

    /// Copy of the registered formats, in priority order.
    pub fn compiled(&self) -> Vec<CompiledFormat> {
        self.formats.read().clone()
    }
}
