//! Cursor-based field scanner for nginx access-log lines.
//!
//! One left-to-right pass, no allocation: every text field of
//! [`ScannedLine`] borrows from the input line. The cursor only ever stops
//! on ASCII delimiters, so every slice boundary is a char boundary.

use thiserror::Error;

/// Minimum number of bytes that must follow the remote address for the line
/// to be worth scanning.
pub const MIN_REMAINDER_LEN: usize = 20;

/// Request methods accepted into [`ScannedLine::method`].
pub const VALID_METHODS: &[&str] = &[
    "GET", "POST", "PUT", "DELETE", "HEAD", "OPTIONS", "PATCH", "CONNECT", "TRACE",
];

/// Borrowed view of one scanned line.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScannedLine<'a> {
    pub ip: &'a str,
    /// Text between `[` and `]`, unparsed
    pub time_local: Option<&'a str>,
    pub method: &'a str,
    pub path: &'a str,
    pub protocol: &'a str,
    pub status: u16,
    pub bytes_sent: u64,
    pub referer: &'a str,
    pub user_agent: &'a str,
    pub request_time: f64,
    pub upstream_time: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    #[error("line too short after remote address ({remaining} bytes left)")]
    TooShort { remaining: usize },

    #[error("expected '{expected}' before {field} at byte {offset}")]
    MissingDelimiter {
        expected: char,
        field: &'static str,
        offset: usize,
    },

    #[error("unterminated {field} starting at byte {offset}")]
    Unterminated { field: &'static str, offset: usize },
}

struct Cursor<'a> {
    line: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(line: &'a str) -> Self {
        Self { line, pos: 0 }
    }

    #[inline]
    fn peek(&self) -> Option<u8> {
        self.line.as_bytes().get(self.pos).copied()
    }

    #[inline]
    fn remaining(&self) -> usize {
        self.line.len() - self.pos
    }

    fn skip_spaces(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t')) {
            self.pos += 1;
        }
    }

    /// Consume a run of non-whitespace bytes.
    fn take_token(&mut self) -> &'a str {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b == b' ' || b == b'\t' {
                break;
            }
            self.pos += 1;
        }
        &self.line[start..self.pos]
    }

    /// Consume `[...]`. The cursor must sit on `[`.
    /// `Err` carries the rest of the line when `]` never shows up.
    fn take_bracketed(&mut self) -> Result<&'a str, &'a str> {
        let start = self.pos + 1;
        match self.line.as_bytes()[start..].iter().position(|&b| b == b']') {
            Some(rel) => {
                let end = start + rel;
                self.pos = end + 1;
                Ok(&self.line[start..end])
            }
            None => {
                self.pos = self.line.len();
                Err(&self.line[start..])
            }
        }
    }

    /// Consume `"..."`, stepping over backslash escapes. The cursor must sit
    /// on `"`. The returned text is verbatim (escapes are not decoded).
    fn take_quoted(&mut self) -> Result<&'a str, &'a str> {
        let bytes = self.line.as_bytes();
        let start = self.pos + 1;
        let mut i = start;
        while i < bytes.len() {
            match bytes[i] {
                b'\\' => i += 2,
                b'"' => {
                    self.pos = i + 1;
                    return Ok(&self.line[start..i]);
                }
                _ => i += 1,
            }
        }
        self.pos = self.line.len();
        Err(&self.line[start..])
    }
}

/// Scan one line.
///
/// Only a too-short line fails in lenient mode; everything else is
/// best-effort and leaves unmatched fields at their defaults. In strict
/// mode a missing or unterminated timestamp bracket or request quote is an
/// error as well.
pub fn scan_line(line: &str, strict: bool) -> Result<ScannedLine<'_>, ScanError> {
    let mut cur = Cursor::new(line);
    let mut out = ScannedLine {
        ip: cur.take_token(),
        ..ScannedLine::default()
    };

    if cur.remaining() < MIN_REMAINDER_LEN {
        return Err(ScanError::TooShort { remaining: cur.remaining() });
    }

    // remote logname, remote user
    for _ in 0..2 {
        cur.skip_spaces();
        cur.take_token();
    }

    cur.skip_spaces();
    if cur.peek() == Some(b'[') {
        let offset = cur.pos;
        match cur.take_bracketed() {
            Ok(ts) => out.time_local = Some(ts),
            Err(_) if strict => {
                return Err(ScanError::Unterminated { field: "timestamp", offset });
            }
            Err(rest) => out.time_local = Some(rest),
        }
    } else if strict {
        return Err(ScanError::MissingDelimiter {
            expected: '[',
            field: "timestamp",
            offset: cur.pos,
        });
    }

    cur.skip_spaces();
    if cur.peek() == Some(b'"') {
        let offset = cur.pos;
        match cur.take_quoted() {
            Ok(request) => split_request(request, &mut out),
            Err(_) if strict => {
                return Err(ScanError::Unterminated { field: "request", offset });
            }
            Err(rest) => split_request(rest, &mut out),
        }
    } else if strict {
        return Err(ScanError::MissingDelimiter {
            expected: '"',
            field: "request",
            offset: cur.pos,
        });
    }

    cur.skip_spaces();
    if let Some(code) = parse_digits::<u16>(cur.take_token()) {
        if (100..600).contains(&code) {
            out.status = code;
        }
    }

    cur.skip_spaces();
    let bytes_token = cur.take_token();
    if bytes_token == "-" {
        out.bytes_sent = 0;
    } else if let Some(n) = parse_digits::<u64>(bytes_token) {
        out.bytes_sent = n;
    }

    cur.skip_spaces();
    if cur.peek() == Some(b'"') {
        out.referer = cur.take_quoted().unwrap_or_else(|rest| rest);
    }
    cur.skip_spaces();
    if cur.peek() == Some(b'"') {
        out.user_agent = cur.take_quoted().unwrap_or_else(|rest| rest);
    }

    cur.skip_spaces();
    let request_time = cur.take_token();
    if is_timing_token(request_time) {
        out.request_time = parse_timing(request_time).unwrap_or(0.0);

        cur.skip_spaces();
        let upstream_time = cur.take_token();
        if is_timing_token(upstream_time) {
            out.upstream_time = parse_timing(upstream_time);
        }
    }

    Ok(out)
}

/// Split `METHOD path PROTOCOL`. Whitespace inside the path is kept.
fn split_request<'a>(request: &'a str, out: &mut ScannedLine<'a>) {
    let is_ws = |c: char| c == ' ' || c == '\t';
    let request = request.trim_matches(is_ws);
    if request.is_empty() {
        return;
    }

    let (first, rest) = match request.find(is_ws) {
        Some(i) => (&request[..i], request[i..].trim_start_matches(is_ws)),
        None => (request, ""),
    };
    if VALID_METHODS.contains(&first) {
        out.method = first;
    }
    if rest.is_empty() {
        return;
    }

    match rest.rfind(is_ws) {
        Some(i) if looks_like_protocol(&rest[i + 1..]) => {
            out.path = rest[..i].trim_end_matches(is_ws);
            out.protocol = &rest[i + 1..];
        }
        _ => out.path = rest,
    }
}

fn looks_like_protocol(token: &str) -> bool {
    token
        .as_bytes()
        .get(..5)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(b"HTTP/"))
}

fn parse_digits<T: std::str::FromStr>(token: &str) -> Option<T> {
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    token.parse().ok()
}

fn is_timing_token(token: &str) -> bool {
    !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit() || b == b'.' || b == b'-')
}

/// `-` and negative values are "absent".
fn parse_timing(token: &str) -> Option<f64> {
    if token == "-" {
        return None;
    }
    token
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
}
