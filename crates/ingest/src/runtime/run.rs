//! Run: parse one input to JSON lines on stdout.

use std::borrow::Cow;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::parser::{AccessLogEntry, LogParser, ParseError, ParseResult};

use super::boot::SharedClassifier;
use super::stop::cancel_on_signal;

type Input = Box<dyn AsyncRead + Unpin + Send>;

/// Parse `path` (or stdin) and write every entry to stdout as one JSON
/// object per line. Ctrl+C stops reading; whatever was parsed is still
/// written.
pub async fn run(
    parser: Arc<LogParser>,
    classifier: SharedClassifier,
    path: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let input: Input = match path {
        Some(p) => {
            info!("Reading {}", p.display());
            Box::new(tokio::fs::File::open(p).await?)
        }
        None => {
            info!("Reading stdin");
            Box::new(tokio::io::stdin())
        }
    };
    let capacity = parser.config().buffer_size;
    let mut reader = BufReader::with_capacity(capacity, input);

    // Peek at the first buffer for format detection without consuming it.
    let report = {
        let head = reader.fill_buf().await?;
        let text = sample_text(head, head.len() >= capacity);
        let sample: Vec<&str> = text.lines().collect();
        parser.detect_report(&sample)
    };
    match &report.format {
        Some(format) => info!(
            "Detected format '{}' (confidence {:.2} over {} lines)",
            format.name, report.confidence, report.sampled
        ),
        None => warn!(
            "No known format reached the detection threshold (best {:.2} over {} lines)",
            report.confidence, report.sampled
        ),
    }

    let cancel = CancellationToken::new();
    let signals = cancel_on_signal(cancel.clone());

    let outcome = parser.parse_stream(reader, &cancel).await;
    cancel.cancel();
    let _ = signals.await;

    let (result, failure) = match outcome {
        Ok(result) => (result, None),
        Err(abort) => match abort.error {
            ParseError::Cancelled => {
                warn!("Parse cancelled after {} lines", abort.partial.processed);
                (abort.partial, None)
            }
            error => (abort.partial, Some(error)),
        },
    };

    write_entries(&result.entries)?;
    summarize(&parser, &classifier, &result);

    match failure {
        Some(e) => {
            error!("Input aborted: {}", e);
            Err(e.into())
        }
        None => Ok(()),
    }
}

/// Decode the peeked bytes the way the stream does. A full buffer most
/// likely ends mid-line, so everything after its last newline is dropped.
fn sample_text(head: &[u8], full: bool) -> Cow<'_, str> {
    let complete = match head.iter().rposition(|&b| b == b'\n') {
        Some(end) if full => &head[..end],
        _ => head,
    };
    String::from_utf8_lossy(complete)
}

fn write_entries(entries: &[AccessLogEntry]) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    for entry in entries {
        serde_json::to_writer(&mut out, entry)?;
        out.write_all(b"\n")?;
    }
    out.flush()
}

fn summarize(parser: &LogParser, classifier: &SharedClassifier, result: &ParseResult) {
    info!(
        "Parsed {} lines: {} succeeded, {} failed (error rate {:.4}) in {:?}",
        result.processed, result.succeeded, result.failed, result.error_rate, result.duration
    );

    match serde_json::to_string(&parser.metrics()) {
        Ok(json) => info!("Metrics: {}", json),
        Err(e) => warn!("Failed to serialize metrics: {}", e),
    }

    let (size, max) = classifier.cache_stats();
    info!(
        "User-agent cache: {}/{} entries, {} hits, {} misses",
        size,
        max,
        classifier.hits(),
        classifier.misses()
    );
}
