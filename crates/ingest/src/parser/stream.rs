//! Streaming pipeline: read lines from any `AsyncRead`, parse them in
//! batches on the blocking pool.

use std::io;
use std::sync::Arc;
use std::time::Instant;

use tokio::io::AsyncRead;
use tokio_stream::StreamExt;
use tokio_util::codec::{AnyDelimiterCodec, AnyDelimiterCodecError, FramedRead};
use tokio_util::sync::CancellationToken;

use super::engine::LogParser;
use super::model::{ParseError, ParseResult, StreamAbort};
use super::pool::{BufferPool, PooledBuffer};

/// Lines read between two cancellation checks.
pub const STREAM_CANCEL_CHECK_INTERVAL: usize = 1024;

/// Lines of one batch packed into a pooled buffer.
struct LineBatch {
    buf: PooledBuffer,
    spans: Vec<(usize, usize)>,
}

impl LineBatch {
    fn new(pool: &BufferPool, capacity: usize) -> Self {
        Self {
            buf: pool.acquire(),
            spans: Vec::with_capacity(capacity),
        }
    }

    /// Append one line, minus any trailing `\r`. Invalid UTF-8 is replaced
    /// so every span is valid text.
    fn push(&mut self, line: &[u8]) {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        let start = self.buf.len();
        match std::str::from_utf8(line) {
            Ok(_) => self.buf.extend_from_slice(line),
            Err(_) => self
                .buf
                .extend_from_slice(String::from_utf8_lossy(line).as_bytes()),
        }
        self.spans.push((start, self.buf.len()));
    }

    fn len(&self) -> usize {
        self.spans.len()
    }

    fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    fn lines(&self) -> Vec<&str> {
        self.spans
            .iter()
            .map(|&(start, end)| std::str::from_utf8(&self.buf[start..end]).unwrap_or_default())
            .collect()
    }
}

fn line_too_long(max_line_length: usize) -> ParseError {
    ParseError::Io(io::Error::new(
        io::ErrorKind::InvalidData,
        format!("line exceeds max_line_length ({max_line_length} bytes)"),
    ))
}

fn codec_error(err: AnyDelimiterCodecError, max_line_length: usize) -> ParseError {
    match err {
        AnyDelimiterCodecError::Io(e) => ParseError::Io(e),
        AnyDelimiterCodecError::MaxChunkLengthExceeded => line_too_long(max_line_length),
    }
}

/// The codec admits one byte past the limit for a CR; without one the
/// line is over-long.
fn check_length(chunk: &[u8], max_line_length: usize) -> Result<(), ParseError> {
    let line = chunk.strip_suffix(b"\r").unwrap_or(chunk);
    if line.len() > max_line_length {
        return Err(line_too_long(max_line_length));
    }
    Ok(())
}

impl LogParser {
    /// Parse every line of `reader`.
    ///
    /// Lines are collected into batches of `batch_size` and each full batch
    /// runs through [`LogParser::parse_lines`] on a blocking task. A read
    /// error, an over-long line or cancellation stops the stream; the error
    /// carries everything parsed up to that point.
    pub async fn parse_stream<R>(
        self: &Arc<Self>,
        reader: R,
        cancel: &CancellationToken,
    ) -> Result<ParseResult, StreamAbort>
    where
        R: AsyncRead + Unpin,
    {
        let started = Instant::now();
        let batch_size = self.config().batch_size;
        // One extra byte leaves room for a CR before the newline.
        let max_line_length = self.config().max_line_length;
        let max_chunk = max_line_length + 1;
        let codec = AnyDelimiterCodec::new_with_max_length(b"\n".to_vec(), Vec::new(), max_chunk);
        let mut frames = FramedRead::with_capacity(reader, codec, self.config().buffer_size);

        let mut total = ParseResult::empty();
        let mut batch = LineBatch::new(self.buffers(), batch_size);
        let mut seen = 0usize;

        while let Some(frame) = frames.next().await {
            let checked = frame
                .map_err(|e| codec_error(e, max_line_length))
                .and_then(|chunk| check_length(&chunk, max_line_length).map(|()| chunk));
            let chunk = match checked {
                Ok(chunk) => chunk,
                Err(error) => {
                    // Lines read before the failure still count.
                    if !batch.is_empty() {
                        match self.dispatch(batch, cancel).await {
                            Ok(result) => total.absorb(result),
                            Err(e) => tracing::warn!(error = %e, "Dropping pending batch"),
                        }
                    }
                    return Err(self.abort(total, error, started));
                }
            };

            batch.push(&chunk);
            seen += 1;

            if seen % STREAM_CANCEL_CHECK_INTERVAL == 0 && cancel.is_cancelled() {
                return Err(self.abort(total, ParseError::Cancelled, started));
            }

            if batch.len() >= batch_size {
                if cancel.is_cancelled() {
                    return Err(self.abort(total, ParseError::Cancelled, started));
                }
                let full = std::mem::replace(&mut batch, LineBatch::new(self.buffers(), batch_size));
                match self.dispatch(full, cancel).await {
                    Ok(result) => total.absorb(result),
                    Err(e) => return Err(self.abort(total, e, started)),
                }
            }
        }

        if !batch.is_empty() {
            if cancel.is_cancelled() {
                return Err(self.abort(total, ParseError::Cancelled, started));
            }
            match self.dispatch(batch, cancel).await {
                Ok(result) => total.absorb(result),
                Err(e) => return Err(self.abort(total, e, started)),
            }
        }

        total.finish(started.elapsed());
        tracing::info!(
            processed = total.processed,
            succeeded = total.succeeded,
            failed = total.failed,
            error_rate = total.error_rate,
            elapsed_ms = total.duration.as_millis() as u64,
            "Stream parsed"
        );
        Ok(total)
    }

    fn abort(&self, mut partial: ParseResult, error: ParseError, started: Instant) -> StreamAbort {
        partial.finish(started.elapsed());
        self.record_stream_error(&error);
        tracing::error!(
            processed = partial.processed,
            succeeded = partial.succeeded,
            error = %error,
            "Stream aborted"
        );
        StreamAbort { partial, error }
    }

    async fn dispatch(
        self: &Arc<Self>,
        batch: LineBatch,
        cancel: &CancellationToken,
    ) -> Result<ParseResult, ParseError> {
        let parser = Arc::clone(self);
        let cancel = cancel.clone();
        tokio::task::spawn_blocking(move || {
            let lines = batch.lines();
            parser.parse_lines(&lines, &cancel)
        })
        .await
        .map_err(|e| ParseError::WorkerFailed(e.to_string()))
    }
}
