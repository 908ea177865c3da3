//! Batch orchestration: sequential for small inputs, a scoped worker pool
//! otherwise.

use std::time::Instant;

use crossbeam_channel::{bounded, never, select, unbounded};
use tokio_util::sync::CancellationToken;

use super::engine::LogParser;
use super::model::{AccessLogEntry, ParseError, ParseResult};

/// Work queue slots per worker.
const QUEUE_DEPTH_PER_WORKER: usize = 4;

impl LogParser {
    /// Parse a slice of lines.
    ///
    /// Inputs shorter than `batch_size` are parsed in order on the calling
    /// thread. Larger inputs are spread over a worker pool and the entries
    /// come back in completion order.
    ///
    /// `processed` is always `lines.len()`. After cancellation the result
    /// holds whatever finished, so `succeeded + failed` may fall short of it.
    pub fn parse_lines<S>(&self, lines: &[S], cancel: &CancellationToken) -> ParseResult
    where
        S: AsRef<str> + Sync,
    {
        let started = Instant::now();
        let result = if lines.len() < self.config().batch_size {
            self.parse_sequential(lines, cancel, started)
        } else {
            self.parse_parallel(lines, cancel, started)
        };

        tracing::debug!(
            processed = result.processed,
            succeeded = result.succeeded,
            failed = result.failed,
            elapsed_ms = result.duration.as_millis() as u64,
            "Batch parsed"
        );
        result
    }

    fn parse_sequential<S: AsRef<str>>(
        &self,
        lines: &[S],
        cancel: &CancellationToken,
        started: Instant,
    ) -> ParseResult {
        let mut entries = Vec::with_capacity(lines.len());
        let mut failed = 0;
        for line in lines {
            if cancel.is_cancelled() {
                break;
            }
            match self.parse_line(line.as_ref()) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    tracing::trace!(error = %e, "Line rejected");
                    failed += 1;
                }
            }
        }
        ParseResult::new(entries, lines.len(), failed, started.elapsed())
    }

    fn parse_parallel<S>(&self, lines: &[S], cancel: &CancellationToken, started: Instant) -> ParseResult
    where
        S: AsRef<str> + Sync,
    {
        let workers = self.config().effective_workers(lines.len());
        let (work_tx, work_rx) = bounded::<&str>(workers * QUEUE_DEPTH_PER_WORKER);
        let (ok_tx, ok_rx) = unbounded::<AccessLogEntry>();
        let (err_tx, err_rx) = unbounded::<ParseError>();

        std::thread::scope(|scope| {
            scope.spawn(move || {
                for line in lines {
                    if cancel.is_cancelled() || work_tx.send(line.as_ref()).is_err() {
                        break;
                    }
                }
            });

            for _ in 0..workers {
                let work_rx = work_rx.clone();
                let ok_tx = ok_tx.clone();
                let err_tx = err_tx.clone();
                scope.spawn(move || {
                    for line in work_rx.iter() {
                        if cancel.is_cancelled() {
                            break;
                        }
                        // The coordinator drains until every worker is gone.
                        match self.parse_line(line) {
                            Ok(entry) => {
                                let _ = ok_tx.send(entry);
                            }
                            Err(e) => {
                                let _ = err_tx.send(e);
                            }
                        }
                    }
                });
            }

            // Workers hold the only remaining handles; both result channels
            // close once the last worker exits.
            drop(work_rx);
            drop(ok_tx);
            drop(err_tx);

            let mut entries = Vec::with_capacity(lines.len());
            let mut failed = 0;
            let mut ok_rx = ok_rx;
            let mut err_rx = err_rx;
            let mut open = 2;
            while open > 0 {
                select! {
                    recv(ok_rx) -> msg => match msg {
                        Ok(entry) => entries.push(entry),
                        Err(_) => {
                            ok_rx = never();
                            open -= 1;
                        }
                    },
                    recv(err_rx) -> msg => match msg {
                        Ok(e) => {
                            tracing::trace!(error = %e, "Line rejected");
                            failed += 1;
                        }
                        Err(_) => {
                            err_rx = never();
                            open -= 1;
                        }
                    },
                }
            }

            if cancel.is_cancelled() {
                tracing::debug!(
                    completed = entries.len() + failed,
                    total = lines.len(),
                    "Batch cancelled"
                );
            }
            ParseResult::new(entries, lines.len(), failed, started.elapsed())
        })
    }
}
