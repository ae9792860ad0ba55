//! Batch Driver: fixed-size chunks, strictly sequential, limiter between.

use std::fmt;
use std::future::Future;
use std::ops::Range;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use crate::ratelimit::RateLimiter;
use crate::runlog::RunLog;

/// Chunking and fan-out settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
    /// Records per chunk. Zero is treated as one.
    pub batch_size: usize,
    /// Records of one chunk in flight at once. Zero is treated as one.
    pub concurrency: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            concurrency: 1,
        }
    }
}

/// Contiguous index ranges of `size` covering `0..len`; the last may be short.
pub fn chunk_ranges(len: usize, size: usize) -> Vec<Range<usize>> {
    let size = size.max(1);
    (0..len)
        .step_by(size)
        .map(|start| start..(start + size).min(len))
        .collect()
}

/// Runs a per-record handler over a record list chunk by chunk.
///
/// Chunks never overlap in time. Inside a chunk up to `concurrency` records
/// run at once, but outcomes are yielded (and logged) in source order, so
/// every line for chunk N precedes every line for chunk N+1. The limiter is
/// paused between chunks, never after the last.
pub struct BatchDriver {
    config: BatchConfig,
    limiter: Arc<dyn RateLimiter>,
}

impl BatchDriver {
    pub fn new(config: BatchConfig, limiter: Arc<dyn RateLimiter>) -> Self {
        Self { config, limiter }
    }

    /// Process `records`, handing each to `handler` with the sequence number
    /// its log line will carry, and append one log line per outcome.
    ///
    /// Numbering continues from whatever `log` already holds, so several runs
    /// into the same log never repeat a sequence.
    ///
    /// The handler owns its error handling: whatever it returns is logged and
    /// the run moves on. A log write failure is reported but not fatal.
    pub async fn run<'r, R, O, F, Fut>(
        &self,
        records: &'r [R],
        handler: F,
        log: &mut RunLog,
    ) -> Vec<O>
    where
        F: Fn(usize, &'r R) -> Fut,
        Fut: Future<Output = O>,
        O: fmt::Display,
    {
        let ranges = chunk_ranges(records.len(), self.config.batch_size);
        let batches = ranges.len();
        let base = log.next_sequence();
        let mut outcomes = Vec::with_capacity(records.len());

        for (n, range) in ranges.into_iter().enumerate() {
            info!(
                "batch {}/{}: records {}-{}",
                n + 1,
                batches,
                range.start + 1,
                range.end
            );
            let first_seq = base + range.start;
            let chunk = stream::iter(
                records[range]
                    .iter()
                    .enumerate()
                    .map(|(offset, record)| handler(first_seq + offset, record)),
            )
            .buffered(self.config.concurrency.max(1));
            futures::pin_mut!(chunk);

            while let Some(outcome) = chunk.next().await {
                if let Err(e) = log.append(&outcome.to_string()) {
                    warn!(
                        "could not write run log {}: {}",
                        log.path().display(),
                        e
                    );
                }
                outcomes.push(outcome);
            }

            if n + 1 < batches {
                self.limiter.pause().await;
            }
        }

        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct CountingLimiter {
        pauses: AtomicUsize,
        events: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl RateLimiter for CountingLimiter {
        async fn pause(&self) {
            self.pauses.fetch_add(1, Ordering::SeqCst);
            self.events.lock().unwrap().push("pause".to_string());
        }
    }

    fn read_log(log: &RunLog) -> Vec<String> {
        std::fs::read_to_string(log.path())
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn chunk_count_and_sizes() {
        for (len, size) in [(0, 3), (1, 3), (3, 3), (4, 3), (10, 3), (7, 1), (5, 10)] {
            let ranges = chunk_ranges(len, size);
            assert_eq!(ranges.len(), len.div_ceil(size), "len={len} size={size}");
            for (i, r) in ranges.iter().enumerate() {
                if i + 1 < ranges.len() {
                    assert_eq!(r.len(), size);
                } else {
                    let last = if len % size == 0 { size } else { len % size };
                    assert_eq!(r.len(), last);
                }
            }
            let covered: usize = ranges.iter().map(|r| r.len()).sum();
            assert_eq!(covered, len);
        }
    }

    #[test]
    fn zero_batch_size_is_one() {
        assert_eq!(chunk_ranges(3, 0), vec![0..1, 1..2, 2..3]);
    }

    #[tokio::test]
    async fn three_records_batch_two_pauses_once() {
        let tmp = tempfile::tempdir().unwrap();
        let mut log = RunLog::new(tmp.path());
        let limiter = Arc::new(CountingLimiter::default());
        let events = limiter.events.clone();
        let driver = BatchDriver::new(
            BatchConfig {
                batch_size: 2,
                concurrency: 1,
            },
            limiter.clone(),
        );

        let records = vec!["a", "b", "c"];
        let outcomes = driver
            .run(
                &records,
                |seq, r| {
                    let events = events.clone();
                    let r = r.to_string();
                    async move {
                        events.lock().unwrap().push(r.clone());
                        format!("processed {r} as {seq}")
                    }
                },
                &mut log,
            )
            .await;

        assert_eq!(outcomes.len(), 3);
        assert_eq!(limiter.pauses.load(Ordering::SeqCst), 1);
        assert_eq!(*events.lock().unwrap(), vec!["a", "b", "pause", "c"]);
        assert_eq!(
            read_log(&log),
            vec![
                "1. processed a as 1",
                "2. processed b as 2",
                "3. processed c as 3"
            ]
        );
    }

    #[tokio::test]
    async fn single_batch_never_pauses() {
        let tmp = tempfile::tempdir().unwrap();
        let mut log = RunLog::new(tmp.path());
        let limiter = Arc::new(CountingLimiter::default());
        let driver = BatchDriver::new(
            BatchConfig {
                batch_size: 5,
                concurrency: 2,
            },
            limiter.clone(),
        );
        let records = vec![1, 2, 3];
        driver
            .run(&records, |_, n| async move { n * 2 }, &mut log)
            .await;
        assert_eq!(limiter.pauses.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_input_writes_no_log() {
        let tmp = tempfile::tempdir().unwrap();
        let mut log = RunLog::new(tmp.path().join("logs"));
        let driver = BatchDriver::new(BatchConfig::default(), Arc::new(CountingLimiter::default()));
        let records: Vec<u8> = Vec::new();
        let outcomes = driver.run(&records, |_, n| async move { *n }, &mut log).await;
        assert!(outcomes.is_empty());
        assert!(!log.path().exists());
    }

    /// With fan-out, a slow first record does not reorder the log.
    #[tokio::test(start_paused = true)]
    async fn concurrent_chunk_logs_in_source_order() {
        let tmp = tempfile::tempdir().unwrap();
        let mut log = RunLog::new(tmp.path());
        let driver = BatchDriver::new(
            BatchConfig {
                batch_size: 3,
                concurrency: 3,
            },
            Arc::new(CountingLimiter::default()),
        );
        let records = vec![30u64, 10, 20, 5, 1];
        driver
            .run(
                &records,
                |_, ms| async move {
                    tokio::time::sleep(Duration::from_millis(*ms)).await;
                    format!("slept {ms}")
                },
                &mut log,
            )
            .await;
        assert_eq!(
            read_log(&log),
            vec![
                "1. slept 30",
                "2. slept 10",
                "3. slept 20",
                "4. slept 5",
                "5. slept 1"
            ]
        );
    }

    #[tokio::test]
    async fn second_run_into_same_log_continues_numbering() {
        let tmp = tempfile::tempdir().unwrap();
        let mut log = RunLog::new(tmp.path());
        let driver = BatchDriver::new(
            BatchConfig {
                batch_size: 1,
                concurrency: 1,
            },
            Arc::new(CountingLimiter::default()),
        );
        let first = vec!["a", "b"];
        let second = vec!["c", "d"];
        driver
            .run(&first, |seq, r| async move { format!("{r} as {seq}") }, &mut log)
            .await;
        driver
            .run(&second, |seq, r| async move { format!("{r} as {seq}") }, &mut log)
            .await;
        assert_eq!(
            read_log(&log),
            vec!["1. a as 1", "2. b as 2", "3. c as 3", "4. d as 4"]
        );
    }
}
