//! Sequential batches of concurrent work.

use serde::Serialize;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub batch_sizes: Vec<usize>,
    pub succeeded: usize,
    pub failed: usize,
    /// A stop was requested before every batch had been started.
    pub stopped_early: bool,
}

impl BatchReport {
    pub fn attempted(&self) -> usize {
        self.succeeded + self.failed
    }
}

/// Run `work` over `items` in groups of `size`. Every item of a group is
/// spawned at once and the whole group is awaited before the pause that
/// precedes the next one. Cancellation is honoured between groups only.
pub async fn run_in_batches<T, F, Fut, E>(
    items: Vec<T>,
    size: usize,
    pause: Duration,
    cancel: &CancellationToken,
    work: F,
) -> BatchReport
where
    T: Send + 'static,
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: Display + Send + 'static,
{
    let size = size.max(1);
    let total = items.len();
    let mut report = BatchReport::default();
    let mut pending = items.into_iter().peekable();
    let mut batch = 0usize;

    while pending.peek().is_some() {
        if batch > 0 {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(pause) => {}
            }
        }
        if cancel.is_cancelled() {
            tracing::info!(batch, remaining = pending.by_ref().count(), "stop requested, skipping remaining batches");
            report.stopped_early = true;
            break;
        }
        batch += 1;

        let handles: Vec<_> = pending.by_ref().take(size).map(|item| tokio::spawn(work(item))).collect();
        report.batch_sizes.push(handles.len());
        tracing::debug!(batch, size = handles.len(), total, "batch started");

        for joined in futures::future::join_all(handles).await {
            match joined {
                Ok(Ok(())) => report.succeeded += 1,
                Ok(Err(e)) => {
                    tracing::warn!(batch, error = %e, "item failed");
                    report.failed += 1;
                }
                Err(e) => {
                    tracing::error!(batch, error = %e, "item task aborted");
                    report.failed += 1;
                }
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn seven_items_three_wide() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let starts = Arc::new(Mutex::new(Vec::new()));
        let origin = Instant::now();

        let report = run_in_batches((0..7).collect(), 3, Duration::from_secs(2), &CancellationToken::new(), |_: i32| {
            let (in_flight, peak, starts) = (in_flight.clone(), peak.clone(), starts.clone());
            async move {
                starts.lock().unwrap().push(origin.elapsed());
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(500)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok::<(), String>(())
            }
        })
        .await;

        assert_eq!(report.batch_sizes, vec![3, 3, 1]);
        assert_eq!(report.succeeded, 7);
        assert!(!report.stopped_early);
        assert_eq!(peak.load(Ordering::SeqCst), 3);

        let starts = starts.lock().unwrap();
        let last = *starts.iter().max().unwrap();
        // two batches of 500ms plus two 2s pauses precede the last batch
        assert!(last >= Duration::from_millis(5_000), "last batch started at {:?}", last);
    }

    #[tokio::test]
    async fn failures_are_isolated() {
        let report = run_in_batches((0..5).collect(), 2, Duration::ZERO, &CancellationToken::new(), |n: i32| async move {
            if n % 2 == 0 {
                Err(format!("item {} failed", n))
            } else {
                Ok(())
            }
        })
        .await;
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed, 3);
        assert_eq!(report.attempted(), 5);
    }

    #[tokio::test]
    async fn panics_count_as_failures() {
        let report = run_in_batches(vec![1, 2], 2, Duration::ZERO, &CancellationToken::new(), |n: i32| async move {
            if n == 1 {
                panic!("boom");
            }
            Ok::<(), String>(())
        })
        .await;
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_between_batches() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let report = run_in_batches((0..9).collect(), 3, Duration::from_secs(2), &cancel, move |n: i32| {
            let trigger = trigger.clone();
            async move {
                if n == 0 {
                    trigger.cancel();
                }
                Ok::<(), String>(())
            }
        })
        .await;
        assert_eq!(report.batch_sizes, vec![3]);
        assert_eq!(report.succeeded, 3);
        assert!(report.stopped_early);
    }

    #[tokio::test]
    async fn empty_input() {
        let report = run_in_batches(Vec::<i32>::new(), 3, Duration::from_secs(2), &CancellationToken::new(), |_| async {
            Ok::<(), String>(())
        })
        .await;
        assert_eq!(report, BatchReport::default());
    }
}
