use std::sync::Arc;
use std::time::Duration;

use stride_api::SequenceStore;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::EngineError;

/// Monotone counter the reporter watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sample {
    /// Number of stored records (producer progress).
    RecordCount,
    /// Cursor of a consumer group (consumer progress).
    Cursor { group_id: u64 },
}

/// One reporting interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Report {
    pub total: u64,
    /// Growth since the previous sample, clamped at zero.
    pub delta: u64,
}

/// Periodically samples a monotone counter and emits its growth.
pub struct ThroughputReporter {
    store: Arc<dyn SequenceStore>,
    sample: Sample,
    interval: Duration,
}

impl ThroughputReporter {
    pub fn new(store: Arc<dyn SequenceStore>, sample: Sample, interval: Duration) -> Self {
        Self { store, sample, interval }
    }

    pub async fn sample_once(&self) -> Result<u64, EngineError> {
        let value = match self.sample {
            Sample::RecordCount => self.store.count().await?,
            Sample::Cursor { group_id } => self.store.increment(group_id, 0).await?.new,
        };
        Ok(value)
    }

    /// Sample every `interval` until `token` is cancelled, calling `emit`
    /// once per tick. The first sample is the baseline and is not emitted.
    pub async fn run<F>(self, token: CancellationToken, mut emit: F) -> Result<(), EngineError>
    where
        F: FnMut(Report) + Send,
    {
        let mut previous = self.sample_once().await?;
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
            }
            let total = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                total = self.sample_once() => total?,
            };
            emit(Report {
                total,
                delta: total.saturating_sub(previous),
            });
            previous = total;
        }
        tracing::debug!(sample = ?self.sample, "reporter stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::testing::{FlakyStore, seed};

    fn collect() -> (Arc<Mutex<Vec<Report>>>, impl FnMut(Report) + Send) {
        let reports = Arc::new(Mutex::new(Vec::new()));
        let sink = reports.clone();
        (reports, move |r| sink.lock().unwrap().push(r))
    }

    #[tokio::test(start_paused = true)]
    async fn emits_growth_per_interval() {
        let store = FlakyStore::new();
        seed(&store, 0..5).await;
        let reporter = ThroughputReporter::new(
            Arc::new(store.clone()),
            Sample::RecordCount,
            Duration::from_secs(1),
        );
        let token = CancellationToken::new();
        let (reports, emit) = collect();
        let task = tokio::spawn(reporter.run(token.clone(), emit));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        seed(&store, 5..12).await;
        tokio::time::sleep(Duration::from_secs(1)).await;
        token.cancel();
        task.await.unwrap().unwrap();

        let reports = reports.lock().unwrap().clone();
        assert_eq!(
            reports,
            vec![Report { total: 5, delta: 0 }, Report { total: 12, delta: 7 }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn follows_group_cursor() {
        let store = FlakyStore::new();
        store.memory().increment(3, 9).await.unwrap();
        let reporter = ThroughputReporter::new(
            Arc::new(store.clone()),
            Sample::Cursor { group_id: 3 },
            Duration::from_millis(100),
        );
        assert_eq!(reporter.sample_once().await.unwrap(), 9);

        let token = CancellationToken::new();
        let (reports, emit) = collect();
        let task = tokio::spawn(reporter.run(token.clone(), emit));
        tokio::time::sleep(Duration::from_millis(50)).await;
        store.memory().increment(3, 4).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        token.cancel();
        task.await.unwrap().unwrap();

        assert_eq!(reports.lock().unwrap()[0], Report { total: 13, delta: 4 });
    }

    #[tokio::test(start_paused = true)]
    async fn sampling_error_ends_reporter() {
        let store = FlakyStore::new();
        let reporter = ThroughputReporter::new(
            Arc::new(store.clone()),
            Sample::RecordCount,
            Duration::from_secs(1),
        );
        let (reports, emit) = collect();
        let task = tokio::spawn(reporter.run(CancellationToken::new(), emit));
        tokio::time::sleep(Duration::from_millis(500)).await;
        store.set_down(true);

        let err = task.await.unwrap().unwrap_err();
        assert!(err.is_unavailable());
        assert!(reports.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn delta_never_negative() {
        let store = FlakyStore::new();
        seed(&store, 0..4).await;
        let reporter = ThroughputReporter::new(
            Arc::new(store.clone()),
            Sample::RecordCount,
            Duration::from_secs(1),
        );
        let token = CancellationToken::new();
        let (reports, emit) = collect();
        let task = tokio::spawn(reporter.run(token.clone(), emit));
        tokio::time::sleep(Duration::from_millis(10)).await;
        store.memory().delete_all_records().await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        token.cancel();
        task.await.unwrap().unwrap();

        assert_eq!(reports.lock().unwrap()[0], Report { total: 0, delta: 0 });
    }
}
