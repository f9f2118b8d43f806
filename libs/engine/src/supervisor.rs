use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{ConsumerWorker, EngineError, ProducerWorker, Role, WorkerExit, WorkerReport};

/// Aggregated outcome of every worker a [`Supervisor`] ran.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub exhausted: usize,
    pub end_of_stream: usize,
    pub cancelled: usize,
    pub failed: usize,
    /// Sum of per-worker `processed`.
    pub processed: u64,
    pub errors: Vec<(Role, u64, EngineError)>,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    fn record(&mut self, report: WorkerReport) {
        self.processed += report.processed;
        match report.outcome {
            Ok(WorkerExit::Exhausted) => self.exhausted += 1,
            Ok(WorkerExit::EndOfStream) => self.end_of_stream += 1,
            Ok(WorkerExit::Cancelled) => self.cancelled += 1,
            Err(e) => {
                self.failed += 1;
                self.errors.push((report.role, report.index, e));
            }
        }
    }
}

/// Runs workers as tokio tasks and collects their reports over a channel.
///
/// All workers share one cancellation token. With `abort_on_error` the
/// first failed worker cancels its siblings; otherwise failures stay local.
pub struct Supervisor {
    token: CancellationToken,
    tx: mpsc::UnboundedSender<WorkerReport>,
    rx: mpsc::UnboundedReceiver<WorkerReport>,
    handles: Vec<JoinHandle<()>>,
    abort_on_error: bool,
}

impl Supervisor {
    pub fn new(token: CancellationToken, abort_on_error: bool) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            token,
            tx,
            rx,
            handles: Vec::new(),
            abort_on_error,
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn spawn_producer(&mut self, worker: ProducerWorker) {
        let token = self.token.clone();
        let tx = self.tx.clone();
        tracing::debug!(worker = worker.index(), "spawning producer");
        self.handles.push(tokio::spawn(async move {
            let _ = tx.send(worker.run(token).await);
        }));
    }

    pub fn spawn_consumer(&mut self, worker: ConsumerWorker) {
        let token = self.token.clone();
        let tx = self.tx.clone();
        tracing::debug!(worker = worker.index(), "spawning consumer");
        self.handles.push(tokio::spawn(async move {
            let _ = tx.send(worker.run(token).await);
        }));
    }

    /// Wait until every spawned worker has reported.
    pub async fn wait(self) -> RunSummary {
        let Supervisor { token, tx, mut rx, handles, abort_on_error } = self;
        drop(tx);

        let mut summary = RunSummary::default();
        while let Some(report) = rx.recv().await {
            if report.outcome.is_err() && abort_on_error && !token.is_cancelled() {
                tracing::warn!(role = %report.role, worker = report.index, "worker failed, cancelling siblings");
                token.cancel();
            }
            summary.record(report);
        }

        for h in handles {
            if let Err(e) = h.await {
                tracing::error!(error = %e, "worker task panicked");
                summary.failed += 1;
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use stride_api::SequenceStore;

    use super::*;
    use crate::testing::{FlakyStore, seed};
    use crate::{ConsumerConfig, CountingHandler, EmptyBatchPolicy, IdAllocator, RecordTemplate};

    fn producer(k: u64, n: u64, ceiling: u64, store: &Arc<dyn SequenceStore>) -> ProducerWorker {
        ProducerWorker::new(
            k,
            IdAllocator::new(k, n, ceiling).unwrap(),
            store.clone(),
            RecordTemplate::default(),
        )
    }

    fn consumer(
        k: u64,
        batch_size: u64,
        empty_batch: EmptyBatchPolicy,
        store: &Arc<dyn SequenceStore>,
        handler: &CountingHandler,
    ) -> ConsumerWorker {
        let config = ConsumerConfig { group_id: 7, batch_size, empty_batch };
        ConsumerWorker::new(k, config, store.clone(), Arc::new(handler.clone())).unwrap()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn producers_then_consumers_see_every_record_once() {
        let store: Arc<dyn SequenceStore> = Arc::new(FlakyStore::new());

        let mut sup = Supervisor::new(CancellationToken::new(), false);
        for k in 0..4 {
            sup.spawn_producer(producer(k, 4, 999, &store));
        }
        let produced = sup.wait().await;
        assert!(produced.is_success());
        assert_eq!(produced.exhausted, 4);
        assert_eq!(produced.processed, 1000);

        let handler = CountingHandler::new();
        let mut sup = Supervisor::new(CancellationToken::new(), false);
        for k in 0..5 {
            sup.spawn_consumer(consumer(k, 7, EmptyBatchPolicy::Stop, &store, &handler));
        }
        let consumed = sup.wait().await;
        assert!(consumed.is_success());
        assert_eq!(consumed.end_of_stream, 5);
        assert_eq!(consumed.processed, 1000);
        assert_eq!(handler.count(), 1000);
    }

    #[tokio::test]
    async fn failure_stays_local_by_default() {
        let store = FlakyStore::new();
        seed(&store, [3]).await;
        let shared: Arc<dyn SequenceStore> = Arc::new(store);

        let mut sup = Supervisor::new(CancellationToken::new(), false);
        sup.spawn_producer(producer(0, 3, 9, &shared));
        sup.spawn_producer(producer(1, 3, 9, &shared));
        let summary = sup.wait().await;

        assert!(!summary.is_success());
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.exhausted, 1);
        let (role, index, err) = &summary.errors[0];
        assert_eq!((*role, *index), (Role::Producer, 0));
        assert!(matches!(err, EngineError::Store(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn abort_on_error_cancels_siblings() {
        let store = FlakyStore::new();
        seed(&store, [0]).await;
        let shared: Arc<dyn SequenceStore> = Arc::new(store);
        let handler = CountingHandler::new();

        let mut sup = Supervisor::new(CancellationToken::new(), true);
        // Waits on an interval nobody will ever fill.
        sup.spawn_consumer(consumer(
            0,
            1_000,
            EmptyBatchPolicy::Retry { attempts: u32::MAX, backoff_ms: 1_000 },
            &shared,
            &handler,
        ));
        // Conflicts on id 0 straight away.
        sup.spawn_producer(producer(0, 1, 5, &shared));
        let summary = sup.wait().await;

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.cancelled, 1);
    }

    #[tokio::test]
    async fn external_cancel_stops_everything() {
        let store: Arc<dyn SequenceStore> = Arc::new(FlakyStore::new());
        let token = CancellationToken::new();
        token.cancel();

        let mut sup = Supervisor::new(token, false);
        sup.spawn_producer(producer(0, 2, 1_000_000, &store));
        sup.spawn_producer(producer(1, 2, 1_000_000, &store));
        let summary = sup.wait().await;

        assert!(summary.is_success());
        assert_eq!(summary.cancelled, 2);
    }
}
