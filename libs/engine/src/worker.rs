use std::sync::Arc;

use serde::Deserialize;
use stride_api::{Record, SequenceStore};
use tokio_util::sync::CancellationToken;

use crate::{
    BatchFetcher, CursorCoordinator, EmptyBatchPolicy, EngineError, IdAllocator, Interval,
    RecordHandler,
};

// ═══════════════════════════════════════════════════════════════
//  Outcomes
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Producer,
    Consumer,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Producer => f.write_str("producer"),
            Role::Consumer => f.write_str("consumer"),
        }
    }
}

/// Normal ways for a worker loop to end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// Producer passed its ceiling.
    Exhausted,
    /// Consumer saw an empty batch and the policy gave up.
    EndOfStream,
    /// The cancellation token fired.
    Cancelled,
}

/// What a finished worker sends back to the supervisor.
#[derive(Debug)]
pub struct WorkerReport {
    pub role: Role,
    pub index: u64,
    /// Records inserted (producer) or handled (consumer).
    pub processed: u64,
    pub outcome: Result<WorkerExit, EngineError>,
}

// ═══════════════════════════════════════════════════════════════
//  Producer
// ═══════════════════════════════════════════════════════════════

fn default_file_name() -> String {
    "/data/tztf/sdfsdf/sdfsdf".into()
}

fn default_buffer_address() -> String {
    "126.567.344.346:45600".into()
}

fn default_reserved() -> String {
    "fdgfdgdfgsdfgsdgsdkfjgbdsibgiub".into()
}

/// Payload stamped on every produced record.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RecordTemplate {
    #[serde(default = "default_file_name")]
    pub file_name: String,
    #[serde(default = "default_buffer_address")]
    pub buffer_address: String,
    /// Value of the first reserved slot.
    #[serde(default = "default_reserved")]
    pub reserved: String,
}

impl Default for RecordTemplate {
    fn default() -> Self {
        Self {
            file_name: default_file_name(),
            buffer_address: default_buffer_address(),
            reserved: default_reserved(),
        }
    }
}

impl RecordTemplate {
    /// Record `id` with the template payload; `segment_id` mirrors the id,
    /// so ids above `i64::MAX` are rejected.
    pub fn build(&self, id: u64) -> Result<Record, EngineError> {
        let segment_id = i64::try_from(id)
            .map_err(|_| EngineError::Config(format!("id {id} does not fit a segment id")))?;
        let mut record = Record::new(id);
        record.file_name = self.file_name.clone();
        record.buffer_address = self.buffer_address.clone();
        record.segment_id = segment_id;
        record.reserved[0] = self.reserved.clone();
        Ok(record)
    }
}

/// Inserts the IDs of one stride class until the ceiling.
pub struct ProducerWorker {
    index: u64,
    allocator: IdAllocator,
    store: Arc<dyn SequenceStore>,
    template: RecordTemplate,
}

impl ProducerWorker {
    pub fn new(
        index: u64,
        allocator: IdAllocator,
        store: Arc<dyn SequenceStore>,
        template: RecordTemplate,
    ) -> Self {
        Self { index, allocator, store, template }
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub async fn run(mut self, token: CancellationToken) -> WorkerReport {
        let mut processed = 0;
        let outcome = self.produce(&token, &mut processed).await;
        match &outcome {
            Ok(exit) => tracing::info!(worker = self.index, processed, exit = ?exit, "producer finished"),
            Err(e) => tracing::error!(worker = self.index, processed, error = %e, "producer failed"),
        }
        WorkerReport {
            role: Role::Producer,
            index: self.index,
            processed,
            outcome,
        }
    }

    async fn produce(
        &mut self,
        token: &CancellationToken,
        processed: &mut u64,
    ) -> Result<WorkerExit, EngineError> {
        while let Some(id) = self.allocator.next_id() {
            let record = self.template.build(id)?;
            tokio::select! {
                biased;
                _ = token.cancelled() => return Ok(WorkerExit::Cancelled),
                res = self.store.insert(record) => res?,
            }
            *processed += 1;
        }
        Ok(WorkerExit::Exhausted)
    }
}

// ═══════════════════════════════════════════════════════════════
//  Consumer
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsumerConfig {
    pub group_id: u64,
    /// IDs claimed per cursor advance.
    pub batch_size: u64,
    pub empty_batch: EmptyBatchPolicy,
}

/// Claims intervals of a group and feeds their records to a handler.
pub struct ConsumerWorker {
    index: u64,
    config: ConsumerConfig,
    coordinator: CursorCoordinator,
    fetcher: BatchFetcher,
    handler: Arc<dyn RecordHandler>,
}

impl ConsumerWorker {
    pub fn new(
        index: u64,
        config: ConsumerConfig,
        store: Arc<dyn SequenceStore>,
        handler: Arc<dyn RecordHandler>,
    ) -> Result<Self, EngineError> {
        if config.batch_size == 0 {
            return Err(EngineError::Config("batch size must be at least 1".into()));
        }
        Ok(Self {
            index,
            config,
            coordinator: CursorCoordinator::new(store.clone()),
            fetcher: BatchFetcher::new(store),
            handler,
        })
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub async fn run(self, token: CancellationToken) -> WorkerReport {
        let mut processed = 0;
        let outcome = self.consume(&token, &mut processed).await;
        match &outcome {
            Ok(exit) => tracing::info!(worker = self.index, processed, exit = ?exit, "consumer finished"),
            Err(e) => tracing::error!(worker = self.index, processed, error = %e, "consumer failed"),
        }
        WorkerReport {
            role: Role::Consumer,
            index: self.index,
            processed,
            outcome,
        }
    }

    async fn consume(
        &self,
        token: &CancellationToken,
        processed: &mut u64,
    ) -> Result<WorkerExit, EngineError> {
        let group_id = self.config.group_id;
        loop {
            let interval = tokio::select! {
                biased;
                _ = token.cancelled() => return Ok(WorkerExit::Cancelled),
                res = self.coordinator.advance(group_id, self.config.batch_size) => res?,
            };
            let batch = match self.fetch_with_policy(interval, token).await? {
                Some(batch) => batch,
                None if token.is_cancelled() => return Ok(WorkerExit::Cancelled),
                None => {
                    tracing::debug!(worker = self.index, group_id, %interval, "empty batch, end of stream");
                    return Ok(WorkerExit::EndOfStream);
                }
            };
            for record in &batch {
                self.handler.handle(record)?;
                *processed += 1;
            }
        }
    }

    /// `None` when the interval stayed empty (or the token fired while
    /// waiting for it to fill).
    async fn fetch_with_policy(
        &self,
        interval: Interval,
        token: &CancellationToken,
    ) -> Result<Option<Vec<Record>>, EngineError> {
        let mut attempt = 0;
        loop {
            let batch = tokio::select! {
                biased;
                _ = token.cancelled() => return Ok(None),
                res = self.fetcher.fetch(interval) => res?,
            };
            if !batch.is_empty() {
                return Ok(Some(batch));
            }
            let Some(backoff) = self.config.empty_batch.backoff(attempt) else {
                return Ok(None);
            };
            attempt += 1;
            tracing::trace!(worker = self.index, %interval, attempt, "empty batch, retrying");
            tokio::select! {
                biased;
                _ = token.cancelled() => return Ok(None),
                _ = tokio::time::sleep(backoff) => {}
            }
        }
    }
}
