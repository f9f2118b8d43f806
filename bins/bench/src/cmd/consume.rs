use std::sync::Arc;

use stride_api::StoreFactory;
use stride_engine::{
    ConsumerWorker, CountingHandler, CursorCoordinator, RunSummary, Sample, Supervisor,
    ThroughputReporter,
};
use tokio_util::sync::CancellationToken;

use crate::config::Effective;
use crate::error::BenchError;

pub async fn run(eff: &Effective) -> Result<(), BenchError> {
    let factory = super::open_store(eff).await?;
    let summary = consume(eff, factory.as_ref(), CancellationToken::new()).await?;
    super::ensure_success(&summary)
}

pub async fn consume(
    eff: &Effective,
    factory: &dyn StoreFactory,
    token: CancellationToken,
) -> Result<RunSummary, BenchError> {
    let admin = factory.connect().await?;
    let total = admin.count().await?;
    let group_id = eff.consumer.group_id;

    println!(
        "Running consumer with {} workers, single read: {} records, total {} records",
        eff.workers, eff.consumer.batch_size, total
    );

    if eff.reset {
        admin.delete_all_cursors().await?;
        tracing::info!("cursors cleared");
    }
    let start = CursorCoordinator::new(admin.clone()).read(group_id).await?;
    tracing::info!(group_id, start, "group cursor ready");

    let handler = CountingHandler::new();
    let mut supervisor = Supervisor::new(token, eff.abort_on_error);
    for k in 0..eff.workers {
        let store = factory.connect().await?;
        let worker = ConsumerWorker::new(k, eff.consumer, store, Arc::new(handler.clone()))?;
        supervisor.spawn_consumer(worker);
    }
    tracing::info!(workers = eff.workers, group_id, batch_size = eff.consumer.batch_size, "consumers started");

    let reporter = ThroughputReporter::new(admin, Sample::Cursor { group_id }, eff.report_interval);
    let summary = super::drive(supervisor, reporter).await?;
    tracing::info!(handled = handler.count(), "records handled");
    Ok(summary)
}
