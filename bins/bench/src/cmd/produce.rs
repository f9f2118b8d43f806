use stride_api::StoreFactory;
use stride_engine::{IdAllocator, ProducerWorker, RunSummary, Sample, Supervisor, ThroughputReporter};
use tokio_util::sync::CancellationToken;

use crate::config::Effective;
use crate::error::BenchError;

pub async fn run(eff: &Effective) -> Result<(), BenchError> {
    let factory = super::open_store(eff).await?;
    let summary = produce(eff, factory.as_ref(), CancellationToken::new()).await?;
    super::ensure_success(&summary)
}

pub async fn produce(
    eff: &Effective,
    factory: &dyn StoreFactory,
    token: CancellationToken,
) -> Result<RunSummary, BenchError> {
    let admin = factory.connect().await?;
    if eff.reset {
        admin.delete_all_records().await?;
        tracing::info!("records cleared");
    }

    println!(
        "Running with {} workers, ensure write to disk: {}",
        eff.workers, eff.store.ensure_disk_write
    );

    let mut supervisor = Supervisor::new(token, eff.abort_on_error);
    for k in 0..eff.workers {
        let allocator = IdAllocator::new(k, eff.workers, eff.ceiling)?;
        let store = factory.connect().await?;
        supervisor.spawn_producer(ProducerWorker::new(k, allocator, store, eff.template.clone()));
    }
    tracing::info!(workers = eff.workers, ceiling = eff.ceiling, "producers started");

    let reporter = ThroughputReporter::new(admin.clone(), Sample::RecordCount, eff.report_interval);
    let summary = super::drive(supervisor, reporter).await?;
    admin.flush().await?;
    Ok(summary)
}
