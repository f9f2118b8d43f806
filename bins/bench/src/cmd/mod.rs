pub mod consume;
pub mod produce;
pub mod record;
pub mod run;
pub mod status;

use stride_api::StoreFactory;
use stride_engine::{Report, RunSummary, Supervisor, ThroughputReporter};
use stride_storage_file::{FileStoreConfig, FileStoreFactory};
use stride_storage_memory::MemoryStoreFactory;

use crate::config::{Effective, StoreKind};
use crate::error::BenchError;

/// Open the configured backend. Every worker then calls `connect` on it.
pub async fn open_store(eff: &Effective) -> Result<Box<dyn StoreFactory>, BenchError> {
    match eff.store.kind {
        StoreKind::Memory => {
            tracing::info!("using in-memory store");
            Ok(Box::new(MemoryStoreFactory::new()))
        }
        StoreKind::File => {
            let data_dir = eff
                .store
                .endpoint
                .clone()
                .ok_or_else(|| BenchError::config("store", "file store needs an endpoint"))?;
            let config = FileStoreConfig {
                data_dir,
                database: eff.store.database.clone(),
                ensure_disk_write: eff.store.ensure_disk_write,
            };
            Ok(Box::new(FileStoreFactory::open(config).await?))
        }
    }
}

/// Run the supervised workers with the reporter printing one delta per
/// interval to stdout. Ctrl+C cancels the workers; a reporter failure
/// cancels them too and is returned after they stop.
pub async fn drive(supervisor: Supervisor, reporter: ThroughputReporter) -> Result<RunSummary, BenchError> {
    let token = supervisor.token().clone();

    let report_token = token.child_token();
    let reporter_token = report_token.clone();
    let workers_token = token.clone();
    let report_handle = tokio::spawn(async move {
        let res = reporter
            .run(reporter_token, |r: Report| println!("{}", r.delta))
            .await;
        if res.is_err() {
            workers_token.cancel();
        }
        res
    });

    let signal_token = token.clone();
    let signal_handle = tokio::spawn(async move {
        tokio::select! {
            res = tokio::signal::ctrl_c() => match res {
                Ok(()) => {
                    tracing::info!("interrupted, stopping workers");
                    signal_token.cancel();
                }
                Err(e) => tracing::warn!(error = %e, "cannot listen for ctrl-c"),
            },
            _ = signal_token.cancelled() => {}
        }
    });

    let summary = supervisor.wait().await;

    // Workers are done; stop the helpers without cancelling the parent.
    signal_handle.abort();
    report_token.cancel();
    report_handle.await??;

    tracing::info!(
        processed = summary.processed,
        exhausted = summary.exhausted,
        end_of_stream = summary.end_of_stream,
        cancelled = summary.cancelled,
        failed = summary.failed,
        "workers finished"
    );
    Ok(summary)
}

/// Turn failed workers into a process error.
pub fn ensure_success(summary: &RunSummary) -> Result<(), BenchError> {
    if summary.is_success() {
        return Ok(());
    }
    for (role, index, e) in &summary.errors {
        tracing::error!(%role, worker = index, error = %e, "worker error");
    }
    Err(BenchError::WorkersFailed { failed: summary.failed })
}
