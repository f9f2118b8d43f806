use tokio_util::sync::CancellationToken;

use crate::config::Effective;
use crate::error::BenchError;

/// Produce, then consume, sharing one store. Stops after the producer phase
/// if it was interrupted or failed.
pub async fn run(eff: &Effective) -> Result<(), BenchError> {
    let factory = super::open_store(eff).await?;
    let token = CancellationToken::new();

    let produced = super::produce::produce(eff, factory.as_ref(), token.clone()).await?;
    super::ensure_success(&produced)?;
    if token.is_cancelled() {
        tracing::info!("interrupted during produce, skipping consume");
        return Ok(());
    }

    let consumed = super::consume::consume(eff, factory.as_ref(), token).await?;
    super::ensure_success(&consumed)?;
    println!("produced {} records, consumed {}", produced.processed, consumed.processed);
    Ok(())
}
