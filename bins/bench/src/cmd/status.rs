use stride_engine::CursorCoordinator;

use crate::config::Effective;
use crate::error::BenchError;

pub async fn run(eff: &Effective) -> Result<(), BenchError> {
    let factory = super::open_store(eff).await?;
    let store = factory.connect().await?;

    let records = store.count().await?;
    let group_id = eff.consumer.group_id;
    let cursor = CursorCoordinator::new(store).read(group_id).await?;

    println!("records: {records}");
    println!("cursor (group {group_id}): {cursor}");
    Ok(())
}
