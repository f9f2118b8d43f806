use stride_api::{Record, RecordPatch};
use stride_engine::records;

use crate::config::Effective;
use crate::error::BenchError;

pub async fn get(eff: &Effective, id: &str) -> Result<(), BenchError> {
    // Reject a malformed id before the store is even opened.
    records::parse_id(id)?;
    let factory = super::open_store(eff).await?;
    let store = factory.connect().await?;

    let record = records::get_record(store.as_ref(), id)
        .await?
        .ok_or_else(|| BenchError::NotFound(id.to_string()))?;
    let json = serde_json::to_string_pretty(&record)?;
    println!("{json}");
    Ok(())
}

pub async fn delete(eff: &Effective, id: &str) -> Result<(), BenchError> {
    records::parse_id(id)?;
    let factory = super::open_store(eff).await?;
    let store = factory.connect().await?;

    if !records::delete_record(store.as_ref(), id).await? {
        return Err(BenchError::NotFound(id.to_string()));
    }
    store.flush().await?;
    println!("deleted {id}");
    Ok(())
}

/// Replace record `id` with the JSON body; the body's own `id` is ignored.
pub async fn put(eff: &Effective, id: &str, json: &str) -> Result<(), BenchError> {
    records::parse_id(id)?;
    let record: Record = serde_json::from_str(json)?;
    let factory = super::open_store(eff).await?;
    let store = factory.connect().await?;

    records::upsert_record(store.as_ref(), id, record).await?;
    store.flush().await?;
    println!("stored {id}");
    Ok(())
}

pub async fn patch(eff: &Effective, id: &str, json: &str) -> Result<(), BenchError> {
    records::parse_id(id)?;
    let patch: RecordPatch = serde_json::from_str(json)?;
    let factory = super::open_store(eff).await?;
    let store = factory.connect().await?;

    match records::patch_record(store.as_ref(), id, patch).await {
        Err(stride_engine::EngineError::Store(e)) if e.kind() == stride_api::ErrorKind::NotFound => {
            return Err(BenchError::NotFound(id.to_string()));
        }
        res => res?,
    }
    store.flush().await?;
    println!("patched {id}");
    Ok(())
}
