//! Keyed record operations addressed by textual id.
//!
//! Every function parses the id first; a malformed id is reported as
//! `InvalidIdentifier` and the store is never called.

use stride_api::{Record, RecordId, RecordPatch, SequenceStore};

use crate::EngineError;

pub fn parse_id(id: &str) -> Result<RecordId, EngineError> {
    Ok(id.parse::<RecordId>()?)
}

pub async fn get_record(store: &dyn SequenceStore, id: &str) -> Result<Option<Record>, EngineError> {
    let id = parse_id(id)?;
    Ok(store.get(id).await?)
}

/// Returns whether a record was removed.
pub async fn delete_record(store: &dyn SequenceStore, id: &str) -> Result<bool, EngineError> {
    let id = parse_id(id)?;
    Ok(store.delete(id).await?)
}

pub async fn patch_record(
    store: &dyn SequenceStore,
    id: &str,
    patch: RecordPatch,
) -> Result<(), EngineError> {
    let id = parse_id(id)?;
    Ok(store.patch(id, patch).await?)
}

pub async fn upsert_record(
    store: &dyn SequenceStore,
    id: &str,
    record: Record,
) -> Result<(), EngineError> {
    let id = parse_id(id)?;
    Ok(store.upsert(id, record).await?)
}
