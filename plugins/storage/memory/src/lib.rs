use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use stride_api::{
    CursorAdvance, Record, RecordId, RecordPatch, SequenceStore, StoreError, StoreFactory,
    StoreFuture,
};

// ═══════════════════════════════════════════════════════════════
//  MemoryStore
// ═══════════════════════════════════════════════════════════════

#[derive(Default)]
struct Inner {
    records: RwLock<BTreeMap<u64, Record>>,
    cursors: Mutex<HashMap<u64, u64>>,
}

/// In-process store. Clones share the same records and cursors, so every
/// worker handle talks to one "server".
///
/// Cursor increments run under a single mutex, which makes them
/// linearizable for all handles of this store.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SequenceStore for MemoryStore {
    fn init(&self) -> StoreFuture<'_, ()> {
        Box::pin(async { Ok(()) })
    }

    fn insert(&self, record: Record) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let mut records = self.inner.records.write().await;
            if records.contains_key(&record.id) {
                return Err(StoreError::conflict(format!("duplicate record id {}", record.id)));
            }
            records.insert(record.id, record);
            Ok(())
        })
    }

    fn upsert(&self, id: RecordId, mut record: Record) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            record.id = id.get();
            self.inner.records.write().await.insert(id.get(), record);
            Ok(())
        })
    }

    fn patch(&self, id: RecordId, patch: RecordPatch) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let mut records = self.inner.records.write().await;
            match records.get_mut(&id.get()) {
                Some(record) => {
                    record.apply(&patch);
                    Ok(())
                }
                None => Err(StoreError::not_found(format!("record {id} not found"))),
            }
        })
    }

    fn get(&self, id: RecordId) -> StoreFuture<'_, Option<Record>> {
        Box::pin(async move { Ok(self.inner.records.read().await.get(&id.get()).cloned()) })
    }

    fn delete(&self, id: RecordId) -> StoreFuture<'_, bool> {
        Box::pin(async move { Ok(self.inner.records.write().await.remove(&id.get()).is_some()) })
    }

    fn increment(&self, group_id: u64, delta: u64) -> StoreFuture<'_, CursorAdvance> {
        Box::pin(async move {
            let mut cursors = self.inner.cursors.lock().await;
            let value = cursors.entry(group_id).or_insert(0);
            let old = *value;
            let new = old.checked_add(delta).ok_or_else(|| {
                StoreError::conflict(format!("cursor of group {group_id} overflows at {old}+{delta}"))
            })?;
            *value = new;
            Ok(CursorAdvance { old, new })
        })
    }

    fn range(&self, low: u64, high: u64) -> StoreFuture<'_, Vec<Record>> {
        Box::pin(async move {
            if low > high {
                return Ok(Vec::new());
            }
            let records = self.inner.records.read().await;
            Ok(records.range(low..=high).map(|(_, r)| r.clone()).collect())
        })
    }

    fn count(&self) -> StoreFuture<'_, u64> {
        Box::pin(async move { Ok(self.inner.records.read().await.len() as u64) })
    }

    fn delete_all_records(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            self.inner.records.write().await.clear();
            Ok(())
        })
    }

    fn delete_all_cursors(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            self.inner.cursors.lock().await.clear();
            Ok(())
        })
    }

    fn flush(&self) -> StoreFuture<'_, ()> {
        Box::pin(async { Ok(()) })
    }
}

// ═══════════════════════════════════════════════════════════════
//  MemoryStoreFactory
// ═══════════════════════════════════════════════════════════════

/// Every `connect` returns a handle onto the same `MemoryStore`.
#[derive(Clone, Default)]
pub struct MemoryStoreFactory {
    store: MemoryStore,
}

impl MemoryStoreFactory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StoreFactory for MemoryStoreFactory {
    fn connect(&self) -> StoreFuture<'_, Arc<dyn SequenceStore>> {
        let store = self.store.clone();
        Box::pin(async move { Ok(Arc::new(store) as Arc<dyn SequenceStore>) })
    }
}
