//! Store fakes for engine tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use stride_api::{
    CursorAdvance, Record, RecordId, RecordPatch, SequenceStore, StoreError, StoreFuture,
};
use stride_storage_memory::MemoryStore;

#[derive(Default)]
struct Switches {
    down: AtomicBool,
    widen_range: AtomicBool,
    calls: AtomicUsize,
}

/// `MemoryStore` that can be switched off (every call fails with
/// `Unavailable`) or made to over-answer range scans.
#[derive(Clone, Default)]
pub(crate) struct FlakyStore {
    inner: MemoryStore,
    switches: Arc<Switches>,
}

impl FlakyStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn memory(&self) -> &MemoryStore {
        &self.inner
    }

    pub(crate) fn set_down(&self, down: bool) {
        self.switches.down.store(down, Ordering::SeqCst);
    }

    /// Range scans return one extra id on each side.
    pub(crate) fn set_widen_range(&self, widen: bool) {
        self.switches.widen_range.store(widen, Ordering::SeqCst);
    }

    pub(crate) fn calls(&self) -> usize {
        self.switches.calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), StoreError> {
        self.switches.calls.fetch_add(1, Ordering::SeqCst);
        if self.switches.down.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable("no reachable servers"));
        }
        Ok(())
    }
}

impl SequenceStore for FlakyStore {
    fn init(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            self.check()?;
            self.inner.init().await
        })
    }

    fn insert(&self, record: Record) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            self.check()?;
            self.inner.insert(record).await
        })
    }

    fn upsert(&self, id: RecordId, record: Record) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            self.check()?;
            self.inner.upsert(id, record).await
        })
    }

    fn patch(&self, id: RecordId, patch: RecordPatch) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            self.check()?;
            self.inner.patch(id, patch).await
        })
    }

    fn get(&self, id: RecordId) -> StoreFuture<'_, Option<Record>> {
        Box::pin(async move {
            self.check()?;
            self.inner.get(id).await
        })
    }

    fn delete(&self, id: RecordId) -> StoreFuture<'_, bool> {
        Box::pin(async move {
            self.check()?;
            self.inner.delete(id).await
        })
    }

    fn increment(&self, group_id: u64, delta: u64) -> StoreFuture<'_, CursorAdvance> {
        Box::pin(async move {
            self.check()?;
            self.inner.increment(group_id, delta).await
        })
    }

    fn range(&self, low: u64, high: u64) -> StoreFuture<'_, Vec<Record>> {
        Box::pin(async move {
            self.check()?;
            if self.switches.widen_range.load(Ordering::SeqCst) {
                return self.inner.range(low.saturating_sub(1), high.saturating_add(1)).await;
            }
            self.inner.range(low, high).await
        })
    }

    fn count(&self) -> StoreFuture<'_, u64> {
        Box::pin(async move {
            self.check()?;
            self.inner.count().await
        })
    }

    fn delete_all_records(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            self.check()?;
            self.inner.delete_all_records().await
        })
    }

    fn delete_all_cursors(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            self.check()?;
            self.inner.delete_all_cursors().await
        })
    }

    fn flush(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            self.check()?;
            self.inner.flush().await
        })
    }
}

/// Insert records with the given ids straight into `store`.
pub(crate) async fn seed(store: &dyn SequenceStore, ids: impl IntoIterator<Item = u64>) {
    for id in ids {
        store.insert(Record::new(id)).await.unwrap();
    }
}
