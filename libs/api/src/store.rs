use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::{CursorAdvance, Record, RecordId, RecordPatch, StoreError};

/// Boxed future returned by every store method.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

// ════════════════════════════════════════════════════════════════
//  Store traits
// ════════════════════════════════════════════════════════════════

/// Capability set the producer/consumer core needs from a persistent store.
///
/// Implementations: in-memory store, JSON-lines journal store, test fakes.
/// Reconnect and retry, if any, live inside the implementation; callers
/// surface errors as-is.
pub trait SequenceStore: Send + Sync {
    /// Prepare the backend (create directories, replay journals, ...).
    fn init(&self) -> StoreFuture<'_, ()>;

    /// Durable write of a new record.
    ///
    /// Not idempotent: an id that is already committed is rejected with
    /// `ErrorKind::Conflict`, never stored twice.
    fn insert(&self, record: Record) -> StoreFuture<'_, ()>;

    /// Replace-or-create keyed by `id`. The stored record always carries `id`.
    fn upsert(&self, id: RecordId, record: Record) -> StoreFuture<'_, ()>;

    /// Update the fields set in `patch`. `ErrorKind::NotFound` if absent.
    fn patch(&self, id: RecordId, patch: RecordPatch) -> StoreFuture<'_, ()>;

    /// Single record by id.
    fn get(&self, id: RecordId) -> StoreFuture<'_, Option<Record>>;

    /// Remove one record. Returns whether it existed.
    fn delete(&self, id: RecordId) -> StoreFuture<'_, bool>;

    /// Atomically add `delta` to the cursor of `group_id` and return the
    /// values before and after. An unknown group starts at 0 and is created
    /// by this call. Must be linearizable across all callers.
    fn increment(&self, group_id: u64, delta: u64) -> StoreFuture<'_, CursorAdvance>;

    /// Every record with `low <= id <= high`, in any order.
    fn range(&self, low: u64, high: u64) -> StoreFuture<'_, Vec<Record>>;

    /// Total live record count.
    fn count(&self) -> StoreFuture<'_, u64>;

    /// Remove all records.
    fn delete_all_records(&self) -> StoreFuture<'_, ()>;

    /// Remove all cursors.
    fn delete_all_cursors(&self) -> StoreFuture<'_, ()>;

    /// Push buffered writes to durable media.
    fn flush(&self) -> StoreFuture<'_, ()>;
}

/// Hands out store handles, one per worker.
///
/// Mirrors "one connection per worker": a network adapter would open a new
/// session here, the built-in adapters share one backing store.
pub trait StoreFactory: Send + Sync {
    fn connect(&self) -> StoreFuture<'_, Arc<dyn SequenceStore>>;
}
