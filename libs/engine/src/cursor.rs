use std::sync::Arc;

use stride_api::SequenceStore;

use crate::EngineError;

/// Half-open ID range `[start, end)` owned by one consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Interval {
    pub start: u64,
    pub end: u64,
}

impl Interval {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end: end.max(start) }
    }

    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, id: u64) -> bool {
        self.start <= id && id < self.end
    }

    /// Inclusive upper bound, `None` for an empty interval.
    pub fn last(&self) -> Option<u64> {
        (!self.is_empty()).then(|| self.end - 1)
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Hands out exclusive slices of the ID space to consumers of a group.
///
/// The only shared state is the store's per-group cursor; every grant is
/// one atomic increment, so concurrent callers (in any process) never
/// receive overlapping intervals. Errors are surfaced as-is, never retried:
/// a failed `advance` grants nothing.
#[derive(Clone)]
pub struct CursorCoordinator {
    store: Arc<dyn SequenceStore>,
}

impl CursorCoordinator {
    pub fn new(store: Arc<dyn SequenceStore>) -> Self {
        Self { store }
    }

    /// Claim the next `delta` IDs of `group_id`.
    ///
    /// Returns `[old, old + delta)`. A group seen for the first time starts
    /// at 0. `delta == 0` claims nothing and only observes the cursor.
    pub async fn advance(&self, group_id: u64, delta: u64) -> Result<Interval, EngineError> {
        let advance = self.store.increment(group_id, delta).await?;
        tracing::trace!(group_id, old = advance.old, new = advance.new, "cursor advanced");
        Ok(Interval::new(advance.old, advance.new))
    }

    /// Current cursor value of `group_id` (zero-delta increment).
    pub async fn read(&self, group_id: u64) -> Result<u64, EngineError> {
        Ok(self.advance(group_id, 0).await?.end)
    }
}
