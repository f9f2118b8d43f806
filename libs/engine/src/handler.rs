use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use stride_api::Record;

use crate::EngineError;

/// Callback a consumer worker runs for every record of a fetched batch.
///
/// An error stops the calling worker; records already handled stay handled.
pub trait RecordHandler: Send + Sync {
    fn handle(&self, record: &Record) -> Result<(), EngineError>;
}

/// Accepts every record and drops it.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscardHandler;

impl RecordHandler for DiscardHandler {
    fn handle(&self, _record: &Record) -> Result<(), EngineError> {
        Ok(())
    }
}

/// Counts handled records. Clones share the counter.
#[derive(Debug, Clone, Default)]
pub struct CountingHandler {
    count: Arc<AtomicU64>,
}

impl CountingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}

impl RecordHandler for CountingHandler {
    fn handle(&self, _record: &Record) -> Result<(), EngineError> {
        self.count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counting_handler_clones_share_count() {
        let a = CountingHandler::new();
        let b = a.clone();
        a.handle(&Record::new(1)).unwrap();
        b.handle(&Record::new(2)).unwrap();
        assert_eq!(a.count(), 2);
        assert!(DiscardHandler.handle(&Record::new(3)).is_ok());
    }
}
