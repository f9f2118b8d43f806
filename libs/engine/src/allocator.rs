use crate::EngineError;

/// Producer-side ID source based on stride partitioning.
///
/// Worker `k` of `N` gets the residue class `k mod N`: `k, k+N, k+2N, ...`
/// up to and including `ceiling`. The classes are pairwise disjoint, so
/// workers never collide without talking to the store or each other, as
/// long as every worker was built with the same `N`.
#[derive(Debug, Clone)]
pub struct IdAllocator {
    next: Option<u64>,
    stride: u64,
    ceiling: u64,
}

impl IdAllocator {
    pub fn new(worker: u64, workers: u64, ceiling: u64) -> Result<Self, EngineError> {
        if workers == 0 {
            return Err(EngineError::Config("worker count must be at least 1".into()));
        }
        if worker >= workers {
            return Err(EngineError::Config(format!(
                "worker index {worker} out of range for {workers} workers"
            )));
        }
        Ok(Self {
            next: Some(worker),
            stride: workers,
            ceiling,
        })
    }

    /// Next ID of this worker's class, or `None` once the ceiling is passed.
    ///
    /// `None` is sticky. Purely local: an ID handed out but never inserted
    /// stays a permanent gap in the sequence.
    pub fn next_id(&mut self) -> Option<u64> {
        let id = self.next.filter(|&id| id <= self.ceiling)?;
        self.next = id.checked_add(self.stride);
        Some(id)
    }
}

impl Iterator for IdAllocator {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        self.next_id()
    }
}
