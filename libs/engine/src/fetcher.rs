use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use stride_api::{Record, RecordId, SequenceStore};

use crate::{EngineError, Interval};

// ═══════════════════════════════════════════════════════════════
//  EmptyBatchPolicy
// ═══════════════════════════════════════════════════════════════

fn default_backoff_ms() -> u64 {
    100
}

/// What a consumer does when an owned interval yields no records.
///
/// An empty batch cannot tell "not written yet" from "nothing more will be
/// written", so the choice is left to configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyBatchPolicy {
    /// Treat the first empty batch as end of stream.
    #[default]
    Stop,
    /// Re-fetch the same interval up to `attempts` more times, sleeping
    /// `backoff_ms` between tries, then treat it as end of stream.
    Retry {
        attempts: u32,
        #[serde(default = "default_backoff_ms")]
        backoff_ms: u64,
    },
}

impl EmptyBatchPolicy {
    /// Backoff before retry number `attempt` (0-based), or `None` when the
    /// policy gives up.
    pub fn backoff(&self, attempt: u32) -> Option<Duration> {
        match *self {
            EmptyBatchPolicy::Stop => None,
            EmptyBatchPolicy::Retry { attempts, backoff_ms } => {
                (attempt < attempts).then(|| Duration::from_millis(backoff_ms))
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  BatchFetcher
// ═══════════════════════════════════════════════════════════════

/// Turns an owned interval into the records stored under its IDs.
///
/// Sparse intervals (IDs skipped by a crashed producer, or not committed
/// yet) simply return fewer records. Results never leave the interval.
#[derive(Clone)]
pub struct BatchFetcher {
    store: Arc<dyn SequenceStore>,
}

impl BatchFetcher {
    pub fn new(store: Arc<dyn SequenceStore>) -> Self {
        Self { store }
    }

    /// Records of `interval`, in no particular order.
    pub async fn fetch(&self, interval: Interval) -> Result<Vec<Record>, EngineError> {
        let Some(last) = interval.last() else {
            return Ok(Vec::new());
        };
        if interval.len() == 1 {
            return Ok(self.fetch_one(interval.start).await?.into_iter().collect());
        }
        let mut records = self.fetch_range(interval.start, last).await?;
        records.retain(|r| interval.contains(r.id));
        Ok(records)
    }

    /// Single record, `None` if it was never written or is not visible yet.
    pub async fn fetch_one(&self, id: u64) -> Result<Option<Record>, EngineError> {
        Ok(self.store.get(RecordId::new(id)).await?)
    }

    /// Records with `low <= id <= high`.
    pub async fn fetch_range(&self, low: u64, high: u64) -> Result<Vec<Record>, EngineError> {
        Ok(self.store.range(low, high).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FlakyStore, seed};

    fn ids(records: &[Record]) -> Vec<u64> {
        let mut ids: Vec<u64> = records.iter().map(|r| r.id).collect();
        ids.sort_unstable();
        ids
    }

    #[tokio::test]
    async fn full_interval_returns_every_record() {
        let store = FlakyStore::new();
        seed(&store, 0..10).await;
        let fetcher = BatchFetcher::new(Arc::new(store));
        assert_eq!(ids(&fetcher.fetch(Interval::new(3, 6)).await.unwrap()), vec![3, 4, 5]);
    }

    #[tokio::test]
    async fn sparse_interval_returns_what_exists() {
        let store = FlakyStore::new();
        seed(&store, [9]).await;
        let fetcher = BatchFetcher::new(Arc::new(store));
        assert_eq!(ids(&fetcher.fetch(Interval::new(9, 12)).await.unwrap()), vec![9]);
        assert!(fetcher.fetch(Interval::new(12, 15)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn single_id_interval_uses_point_lookup() {
        let store = FlakyStore::new();
        seed(&store, [4]).await;
        store.set_widen_range(true);
        let fetcher = BatchFetcher::new(Arc::new(store));
        assert_eq!(ids(&fetcher.fetch(Interval::new(4, 5)).await.unwrap()), vec![4]);
        assert!(fetcher.fetch(Interval::new(5, 6)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_interval_does_not_touch_store() {
        let store = FlakyStore::new();
        let fetcher = BatchFetcher::new(Arc::new(store.clone()));
        assert!(fetcher.fetch(Interval::new(7, 7)).await.unwrap().is_empty());
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn results_stay_inside_interval() {
        let store = FlakyStore::new();
        seed(&store, 0..20).await;
        store.set_widen_range(true);
        let fetcher = BatchFetcher::new(Arc::new(store));
        assert_eq!(ids(&fetcher.fetch(Interval::new(5, 8)).await.unwrap()), vec![5, 6, 7]);
    }

    #[tokio::test]
    async fn store_failure_is_unavailable() {
        let store = FlakyStore::new();
        store.set_down(true);
        let fetcher = BatchFetcher::new(Arc::new(store));
        assert!(fetcher.fetch(Interval::new(0, 3)).await.unwrap_err().is_unavailable());
        assert!(fetcher.fetch(Interval::new(0, 1)).await.unwrap_err().is_unavailable());
    }

    #[test]
    fn retry_policy_backoff() {
        assert_eq!(EmptyBatchPolicy::Stop.backoff(0), None);
        let retry = EmptyBatchPolicy::Retry { attempts: 2, backoff_ms: 50 };
        assert_eq!(retry.backoff(0), Some(Duration::from_millis(50)));
        assert_eq!(retry.backoff(1), Some(Duration::from_millis(50)));
        assert_eq!(retry.backoff(2), None);
    }

    #[test]
    fn policy_from_config() {
        #[derive(Deserialize)]
        struct Cfg {
            empty_batch: EmptyBatchPolicy,
        }
        let stop: Cfg = serde_json::from_str(r#"{"empty_batch":"stop"}"#).unwrap();
        assert_eq!(stop.empty_batch, EmptyBatchPolicy::Stop);
        let retry: Cfg = serde_json::from_str(r#"{"empty_batch":{"retry":{"attempts":3}}}"#).unwrap();
        assert_eq!(retry.empty_batch, EmptyBatchPolicy::Retry { attempts: 3, backoff_ms: 100 });
    }
}
