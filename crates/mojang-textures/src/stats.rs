//! Observational counters for the pipeline
//!
//! Nothing in the pipeline reads these back to make decisions.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Hit/miss counters of a cache layer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// Batching queue counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStats {
    /// Upstream calls issued
    pub rounds: u64,
    /// Usernames sent upstream over all rounds
    pub usernames_sent: u64,
    pub last_batch_size: u64,
    /// Jobs left in the queue after the last drain
    pub last_queue_depth: u64,
    pub last_round_duration_ms: u64,
}

/// Outcomes of coalesced lookups
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverStats {
    pub found: u64,
    pub missed: u64,
    pub failed: u64,
    /// Callers that joined a lookup already in flight
    pub shared: u64,
}

/// Aggregated snapshot, assembled by the host
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineStats {
    pub uuid_cache: CacheStats,
    pub batch: BatchStats,
    pub textures_cache: CacheStats,
    pub textures_requests: u64,
    pub resolver: ResolverStats,
}

#[derive(Debug, Default)]
pub(crate) struct Counter(AtomicU64);

impl Counter {
    pub(crate) fn incr(&self) {
        self.add(1);
    }

    pub(crate) fn add(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn set(&self, n: u64) {
        self.0.store(n, Ordering::Relaxed);
    }

    pub(crate) fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter() {
        let counter = Counter::default();
        counter.incr();
        counter.add(4);
        assert_eq!(counter.get(), 5);
        counter.set(2);
        assert_eq!(counter.get(), 2);
    }

    #[test]
    fn test_pipeline_stats_serialization() {
        let stats = PipelineStats {
            uuid_cache: CacheStats { hits: 3, misses: 1 },
            ..Default::default()
        };

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["uuid_cache"]["hits"], 3);
        assert_eq!(json["batch"]["rounds"], 0);
        assert_eq!(json["resolver"]["shared"], 0);
    }
}
