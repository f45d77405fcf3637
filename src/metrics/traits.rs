//! # Metrics Seam
//!
//! ```text
//!   ┌──────────────────────────────┐    ┌──────────────────────────────┐
//!   │ MetricsSnapshotProvider<S>   │───►│ embedding service            │
//!   │ (a Generation)               │    │ (registry, scrape endpoint)  │
//!   └──────────────────────────────┘    └──────────────────────────────┘
//! ```
//!
//! The cache never formats or registers metrics itself; the service polls
//! providers and publishes what it reads.

/// Produces a point-in-time metrics snapshot.
pub trait MetricsSnapshotProvider<S> {
    fn snapshot(&self) -> S;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use crate::generation::{CacheState, Generation};
    use crate::metrics::CacheMetricsSnapshot;

    fn poll<P: MetricsSnapshotProvider<CacheMetricsSnapshot>>(providers: &[&P]) -> Vec<(u64, u64)> {
        providers
            .iter()
            .map(|p| {
                let snapshot = p.snapshot();
                (snapshot.inserts, snapshot.cumulative_inserts)
            })
            .collect()
    }

    #[test]
    fn generations_provide_snapshots() {
        let old: Generation<u32, u32> = Generation::open(CacheConfig::default(), None);
        old.set_state(CacheState::Live);
        old.put(1, 1);
        let new: Generation<u32, u32> =
            Generation::open(CacheConfig::default(), Some(old.stats_handle().clone()));
        new.set_state(CacheState::Live);
        new.put(2, 2);
        new.put(3, 3);

        assert_eq!(poll(&[&old, &new]), vec![(1, 3), (2, 3)]);
    }
}
