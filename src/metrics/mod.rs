//! Statistics: per-generation counters, the cross-generation aggregate, and
//! the snapshot read by metrics sinks.

pub mod snapshot;
pub mod stats;
pub mod traits;

pub use snapshot::CacheMetricsSnapshot;
pub use stats::{hit_ratio, CacheStats, StatsHandle, StatsSnapshot};
pub use traits::MetricsSnapshotProvider;
