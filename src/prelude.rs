pub use crate::config::{CacheConfig, CacheConfigBuilder, ShowItems};
pub use crate::error::{ConfigError, RegenerationError};
pub use crate::eviction::{Budget, CleanupMode, CountBudget, RamBudget};
pub use crate::generation::{CacheState, Generation};
pub use crate::metrics::{CacheMetricsSnapshot, MetricsSnapshotProvider, StatsHandle, StatsSnapshot};
pub use crate::store::SizeEstimator;
pub use crate::warm::{regenerator_fn, AutowarmPolicy, CacheRegenerator, WarmReport};
