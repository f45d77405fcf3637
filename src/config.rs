//! Resolved cache configuration and its builder.
//!
//! ## Example
//!
//! ```rust
//! use gencache::config::CacheConfig;
//! use gencache::warm::AutowarmPolicy;
//!
//! let config = CacheConfig::builder()
//!     .name("filterCache")
//!     .max_size(1024)
//!     .cleanup_thread(true)
//!     .autowarm(AutowarmPolicy::Count(128))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.min_size(), 921);
//! assert_eq!(config.acceptable_size(), 972);
//! assert!(config.cleanup_thread());
//! ```
//!
//! ## Parameters
//!
//! | Parameter              | Default                         |
//! |------------------------|---------------------------------|
//! | `max_size`             | 1024                            |
//! | `min_size`             | ⌊0.9 × max_size⌋, clamped       |
//! | `acceptable_size`      | ⌊0.95 × max_size⌋, ≥ min_size   |
//! | `initial_size`         | max_size                        |
//! | `max_ram_mb`           | unset (count budget)            |
//! | `cleanup_thread`       | false                           |
//! | `show_items`           | 0                               |
//! | `autowarm`             | disabled                        |
//! | `count_while_inactive` | false                           |
//! | `shards`               | 4 × available parallelism       |

use crate::error::ConfigError;
use crate::eviction::budget::{Budget, CountBudget, RamBudget, DEFAULT_MAX_SIZE};
use crate::warm::AutowarmPolicy;

/// How many recently accessed items a detailed metrics snapshot lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShowItems {
    #[default]
    None,
    Latest(usize),
    All,
}

impl ShowItems {
    /// Maps the conventional integer parameter: `0` none, negative all,
    /// positive that many.
    pub fn from_param(n: i64) -> Self {
        match n {
            0 => ShowItems::None,
            n if n < 0 => ShowItems::All,
            n => ShowItems::Latest(usize::try_from(n).unwrap_or(usize::MAX)),
        }
    }

    /// Item limit, or `None` when items are not shown.
    pub fn limit(&self) -> Option<usize> {
        match *self {
            ShowItems::None => None,
            ShowItems::Latest(n) => Some(n),
            ShowItems::All => Some(usize::MAX),
        }
    }
}

/// Fully resolved configuration of a cache generation.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    name: String,
    count: CountBudget,
    ram: Option<RamBudget>,
    cleanup_thread: bool,
    show_items: ShowItems,
    autowarm: AutowarmPolicy,
    count_while_inactive: bool,
    shards: Option<usize>,
}

impl CacheConfig {
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_size(&self) -> usize {
        self.count.max
    }

    pub fn min_size(&self) -> usize {
        self.count.min
    }

    pub fn acceptable_size(&self) -> usize {
        self.count.acceptable
    }

    pub fn initial_size(&self) -> usize {
        self.count.initial
    }

    pub fn max_ram_mb(&self) -> Option<u64> {
        self.ram.map(|ram| ram.max_ram_mb())
    }

    pub fn cleanup_thread(&self) -> bool {
        self.cleanup_thread
    }

    pub fn show_items(&self) -> ShowItems {
        self.show_items
    }

    pub fn autowarm(&self) -> AutowarmPolicy {
        self.autowarm
    }

    pub fn count_while_inactive(&self) -> bool {
        self.count_while_inactive
    }

    /// Requested shard count, `None` for the parallelism-based default.
    pub fn shards(&self) -> Option<usize> {
        self.shards
    }

    pub fn count_budget(&self) -> CountBudget {
        self.count
    }

    pub fn ram_budget(&self) -> Option<RamBudget> {
        self.ram
    }

    /// The budget a generation opened with this config starts under.
    pub fn budget(&self) -> Budget {
        match self.ram {
            Some(ram) => Budget::Ram(ram),
            None => Budget::Count(self.count),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            count: CountBudget {
                max: DEFAULT_MAX_SIZE,
                min: DEFAULT_MAX_SIZE * 9 / 10,
                acceptable: DEFAULT_MAX_SIZE * 95 / 100,
                initial: DEFAULT_MAX_SIZE,
            },
            ram: None,
            cleanup_thread: false,
            show_items: ShowItems::None,
            autowarm: AutowarmPolicy::Disabled,
            count_while_inactive: false,
            shards: None,
        }
    }
}

const DEFAULT_NAME: &str = "cache";

/// Builder for [`CacheConfig`]. Unset parameters take the defaults above.
#[derive(Debug, Clone, Default)]
pub struct CacheConfigBuilder {
    name: Option<String>,
    max_size: Option<usize>,
    min_size: Option<usize>,
    acceptable_size: Option<usize>,
    initial_size: Option<usize>,
    max_ram_mb: Option<u64>,
    cleanup_thread: bool,
    show_items: ShowItems,
    autowarm: AutowarmPolicy,
    count_while_inactive: bool,
    shards: Option<usize>,
}

impl CacheConfigBuilder {
    /// Name used in log events.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn max_size(mut self, max_size: usize) -> Self {
        self.max_size = Some(max_size);
        self
    }

    pub fn min_size(mut self, min_size: usize) -> Self {
        self.min_size = Some(min_size);
        self
    }

    pub fn acceptable_size(mut self, acceptable_size: usize) -> Self {
        self.acceptable_size = Some(acceptable_size);
        self
    }

    pub fn initial_size(mut self, initial_size: usize) -> Self {
        self.initial_size = Some(initial_size);
        self
    }

    /// Switches eviction to a RAM budget of this many megabytes.
    pub fn max_ram_mb(mut self, max_ram_mb: u64) -> Self {
        self.max_ram_mb = Some(max_ram_mb);
        self
    }

    /// Runs cleanup passes on a dedicated worker thread instead of the
    /// calling thread.
    pub fn cleanup_thread(mut self, cleanup_thread: bool) -> Self {
        self.cleanup_thread = cleanup_thread;
        self
    }

    /// `0` none, `-1` all, `n` the `n` most recent items in detailed metrics.
    pub fn show_items(mut self, show_items: i64) -> Self {
        self.show_items = ShowItems::from_param(show_items);
        self
    }

    pub fn autowarm(mut self, autowarm: AutowarmPolicy) -> Self {
        self.autowarm = autowarm;
        self
    }

    /// Counts lookups, hits and puts while the generation is still
    /// inactive. Off by default so warm-up traffic stays out of the stats.
    pub fn count_while_inactive(mut self, count: bool) -> Self {
        self.count_while_inactive = count;
        self
    }

    pub fn shards(mut self, shards: usize) -> Self {
        self.shards = Some(shards);
        self
    }

    /// Resolves defaults and validates.
    pub fn build(self) -> Result<CacheConfig, ConfigError> {
        let count = CountBudget::resolve(
            self.max_size.unwrap_or(DEFAULT_MAX_SIZE),
            self.min_size,
            self.acceptable_size,
            self.initial_size,
        )?;
        let ram = self.max_ram_mb.map(RamBudget::from_megabytes).transpose()?;
        if self.shards == Some(0) {
            return Err(ConfigError::new("invalid shards 0: must be >= 1"));
        }
        Ok(CacheConfig {
            name: self.name.unwrap_or_else(|| DEFAULT_NAME.to_string()),
            count,
            ram,
            cleanup_thread: self.cleanup_thread,
            show_items: self.show_items,
            autowarm: self.autowarm,
            count_while_inactive: self.count_while_inactive,
            shards: self.shards,
        })
    }
}
