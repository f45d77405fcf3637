//! Warm transfer: replaying recently used entries into a new generation.
//!
//! ## Flow
//!
//! ```text
//!   old generation (recency order, most recent first)
//!     k10  k9  k8  k7  ...  k1
//!     └──────────┘
//!      warm_count(old.size()) = 3
//!          │
//!          ▼  snapshot_most_recent(3) = [k10, k9, k8]
//!          ▼  reversed                = [k8, k9, k10]
//!   regenerator.regenerate_item(new, old, k8,  v8)  ── Ok(true)  ──► next
//!   regenerator.regenerate_item(new, old, k9,  v9)  ── Ok(false) ──► stop
//!   (k10 never replayed)
//! ```
//!
//! Replaying oldest-first means the most valuable entries are inserted last
//! and end up most recent in the new generation. A failing item is logged
//! and skipped; only an explicit `Ok(false)` ends the pass early.

use std::fmt::{self, Debug};
use std::hash::Hash;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{ConfigError, RegenerationError};
use crate::generation::Generation;

/// How many entries of the predecessor to replay.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum AutowarmPolicy {
    #[default]
    Disabled,
    /// At most this many of the most recently used entries.
    Count(usize),
    /// This percentage of the predecessor's size, rounded down.
    Percent(f64),
}

impl AutowarmPolicy {
    pub fn is_enabled(&self) -> bool {
        match *self {
            AutowarmPolicy::Disabled => false,
            AutowarmPolicy::Count(n) => n > 0,
            AutowarmPolicy::Percent(p) => p > 0.0,
        }
    }

    /// Number of entries to replay from a predecessor holding `size` entries.
    ///
    /// ```
    /// use gencache::warm::AutowarmPolicy;
    ///
    /// assert_eq!(AutowarmPolicy::Count(16).warm_count(10), 10);
    /// assert_eq!(AutowarmPolicy::Percent(50.0).warm_count(9), 4);
    /// assert_eq!(AutowarmPolicy::Disabled.warm_count(100), 0);
    /// ```
    pub fn warm_count(&self, size: usize) -> usize {
        match *self {
            AutowarmPolicy::Disabled => 0,
            AutowarmPolicy::Count(n) => n.min(size),
            AutowarmPolicy::Percent(p) => ((size as f64 * p / 100.0) as usize).min(size),
        }
    }
}

/// Parses `"N"` (absolute count) or `"P%"` (percentage). `"0"` and `"0%"`
/// disable warming.
impl FromStr for AutowarmPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(percent) = s.strip_suffix('%') {
            let p: f64 = percent
                .trim()
                .parse()
                .map_err(|_| ConfigError::new(format!("invalid autowarm percentage: {s:?}")))?;
            if !(0.0..=100.0).contains(&p) {
                return Err(ConfigError::new(format!(
                    "autowarm percentage out of range [0, 100]: {s:?}"
                )));
            }
            return Ok(if p == 0.0 {
                AutowarmPolicy::Disabled
            } else {
                AutowarmPolicy::Percent(p)
            });
        }
        let n: usize = s
            .parse()
            .map_err(|_| ConfigError::new(format!("invalid autowarm count: {s:?}")))?;
        Ok(if n == 0 {
            AutowarmPolicy::Disabled
        } else {
            AutowarmPolicy::Count(n)
        })
    }
}

impl fmt::Display for AutowarmPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AutowarmPolicy::Disabled => f.write_str("0"),
            AutowarmPolicy::Count(n) => write!(f, "{n}"),
            AutowarmPolicy::Percent(p) => write!(f, "{p}%"),
        }
    }
}

/// Rebuilds one entry of an old generation inside a new one.
///
/// Implementors usually recompute the value against the new dataset and
/// `put` it into `new`. Returning `Ok(false)` ends the warm pass.
pub trait CacheRegenerator<K, V> {
    fn regenerate_item(
        &mut self,
        new: &Generation<K, V>,
        old: &Generation<K, V>,
        key: &K,
        value: &Arc<V>,
    ) -> Result<bool, RegenerationError>;
}

/// Adapter turning a closure into a [`CacheRegenerator`].
#[derive(Debug)]
pub struct FnRegenerator<F>(F);

/// Wraps a closure as a regenerator.
///
/// ```
/// use std::sync::Arc;
/// use gencache::config::CacheConfig;
/// use gencache::generation::Generation;
/// use gencache::warm::{regenerator_fn, AutowarmPolicy};
///
/// let config = CacheConfig::builder().autowarm(AutowarmPolicy::Count(8)).build().unwrap();
/// let old: Generation<u32, String> = Generation::open(config.clone(), None);
/// old.put(1, "one".to_string());
///
/// let new = Generation::open(config, Some(old.stats_handle().clone()));
/// let mut copy = regenerator_fn(|new: &Generation<u32, String>, _old: &Generation<u32, String>, key: &u32, value: &Arc<String>| {
///     new.put_arc(*key, Arc::clone(value));
///     Ok(true)
/// });
/// new.warm(&old, &mut copy);
/// assert_eq!(new.size(), 1);
/// ```
pub fn regenerator_fn<K, V, F>(f: F) -> FnRegenerator<F>
where
    F: FnMut(&Generation<K, V>, &Generation<K, V>, &K, &Arc<V>) -> Result<bool, RegenerationError>,
{
    FnRegenerator(f)
}

impl<K, V, F> CacheRegenerator<K, V> for FnRegenerator<F>
where
    F: FnMut(&Generation<K, V>, &Generation<K, V>, &K, &Arc<V>) -> Result<bool, RegenerationError>,
{
    fn regenerate_item(
        &mut self,
        new: &Generation<K, V>,
        old: &Generation<K, V>,
        key: &K,
        value: &Arc<V>,
    ) -> Result<bool, RegenerationError> {
        (self.0)(new, old, key, value)
    }
}

/// Outcome of a warm pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WarmReport {
    /// Entries taken from the predecessor's snapshot.
    pub requested: usize,
    /// Items the regenerator accepted (`Ok(_)`).
    pub replayed: usize,
    /// Items the regenerator rejected with an error.
    pub failed: usize,
    pub stopped_early: bool,
    pub elapsed: Duration,
}

/// Replays the most recent entries of `old` into `new`.
///
/// No-op (zero report, warmup time untouched) when `new`'s autowarm policy
/// is disabled.
pub fn warm<K, V, R>(new: &Generation<K, V>, old: &Generation<K, V>, regenerator: &mut R) -> WarmReport
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Send + Sync + 'static,
    R: CacheRegenerator<K, V> + ?Sized,
{
    let policy = new.config().autowarm();
    if !policy.is_enabled() {
        return WarmReport::default();
    }

    let start = Instant::now();
    let count = policy.warm_count(old.size());
    let items = old.snapshot_most_recent(count);
    let mut report = WarmReport {
        requested: items.len(),
        ..WarmReport::default()
    };

    for (key, value) in items.iter().rev() {
        match regenerator.regenerate_item(new, old, key, value) {
            Ok(keep_going) => {
                report.replayed += 1;
                if !keep_going {
                    report.stopped_early = true;
                    break;
                }
            },
            Err(err) => {
                report.failed += 1;
                tracing::warn!(
                    cache = new.config().name(),
                    key = ?key,
                    error = %err,
                    "error during auto-warming, skipping item"
                );
            },
        }
    }

    report.elapsed = start.elapsed();
    new.record_warmup_time(report.elapsed);
    tracing::info!(
        cache = new.config().name(),
        requested = report.requested,
        replayed = report.replayed,
        failed = report.failed,
        stopped_early = report.stopped_early,
        elapsed_ms = report.elapsed.as_millis() as u64,
        "cache auto-warming finished"
    );
    report
}
