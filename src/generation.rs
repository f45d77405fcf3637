//! # Cache Generations
//!
//! A [`Generation`] is one open/close lifetime of a cache, tied to one
//! version of the underlying dataset. When the dataset is reloaded the
//! embedding service opens a new generation, optionally warms it from the
//! old one, promotes it to [`CacheState::Live`], and closes the old one.
//!
//! ```text
//!   slot "filterCache"
//!   ──────────────────────────────────────────────────────────────────────►
//!     gen 1: open ── live ──────────── close
//!                                        ▲
//!     gen 2:                  open ── warm(gen 1) ── live ──────── close
//!                                                                   ▲
//!     gen 3:                                          open ── warm(gen 2) ── live
//!
//!   StatsHandle: created by gen 1, passed into every later open
//! ```
//!
//! ## Ownership
//!
//! ```text
//!   Generation<K, V>
//!   ├── Arc<Shared<K, V>> ◄──────────────── CleanupWorker thread (Background)
//!   │     ├── RecencyStore<K, V>
//!   │     ├── EvictionController
//!   │     └── Arc<CacheStats> ◄───────────── StatsHandle (shared by the slot)
//!   ├── Cleaner::{Inline | Background(CleanupWorker)}
//!   └── StatsHandle
//! ```
//!
//! Closing (explicitly or on drop) stops the worker, folds the generation's
//! counters into the slot's closed-generations accumulator and drops every
//! entry. Entries never migrate on their own; only [`Generation::warm`]
//! moves them.

use std::fmt::{Debug, Display};
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::CacheConfig;
use crate::ds::ShardSelector;
use crate::error::ConfigError;
use crate::eviction::{Budget, CleanupMode, CleanupReport, CleanupWorker, EvictionController};
use crate::metrics::{CacheMetricsSnapshot, CacheStats, MetricsSnapshotProvider, StatsHandle, StatsSnapshot};
use crate::store::{FixedEntryCost, RecencyStore, SizeEstimator};
use crate::warm::{self, CacheRegenerator, WarmReport};

/// Whether a generation is serving traffic yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheState {
    /// Opened and possibly warming; not yet promoted.
    #[default]
    Inactive,
    Live,
}

struct Shared<K, V> {
    store: RecencyStore<K, V>,
    controller: EvictionController,
    stats: Arc<CacheStats>,
    live: AtomicBool,
    count_while_inactive: bool,
}

impl<K, V> Shared<K, V>
where
    K: Eq + Hash + Clone,
{
    fn cleanup(&self) -> Option<CleanupReport> {
        self.controller.run_cleanup(&self.store, &self.stats)
    }

    #[inline]
    fn counting(&self) -> bool {
        self.count_while_inactive || self.live.load(Ordering::Relaxed)
    }
}

const CLEANUP_THREAD_NAME: &str = "gencache-cleanup";

enum Cleaner {
    Inline,
    Background(CleanupWorker),
}

/// One lifetime of a concurrently accessed LRU cache.
///
/// All operations take `&self`; share a generation across threads with an
/// `Arc`.
///
/// # Example
///
/// ```
/// use gencache::config::CacheConfig;
/// use gencache::generation::{CacheState, Generation};
///
/// let config = CacheConfig::builder().max_size(100).build().unwrap();
/// let cache: Generation<String, u64> = Generation::open(config, None);
/// cache.set_state(CacheState::Live);
///
/// cache.put("q:rust".to_string(), 42);
/// assert_eq!(cache.get(&"q:rust".to_string()).as_deref(), Some(&42));
/// assert_eq!(cache.stats().hits, 1);
///
/// cache.close();
/// ```
pub struct Generation<K, V> {
    shared: Arc<Shared<K, V>>,
    cleaner: Cleaner,
    stats_handle: StatsHandle,
    config: CacheConfig,
    warmup_millis: AtomicU64,
    closed: bool,
}

impl<K, V> Generation<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// Opens a generation with the fixed-cost RAM estimator.
    ///
    /// Pass the predecessor's [`stats_handle`](Self::stats_handle) to join
    /// its slot; `None` starts a new slot.
    pub fn open(config: CacheConfig, stats_handle: Option<StatsHandle>) -> Self {
        Self::open_with_estimator(config, stats_handle, FixedEntryCost::new())
    }

    /// Opens a generation that charges each entry `estimator(key, value)`
    /// bytes against a RAM budget.
    pub fn open_with_estimator<E>(config: CacheConfig, stats_handle: Option<StatsHandle>, estimator: E) -> Self
    where
        E: SizeEstimator<K, V> + 'static,
    {
        let selector = config.shards().map(ShardSelector::new).unwrap_or_default();
        let store = RecencyStore::with_estimator(config.initial_size(), selector, estimator);
        let mode = CleanupMode::from_cleanup_thread(config.cleanup_thread());
        let controller = EvictionController::new(config.count_budget(), config.ram_budget(), mode);

        let stats = Arc::new(CacheStats::new());
        let stats_handle = stats_handle.unwrap_or_default();
        stats_handle.register(Arc::clone(&stats));

        let shared = Arc::new(Shared {
            store,
            controller,
            stats,
            live: AtomicBool::new(false),
            count_while_inactive: config.count_while_inactive(),
        });

        let cleaner = match mode {
            CleanupMode::Inline => Cleaner::Inline,
            CleanupMode::Background => {
                let worker_shared = Arc::clone(&shared);
                let spawned = CleanupWorker::spawn(CLEANUP_THREAD_NAME, move || {
                    worker_shared.cleanup();
                });
                match spawned {
                    Ok(worker) => Cleaner::Background(worker),
                    Err(err) => {
                        tracing::warn!(
                            cache = config.name(),
                            error = %err,
                            "failed to spawn cleanup thread, cleaning up inline"
                        );
                        Cleaner::Inline
                    },
                }
            },
        };

        tracing::debug!(
            cache = config.name(),
            budget = ?shared.controller.budget(),
            cleanup_thread = matches!(cleaner, Cleaner::Background(_)),
            shards = shared.store.shard_count(),
            live_generations = stats_handle.live_generations(),
            "cache generation opened"
        );

        Self {
            shared,
            cleaner,
            stats_handle,
            config,
            warmup_millis: AtomicU64::new(0),
            closed: false,
        }
    }

    // =========================================================================
    // Entry operations
    // =========================================================================

    /// Looks up `key`, promoting it to most-recent on a hit.
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        let found = self.shared.store.get(key);
        if self.shared.counting() {
            let stats = &self.shared.stats;
            stats.record_lookup();
            if found.is_some() {
                stats.record_hit();
            }
        }
        found
    }

    /// Inserts or replaces `key`, returning the previous value.
    ///
    /// May run a cleanup pass on this thread (inline mode) or wake the
    /// cleanup worker (background mode) if the budget is exceeded.
    pub fn put(&self, key: K, value: V) -> Option<Arc<V>> {
        self.put_arc(key, Arc::new(value))
    }

    /// Inserts a value that is already shared, e.g. one carried over from a
    /// previous generation.
    pub fn put_arc(&self, key: K, value: Arc<V>) -> Option<Arc<V>> {
        let outcome = self.shared.store.put_arc(key, value);
        if self.shared.counting() {
            self.shared.stats.record_put();
        } else {
            self.shared.stats.record_non_live_put();
        }

        if self.shared.controller.is_over_budget(outcome.usage) {
            match &self.cleaner {
                Cleaner::Inline => {
                    self.shared.cleanup();
                },
                Cleaner::Background(worker) => worker.signal(),
            }
        }
        outcome.previous
    }

    pub fn remove(&self, key: &K) -> Option<Arc<V>> {
        self.shared.store.remove(key)
    }

    /// Looks up `key` without promoting it or counting a lookup.
    pub fn peek(&self, key: &K) -> Option<Arc<V>> {
        self.shared.store.peek(key)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.shared.store.contains(key)
    }

    /// Drops every entry. Counters are kept.
    pub fn clear(&self) {
        self.shared.store.clear();
    }

    pub fn size(&self) -> usize {
        self.shared.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.store.is_empty()
    }

    pub fn ram_bytes_used(&self) -> u64 {
        self.shared.store.ram_bytes_used()
    }

    /// Up to `n` entries, most recently accessed first.
    pub fn snapshot_most_recent(&self, n: usize) -> Vec<(K, Arc<V>)> {
        self.shared.store.snapshot_most_recent(n)
    }

    /// Up to `n` entries, least recently accessed first.
    pub fn snapshot_least_recent(&self, n: usize) -> Vec<(K, Arc<V>)> {
        self.shared.store.snapshot_least_recent(n)
    }

    // =========================================================================
    // Lifecycle and configuration
    // =========================================================================

    pub fn set_state(&self, state: CacheState) {
        self.shared.live.store(state == CacheState::Live, Ordering::Relaxed);
    }

    pub fn state(&self) -> CacheState {
        if self.shared.live.load(Ordering::Relaxed) {
            CacheState::Live
        } else {
            CacheState::Inactive
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Handle to the slot's shared statistics; pass it to the next
    /// [`open`](Self::open).
    pub fn stats_handle(&self) -> &StatsHandle {
        &self.stats_handle
    }

    /// The budget eviction currently enforces.
    pub fn budget(&self) -> Budget {
        self.shared.controller.budget()
    }

    pub fn max_size(&self) -> usize {
        self.shared.controller.count_budget().max
    }

    /// RAM limit in megabytes, `None` under a count budget.
    pub fn max_ram_mb(&self) -> Option<u64> {
        match self.budget() {
            Budget::Ram(ram) => Some(ram.max_ram_mb()),
            Budget::Count(_) => None,
        }
    }

    /// Sets a new entry limit and re-derives the lower watermarks.
    ///
    /// Rejects `max_size < 1`, keeping the previous limits. Does not evict
    /// by itself; the next put over the new limit does.
    pub fn set_max_size(&self, max_size: usize) -> Result<(), ConfigError> {
        let count = self.shared.controller.set_max_size(max_size)?;
        tracing::debug!(
            cache = self.config.name(),
            max_size = count.max,
            min_size = count.min,
            acceptable_size = count.acceptable,
            "cache max size changed"
        );
        Ok(())
    }

    /// Switches to a RAM budget (`Some(mb)`) or back to the entry budget
    /// (`None`). Rejects `Some(0)`, keeping the previous budget.
    pub fn set_max_ram(&self, max_ram_mb: Option<u64>) -> Result<(), ConfigError> {
        let budget = self.shared.controller.set_max_ram(max_ram_mb)?;
        tracing::debug!(cache = self.config.name(), budget = ?budget, "cache RAM budget changed");
        Ok(())
    }

    /// Completed cleanup passes.
    pub fn cleanup_passes(&self) -> u64 {
        self.shared.controller.passes()
    }

    /// `true` if cleanup runs on a dedicated worker thread.
    pub fn has_cleanup_thread(&self) -> bool {
        matches!(self.cleaner, Cleaner::Background(_))
    }

    // =========================================================================
    // Warm transfer
    // =========================================================================

    /// Replays the most recent entries of `old` through `regenerator`.
    /// See [`warm::warm`].
    pub fn warm<R>(&self, old: &Generation<K, V>, regenerator: &mut R) -> WarmReport
    where
        K: Debug,
        R: CacheRegenerator<K, V> + ?Sized,
    {
        warm::warm(self, old, regenerator)
    }

    pub(crate) fn record_warmup_time(&self, elapsed: Duration) {
        let millis = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        self.warmup_millis.store(millis, Ordering::Relaxed);
    }

    /// Wall time of the last warm pass into this generation.
    pub fn warmup_time(&self) -> Duration {
        Duration::from_millis(self.warmup_millis.load(Ordering::Relaxed))
    }

    // =========================================================================
    // Statistics
    // =========================================================================

    /// This generation's counters plus its current size.
    pub fn stats(&self) -> StatsSnapshot {
        let mut snapshot = self.shared.stats.snapshot();
        snapshot.current_size = self.size() as u64;
        snapshot
    }

    /// Counters summed over every generation of the slot, closed included.
    pub fn cumulative_stats(&self) -> StatsSnapshot {
        self.stats_handle.cumulative()
    }

    pub fn hit_ratio(&self) -> f64 {
        self.stats().hit_ratio()
    }

    /// Metrics snapshot without the item listing.
    pub fn metrics(&self) -> CacheMetricsSnapshot {
        CacheMetricsSnapshot {
            cleanup_thread: self.config.cleanup_thread(),
            ram_bytes_used: self.ram_bytes_used(),
            max_size: self.max_size(),
            max_ram_mb: self.max_ram_mb(),
            warmup_time: self.warmup_time(),
            ..CacheMetricsSnapshot::default()
        }
        .with_counters(&self.stats(), &self.cumulative_stats())
    }

    /// Metrics snapshot including the most recently accessed items when the
    /// configuration enables `show_items`.
    pub fn detailed_metrics(&self) -> CacheMetricsSnapshot
    where
        K: Display,
        V: Display,
    {
        let mut snapshot = self.metrics();
        if let Some(limit) = self.config.show_items().limit() {
            snapshot.items = self
                .snapshot_most_recent(limit)
                .into_iter()
                .map(|(key, value)| (format!("item_{key}"), value.to_string()))
                .collect();
        }
        snapshot
    }

    // =========================================================================
    // Close
    // =========================================================================

    /// Closes the generation: stops the cleanup worker, folds the counters
    /// into the slot's closed-generations accumulator and drops the entries.
    pub fn close(mut self) {
        self.shutdown();
        self.shared.store.clear();
    }
}

impl<K, V> Generation<K, V> {
    /// Stops the worker and retires the counters. Entries are released when
    /// the last reference to the shared state goes away.
    fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Cleaner::Background(worker) = &mut self.cleaner {
            worker.shutdown();
        }
        let final_stats = self.shared.stats.snapshot();
        self.stats_handle.retire(&self.shared.stats);
        tracing::debug!(
            cache = self.config.name(),
            lookups = final_stats.lookups,
            hits = final_stats.hits,
            puts = final_stats.puts,
            evictions = final_stats.evictions,
            "cache generation closed"
        );
    }
}

impl<K, V> MetricsSnapshotProvider<CacheMetricsSnapshot> for Generation<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    fn snapshot(&self) -> CacheMetricsSnapshot {
        self.metrics()
    }
}

impl<K, V> Drop for Generation<K, V> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<K, V> std::fmt::Debug for Generation<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Generation")
            .field("name", &self.config.name())
            .field("store", &self.shared.store)
            .field("budget", &self.shared.controller.budget())
            .field("live", &self.shared.live.load(Ordering::Relaxed))
            .field("closed", &self.closed)
            .finish()
    }
}
