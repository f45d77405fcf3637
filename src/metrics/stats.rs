//! Per-generation counters and the cross-generation statistics handle.
//!
//! ## Architecture
//!
//! ```text
//!   StatsHandle (Arc, shared by every generation of one cache slot)
//!   ┌───────────────────────────────────────────────────────────────────┐
//!   │  RwLock                                                           │
//!   │   ├── closed: StatsSnapshot     sum of every closed generation    │
//!   │   └── live:   Vec<Arc<CacheStats>>                                │
//!   │                 ├── gen 3 counters (closing)                      │
//!   │                 └── gen 4 counters (serving)                      │
//!   └───────────────────────────────────────────────────────────────────┘
//!
//!   open:   register(gen_stats)           push onto `live`
//!   close:  retire(gen_stats)             closed += gen_stats; remove from `live`
//!   report: cumulative()                  closed + Σ live
//! ```
//!
//! Retiring merges and unlinks under one write lock, and `cumulative` copies
//! the accumulator together with the live list under one read lock, so an
//! aggregate never counts a closing generation twice and never drops it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

/// Hit ratio of `hits` over `lookups`; `0.0` when there were no lookups.
///
/// ```
/// use gencache::metrics::hit_ratio;
///
/// assert_eq!(hit_ratio(0, 0), 0.0);
/// assert!((hit_ratio(10, 3) - 0.3).abs() < f64::EPSILON);
/// ```
#[inline]
pub fn hit_ratio(lookups: u64, hits: u64) -> f64 {
    if lookups > 0 {
        hits as f64 / lookups as f64
    } else {
        0.0
    }
}

/// Live counters of one generation. Monotonic: nothing ever decrements.
#[derive(Debug, Default)]
pub struct CacheStats {
    lookups: AtomicU64,
    hits: AtomicU64,
    puts: AtomicU64,
    non_live_puts: AtomicU64,
    evictions: AtomicU64,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_lookup(&self) {
        self.lookups.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_put(&self) {
        self.puts.fetch_add(1, Ordering::Relaxed);
    }

    /// A put observed while the generation was not yet serving traffic.
    #[inline]
    pub fn record_non_live_put(&self) {
        self.non_live_puts.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_evictions(&self, count: u64) {
        self.evictions.fetch_add(count, Ordering::Relaxed);
    }

    /// Point-in-time copy of the counters. `current_size` is left at zero;
    /// the owning generation fills it in.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            lookups: self.lookups.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            puts: self.puts.load(Ordering::Relaxed),
            non_live_puts: self.non_live_puts.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            current_size: 0,
        }
    }
}

/// Plain copy of a set of counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub lookups: u64,
    pub hits: u64,
    pub puts: u64,
    pub non_live_puts: u64,
    pub evictions: u64,
    pub current_size: u64,
}

impl StatsSnapshot {
    pub fn hit_ratio(&self) -> f64 {
        hit_ratio(self.lookups, self.hits)
    }

    /// Adds the counters of `other` into `self`.
    pub fn add(&mut self, other: &StatsSnapshot) {
        self.lookups += other.lookups;
        self.hits += other.hits;
        self.puts += other.puts;
        self.non_live_puts += other.non_live_puts;
        self.evictions += other.evictions;
        self.current_size += other.current_size;
    }
}

#[derive(Debug, Default)]
struct Registry {
    closed: StatsSnapshot,
    live: Vec<Arc<CacheStats>>,
}

/// Shared statistics of every generation of one logical cache slot.
///
/// Created by the first generation of a slot (or up front by the caller) and
/// passed into each later [`Generation::open`](crate::generation::Generation::open).
/// Cloning is cheap and yields a handle to the same registry.
#[derive(Debug, Clone, Default)]
pub struct StatsHandle {
    registry: Arc<RwLock<Registry>>,
}

impl StatsHandle {
    /// Creates a registry with a zeroed closed-generations accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a generation's counters to the live list.
    pub fn register(&self, stats: Arc<CacheStats>) {
        self.registry.write().live.push(stats);
    }

    /// Folds a generation's final counters into the closed accumulator and
    /// removes it from the live list.
    ///
    /// Returns `false` (and changes nothing) if `stats` was not registered,
    /// so a generation can only be retired once.
    pub fn retire(&self, stats: &Arc<CacheStats>) -> bool {
        let mut registry = self.registry.write();
        let Some(pos) = registry
            .live
            .iter()
            .position(|live| Arc::ptr_eq(live, stats))
        else {
            return false;
        };
        let retired = registry.live.remove(pos);
        let mut final_counts = retired.snapshot();
        final_counts.current_size = 0;
        registry.closed.add(&final_counts);
        true
    }

    /// Counters accumulated from every closed generation.
    pub fn closed(&self) -> StatsSnapshot {
        self.registry.read().closed
    }

    /// Number of generations currently registered.
    pub fn live_generations(&self) -> usize {
        self.registry.read().live.len()
    }

    /// Closed accumulator plus every live generation.
    ///
    /// The accumulator and the live list are copied under the read lock and
    /// summed after it is released.
    pub fn cumulative(&self) -> StatsSnapshot {
        let (mut total, live) = {
            let registry = self.registry.read();
            (registry.closed, registry.live.clone())
        };
        for stats in &live {
            total.add(&stats.snapshot());
        }
        total
    }

    /// `true` if both handles share one registry.
    pub fn same_slot(&self, other: &StatsHandle) -> bool {
        Arc::ptr_eq(&self.registry, &other.registry)
    }
}
