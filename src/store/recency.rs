//! # Recency-Tracked Concurrent Entry Store
//!
//! The entry store behind every cache generation: a sharded key → value map
//! in which every entry carries an *access stamp* drawn from one store-wide
//! logical clock. The stamps form the recency order; the largest stamp is
//! the most recently used entry and eviction removes the smallest first.
//!
//! ## Architecture
//!
//! ```text
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │                         RecencyStore<K, V>                           │
//!   │                                                                      │
//!   │   clock: AtomicU64  ──── tick() ────┐                                │
//!   │                                     ▼                                │
//!   │   ┌────────────────┬────────────────┬────────────────┬─────────────┐ │
//!   │   │ RwLock<Shard0> │ RwLock<Shard1> │ RwLock<Shard2> │     ...     │ │
//!   │   │                │                │                │             │ │
//!   │   │ k1 → Slot      │ k2 → Slot      │ k7 → Slot      │             │ │
//!   │   │  value: Arc<V> │  ...           │  ...           │             │ │
//!   │   │  stamp: 41     │                │                │             │ │
//!   │   │  ram:   96     │                │                │             │ │
//!   │   └────────────────┴────────────────┴────────────────┴─────────────┘ │
//!   │                                                                      │
//!   │   len: AtomicUsize      ram: RamTracker                              │
//!   └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Operation Locking
//!
//! | Operation               | Lock                     | Recency effect           |
//! |-------------------------|--------------------------|--------------------------|
//! | `get(&k)`               | shard read               | stamp raised (atomic)    |
//! | `peek(&k)`              | shard read               | none                     |
//! | `put(k, v)`             | shard write              | stamp set to new tick    |
//! | `remove(&k)`            | shard write              | entry gone               |
//! | `remove_if_stamp`       | shard write              | entry gone if untouched  |
//! | `evict(&k)`             | shard write              | entry gone               |
//! | `snapshot_most_recent`  | each shard read, in turn | none                     |
//! | `clear()`               | all shard writes         | everything gone          |
//!
//! A hit only needs a shard *read* lock because the stamp is an atomic raised
//! with `fetch_max`; concurrent readers of the same key never serialize.
//! `len` and the RAM total are only changed while the owning shard's write
//! lock is held, so `clear` (which holds every write lock) observes a
//! consistent store.
//!
//! ## Recency Order
//!
//! Stamps are unique: every tick returns a fresh value. Two entries are
//! therefore never tied, and the eviction order among "simultaneous" writers
//! is the order in which they drew their ticks.
//!
//! Snapshots read one shard at a time. They never contain a key twice, but a
//! concurrent writer may move an entry after its shard has been read, so a
//! snapshot of a live cache is a best-effort point-in-time view.

use std::collections::hash_map::Entry;
use std::fmt;
use std::hash::Hash;
use std::mem;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::ds::ShardSelector;
use crate::store::weight::{FixedEntryCost, RamTracker, SizeEstimator};

struct Slot<V> {
    value: Arc<V>,
    stamp: AtomicU64,
    ram: usize,
}

/// Entry count and RAM total observed right after a structural update.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Usage {
    pub entries: usize,
    pub ram_bytes: u64,
}

/// Result of a put: the replaced value (if any) and the post-insert usage.
#[derive(Debug)]
pub struct PutOutcome<V> {
    pub previous: Option<Arc<V>>,
    pub usage: Usage,
}

/// An eviction candidate captured during a cleanup scan.
///
/// The stamp is the entry's stamp at scan time; removal only succeeds if the
/// entry has not been touched since.
#[derive(Debug, Clone)]
pub struct Candidate<K> {
    pub key: K,
    pub stamp: u64,
    pub ram: usize,
}

/// Sharded, recency-stamped concurrent map.
pub struct RecencyStore<K, V> {
    shards: Box<[RwLock<FxHashMap<K, Slot<V>>>]>,
    selector: ShardSelector,
    clock: AtomicU64,
    len: AtomicUsize,
    ram: RamTracker,
    estimator: Box<dyn SizeEstimator<K, V>>,
}

impl<K, V> RecencyStore<K, V>
where
    K: Eq + Hash + 'static,
    V: 'static,
{
    /// Creates a store with the default fixed-cost RAM estimator.
    pub fn new(initial_capacity: usize, selector: ShardSelector) -> Self {
        Self::with_estimator(initial_capacity, selector, FixedEntryCost::new())
    }
}

impl<K, V> RecencyStore<K, V>
where
    K: Eq + Hash,
{
    /// Creates a store that charges each entry `estimator(key, value)` bytes.
    ///
    /// `initial_capacity` is spread evenly over the shards as a
    /// pre-allocation hint.
    pub fn with_estimator<E>(initial_capacity: usize, selector: ShardSelector, estimator: E) -> Self
    where
        E: SizeEstimator<K, V> + 'static,
    {
        let shard_count = selector.shard_count();
        let per_shard = initial_capacity.div_ceil(shard_count);
        let shards = (0..shard_count)
            .map(|_| RwLock::new(FxHashMap::with_capacity_and_hasher(per_shard, Default::default())))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            shards,
            selector,
            clock: AtomicU64::new(0),
            len: AtomicUsize::new(0),
            ram: RamTracker::new(),
            estimator: Box::new(estimator),
        }
    }

    #[inline]
    fn shard(&self, key: &K) -> &RwLock<FxHashMap<K, Slot<V>>> {
        &self.shards[self.selector.shard_for_key(key)]
    }

    #[inline]
    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Number of shards.
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Number of entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sum of the RAM estimates of all entries.
    #[inline]
    pub fn ram_bytes_used(&self) -> u64 {
        self.ram.total()
    }

    #[inline]
    pub fn usage(&self) -> Usage {
        Usage {
            entries: self.len(),
            ram_bytes: self.ram.total(),
        }
    }

    /// Looks up `key` and promotes it to most-recent on a hit.
    ///
    /// A miss leaves the recency order untouched.
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        let shard = self.shard(key).read();
        let slot = shard.get(key)?;
        slot.stamp.fetch_max(self.tick(), Ordering::Relaxed);
        Some(Arc::clone(&slot.value))
    }

    /// Looks up `key` without promoting it.
    pub fn peek(&self, key: &K) -> Option<Arc<V>> {
        self.shard(key)
            .read()
            .get(key)
            .map(|slot| Arc::clone(&slot.value))
    }

    /// Returns `true` if `key` is present. Does not promote.
    pub fn contains(&self, key: &K) -> bool {
        self.shard(key).read().contains_key(key)
    }

    /// Inserts or replaces `key`; the entry becomes most-recent.
    pub fn put(&self, key: K, value: V) -> PutOutcome<V> {
        self.put_arc(key, Arc::new(value))
    }

    /// Inserts a pre-wrapped value.
    pub fn put_arc(&self, key: K, value: Arc<V>) -> PutOutcome<V> {
        let ram = self.estimator.estimate(&key, value.as_ref());
        let previous = {
            let mut shard = self.shard(&key).write();
            let stamp = self.tick();
            match shard.entry(key) {
                Entry::Occupied(mut occupied) => {
                    let slot = occupied.get_mut();
                    let old_ram = mem::replace(&mut slot.ram, ram);
                    *slot.stamp.get_mut() = stamp;
                    self.ram.replace(old_ram, ram);
                    Some(mem::replace(&mut slot.value, value))
                },
                Entry::Vacant(vacant) => {
                    vacant.insert(Slot {
                        value,
                        stamp: AtomicU64::new(stamp),
                        ram,
                    });
                    self.len.fetch_add(1, Ordering::Relaxed);
                    self.ram.add(ram);
                    None
                },
            }
        };
        PutOutcome {
            previous,
            usage: self.usage(),
        }
    }

    /// Removes `key`, returning its value.
    pub fn remove(&self, key: &K) -> Option<Arc<V>> {
        let mut shard = self.shard(key).write();
        let slot = shard.remove(key)?;
        self.len.fetch_sub(1, Ordering::Relaxed);
        self.ram.sub(slot.ram);
        Some(slot.value)
    }

    /// Removes `key` only if its stamp still equals `stamp`.
    ///
    /// Returns the freed RAM estimate on success. An entry that was read or
    /// rewritten after the stamp was captured is kept.
    pub fn remove_if_stamp(&self, key: &K, stamp: u64) -> Option<usize> {
        let mut shard = self.shard(key).write();
        if shard.get(key)?.stamp.load(Ordering::Relaxed) != stamp {
            return None;
        }
        let slot = shard.remove(key)?;
        self.len.fetch_sub(1, Ordering::Relaxed);
        self.ram.sub(slot.ram);
        Some(slot.ram)
    }

    /// Removes `key` whatever its stamp, returning the freed RAM estimate.
    pub fn evict(&self, key: &K) -> Option<usize> {
        let mut shard = self.shard(key).write();
        let slot = shard.remove(key)?;
        self.len.fetch_sub(1, Ordering::Relaxed);
        self.ram.sub(slot.ram);
        Some(slot.ram)
    }

    /// Drops every entry and resets the RAM total.
    pub fn clear(&self) {
        let mut guards = Vec::with_capacity(self.shards.len());
        for shard in self.shards.iter() {
            guards.push(shard.write());
        }
        for guard in guards.iter_mut() {
            guard.clear();
        }
        self.len.store(0, Ordering::Relaxed);
        self.ram.reset();
    }
}

impl<K, V> RecencyStore<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Captures `(key, stamp, ram)` for every entry, in no particular order.
    pub fn eviction_candidates(&self) -> Vec<Candidate<K>> {
        let mut out = Vec::with_capacity(self.len());
        for shard in self.shards.iter() {
            let map = shard.read();
            out.extend(map.iter().map(|(key, slot)| Candidate {
                key: key.clone(),
                stamp: slot.stamp.load(Ordering::Relaxed),
                ram: slot.ram,
            }));
        }
        out
    }

    /// Up to `n` entries, most-recent first.
    pub fn snapshot_most_recent(&self, n: usize) -> Vec<(K, Arc<V>)> {
        self.ranked(n, true)
    }

    /// Up to `n` entries, least-recent first.
    pub fn snapshot_least_recent(&self, n: usize) -> Vec<(K, Arc<V>)> {
        self.ranked(n, false)
    }

    fn ranked(&self, n: usize, newest_first: bool) -> Vec<(K, Arc<V>)> {
        if n == 0 {
            return Vec::new();
        }
        let mut items: Vec<(u64, K, Arc<V>)> = Vec::with_capacity(self.len());
        for shard in self.shards.iter() {
            let map = shard.read();
            items.extend(map.iter().map(|(key, slot)| {
                (
                    slot.stamp.load(Ordering::Relaxed),
                    key.clone(),
                    Arc::clone(&slot.value),
                )
            }));
        }

        let order = |a: &(u64, K, Arc<V>), b: &(u64, K, Arc<V>)| {
            if newest_first {
                b.0.cmp(&a.0)
            } else {
                a.0.cmp(&b.0)
            }
        };
        if n < items.len() {
            items.select_nth_unstable_by(n - 1, order);
            items.truncate(n);
        }
        items.sort_unstable_by(order);
        items.into_iter().map(|(_, key, value)| (key, value)).collect()
    }
}

impl<K, V> fmt::Debug for RecencyStore<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecencyStore")
            .field("len", &self.len.load(Ordering::Relaxed))
            .field("ram_bytes", &self.ram.total())
            .field("shards", &self.shards.len())
            .finish()
    }
}
