//! Per-entry RAM estimation and the running byte total.
//!
//! Every entry carries a `ram_estimate` computed exactly once, when it is
//! inserted. The store keeps the running sum in a [`RamTracker`] so the
//! eviction controller can compare it against a RAM budget without walking
//! the map.
//!
//! When no estimator is supplied the store uses [`FixedEntryCost`], which
//! charges the in-memory size of the key and value types plus a constant
//! bookkeeping overhead. That keeps `ram_bytes_used` meaningful even when the
//! cache runs under an entry-count budget.

use std::marker::PhantomData;
use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};

/// Bookkeeping bytes charged per entry on top of key and value sizes
/// (map slot, access stamp, `Arc` header).
pub const ENTRY_OVERHEAD_BYTES: usize = 64;

/// Computes the RAM cost of one cache entry.
///
/// Implemented for any `Fn(&K, &V) -> usize + Send + Sync`, so most callers
/// pass a closure:
///
/// ```
/// use gencache::store::weight::SizeEstimator;
///
/// let by_len = |_key: &u64, value: &String| value.len() + 32;
/// assert_eq!(by_len.estimate(&1, &"abcd".to_string()), 36);
/// ```
pub trait SizeEstimator<K, V>: Send + Sync {
    /// Returns the estimated number of bytes held by `(key, value)`.
    fn estimate(&self, key: &K, value: &V) -> usize;
}

impl<K, V, F> SizeEstimator<K, V> for F
where
    F: Fn(&K, &V) -> usize + Send + Sync,
{
    #[inline]
    fn estimate(&self, key: &K, value: &V) -> usize {
        self(key, value)
    }
}

/// Default estimator: a fixed cost per entry derived from the type sizes.
#[derive(Debug)]
pub struct FixedEntryCost<K, V> {
    _marker: PhantomData<fn(&K, &V)>,
}

impl<K, V> FixedEntryCost<K, V> {
    /// Bytes charged for every entry.
    pub const BYTES: usize = mem::size_of::<K>() + mem::size_of::<V>() + ENTRY_OVERHEAD_BYTES;

    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<K, V> Default for FixedEntryCost<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> SizeEstimator<K, V> for FixedEntryCost<K, V> {
    #[inline]
    fn estimate(&self, _key: &K, _value: &V) -> usize {
        Self::BYTES
    }
}

/// Running total of estimated bytes held by a store.
///
/// Replacements add the new estimate before subtracting the old one, so the
/// total never wraps below zero under concurrent updates.
#[derive(Debug, Default)]
pub struct RamTracker {
    bytes: AtomicU64,
}

impl RamTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current total.
    #[inline]
    pub fn total(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }

    /// Adds `bytes` and returns the new total.
    #[inline]
    pub fn add(&self, bytes: usize) -> u64 {
        let bytes = bytes as u64;
        self.bytes.fetch_add(bytes, Ordering::Relaxed) + bytes
    }

    /// Subtracts `bytes`, saturating at zero.
    #[inline]
    pub fn sub(&self, bytes: usize) {
        let bytes = bytes as u64;
        let _ = self
            .bytes
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                Some(current.saturating_sub(bytes))
            });
    }

    /// Records a replacement of an `old` estimate by a `new` one and returns
    /// the resulting total.
    #[inline]
    pub fn replace(&self, old: usize, new: usize) -> u64 {
        self.add(new);
        self.sub(old);
        self.total()
    }

    #[inline]
    pub fn reset(&self) {
        self.bytes.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_cost_includes_type_sizes_and_overhead() {
        let est = FixedEntryCost::<u64, u32>::new();
        assert_eq!(est.estimate(&1, &2), 8 + 4 + ENTRY_OVERHEAD_BYTES);
    }

    #[test]
    fn closure_estimator() {
        let est = |key: &String, value: &Vec<u8>| key.len() + value.len();
        assert_eq!(est.estimate(&"abc".to_string(), &vec![0; 10]), 13);
    }

    #[test]
    fn tracker_add_sub_replace() {
        let tracker = RamTracker::new();
        assert_eq!(tracker.add(100), 100);
        assert_eq!(tracker.add(50), 150);
        assert_eq!(tracker.replace(50, 20), 120);
        tracker.sub(20);
        assert_eq!(tracker.total(), 100);
    }

    #[test]
    fn tracker_sub_saturates() {
        let tracker = RamTracker::new();
        tracker.add(10);
        tracker.sub(25);
        assert_eq!(tracker.total(), 0);
    }

    #[test]
    fn tracker_reset() {
        let tracker = RamTracker::new();
        tracker.add(4096);
        tracker.reset();
        assert_eq!(tracker.total(), 0);
    }
}
