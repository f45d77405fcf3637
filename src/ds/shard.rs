//! Key-to-shard mapping for the sharded entry store.
//!
//! ## Architecture
//!
//! ```text
//!   Input Key
//!       │
//!       ▼
//!   ┌───────────────────────────────────────────────┐
//!   │  ShardSelector { mask: 0b111 }                │
//!   │                                               │
//!   │  1. FxHasher::default()                       │
//!   │  2. key.hash(&mut hasher)                     │
//!   │  3. mix high bits into low bits               │
//!   │  4. index = mixed & mask                      │
//!   └───────────────────────────────────────────────┘
//!       │
//!       ▼
//!   Shard Index in [0, 8)
//! ```
//!
//! The shard count is always a power of two so the index is a mask instead
//! of a modulo. FxHash leaves weak entropy in the low bits for small integer
//! keys, so the high half of the hash is folded in before masking.
//!
//! ## Example Usage
//!
//! ```
//! use gencache::ds::ShardSelector;
//!
//! let selector = ShardSelector::new(6);
//! // Rounded up to the next power of two
//! assert_eq!(selector.shard_count(), 8);
//!
//! let shard = selector.shard_for_key(&"query:title:rust");
//! assert!(shard < 8);
//! assert_eq!(selector.shard_for_key(&"query:title:rust"), shard);
//! ```

use std::hash::{Hash, Hasher};

use rustc_hash::FxHasher;

/// Upper bound on the number of shards a selector will create.
pub const MAX_SHARDS: usize = 1024;

/// Deterministic shard selector over a power-of-two shard count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardSelector {
    mask: usize,
}

impl ShardSelector {
    /// Creates a selector for at least `shards` shards.
    ///
    /// The count is clamped to `[1, MAX_SHARDS]` and rounded up to the next
    /// power of two.
    ///
    /// ```
    /// use gencache::ds::ShardSelector;
    ///
    /// assert_eq!(ShardSelector::new(0).shard_count(), 1);
    /// assert_eq!(ShardSelector::new(16).shard_count(), 16);
    /// ```
    pub fn new(shards: usize) -> Self {
        let count = shards.clamp(1, MAX_SHARDS).next_power_of_two();
        Self { mask: count - 1 }
    }

    /// Creates a selector sized for the machine's available parallelism.
    ///
    /// Uses four shards per hardware thread to keep lock contention low
    /// under many concurrent readers.
    pub fn for_available_parallelism() -> Self {
        let threads = std::thread::available_parallelism()
            .map(|count| count.get())
            .unwrap_or(1);
        Self::new(threads.saturating_mul(4))
    }

    /// Returns the number of shards.
    #[inline]
    pub fn shard_count(&self) -> usize {
        self.mask + 1
    }

    /// Maps a key to a shard index in `[0, shard_count)`.
    #[inline]
    pub fn shard_for_key<K: Hash + ?Sized>(&self, key: &K) -> usize {
        let mut hasher = FxHasher::default();
        key.hash(&mut hasher);
        let hash = hasher.finish();
        ((hash ^ (hash >> 32)) as usize) & self.mask
    }
}

impl Default for ShardSelector {
    fn default() -> Self {
        Self::for_available_parallelism()
    }
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Shard index is always in range and deterministic.
        #[cfg_attr(miri, ignore)]
        #[test]
        fn prop_shard_in_range_and_stable(shards in 1usize..200, key in any::<u64>()) {
            let selector = ShardSelector::new(shards);
            let idx = selector.shard_for_key(&key);
            prop_assert!(idx < selector.shard_count());
            prop_assert_eq!(idx, selector.shard_for_key(&key));
        }
    }
}
