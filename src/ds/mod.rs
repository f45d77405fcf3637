//! Low-level building blocks shared by the store and eviction layers.

pub mod shard;

pub use shard::ShardSelector;
