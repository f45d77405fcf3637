//! gencache: a concurrent, bounded, generation-scoped LRU cache.
//!
//! A [`Generation`](generation::Generation) holds entries in a sharded
//! recency store, evicts least recently used entries against an entry-count
//! or RAM budget (inline or on a cleanup thread), and counts lookups, hits,
//! puts and evictions into statistics shared by every generation of the same
//! cache slot. A new generation can be warmed from its predecessor through a
//! [`CacheRegenerator`](warm::CacheRegenerator).
//!
//! See `DESIGN.md` for internal architecture and decisions.

pub mod config;
pub mod ds;
pub mod error;
pub mod eviction;
pub mod generation;
pub mod metrics;
pub mod prelude;
pub mod store;
pub mod warm;
