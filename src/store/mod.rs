//! Entry storage: the sharded recency store and RAM accounting.

pub mod recency;
pub mod weight;

pub use recency::{Candidate, PutOutcome, RecencyStore, Usage};
pub use weight::{FixedEntryCost, RamTracker, SizeEstimator};
