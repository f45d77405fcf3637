//! Eviction controller: budgets, watermarks and single-flight cleanup.

pub mod budget;
pub mod controller;
pub mod worker;

pub use budget::{Budget, CountBudget, RamBudget};
pub use controller::{CleanupMode, CleanupReport, CleanupToken, EvictionController};
pub use worker::CleanupWorker;
