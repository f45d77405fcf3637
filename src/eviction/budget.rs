//! Eviction budgets and watermark derivation.
//!
//! A generation runs under exactly one [`Budget`]:
//!
//! ```text
//!   Budget::Count                           Budget::Ram
//!   ─────────────                           ───────────
//!   size() > max        ──► cleanup         ram > max_bytes        ──► cleanup
//!   evict LRU until size() <= acceptable    evict LRU until ram <= lower_watermark
//!
//!   defaults (max = 1024):                  defaults (max_ram_mb = 64):
//!     min        = ⌊0.9  × max⌋ = 921         max_bytes = 64 MiB
//!     acceptable = ⌊0.95 × max⌋ = 972         lower     = round(0.8 × max_bytes)
//!     initial    = max
//! ```
//!
//! The gap between the trigger and the target is the hysteresis that keeps a
//! full cache from running a cleanup pass on every put.

use crate::error::ConfigError;

const MIN_SIZE_RATIO: f64 = 0.9;
const ACCEPTABLE_SIZE_RATIO: f64 = 0.95;
const RAM_LOWER_WATERMARK_RATIO: f64 = 0.8;

/// Bytes per megabyte for `max_ram_mb`.
pub const MB: u64 = 1024 * 1024;

/// Default `max_size` when none is configured.
pub const DEFAULT_MAX_SIZE: usize = 1024;

/// Entry-count watermarks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountBudget {
    /// Upper watermark: a put that leaves more entries than this triggers cleanup.
    pub max: usize,
    /// Lower watermark.
    pub min: usize,
    /// Cleanup target: a pass stops once `size() <= acceptable`.
    pub acceptable: usize,
    /// Pre-allocation hint for the entry store.
    pub initial: usize,
}

impl CountBudget {
    /// Derives every watermark from `max` with the default ratios.
    ///
    /// ```
    /// use gencache::eviction::CountBudget;
    ///
    /// let budget = CountBudget::derive(1024).unwrap();
    /// assert_eq!(budget.min, 921);
    /// assert_eq!(budget.acceptable, 972);
    /// assert_eq!(budget.initial, 1024);
    /// ```
    pub fn derive(max: usize) -> Result<Self, ConfigError> {
        Self::resolve(max, None, None, None)
    }

    /// Resolves explicitly configured watermarks, filling the rest with
    /// defaults.
    ///
    /// `min` is clamped to at least 1 and kept strictly below `max`: when the
    /// two collide, `min = max - 1` if `max > 1`, otherwise `max = min + 1`.
    /// `acceptable` is clamped into `[min, max]`.
    pub fn resolve(
        max: usize,
        min: Option<usize>,
        acceptable: Option<usize>,
        initial: Option<usize>,
    ) -> Result<Self, ConfigError> {
        if max < 1 {
            return Err(ConfigError::new(format!(
                "invalid max_size {max}: must be >= 1"
            )));
        }
        let mut max = max;
        let mut min = min.unwrap_or_else(|| scaled(max, MIN_SIZE_RATIO));
        adjust_limits(&mut max, &mut min)?;

        let acceptable = acceptable
            .unwrap_or_else(|| scaled(max, ACCEPTABLE_SIZE_RATIO))
            .clamp(min, max);

        Ok(Self {
            max,
            min,
            acceptable,
            initial: initial.unwrap_or(max),
        })
    }

    /// Re-derives the watermarks for a new `max`, keeping the allocation hint.
    pub fn with_max(&self, max: usize) -> Result<Self, ConfigError> {
        Self::resolve(max, None, None, Some(self.initial))
    }
}

/// RAM-byte watermarks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RamBudget {
    /// Upper watermark in bytes.
    pub max_bytes: u64,
    /// Cleanup target in bytes.
    pub lower_watermark_bytes: u64,
}

impl RamBudget {
    /// Builds a RAM budget of `max_ram_mb` megabytes.
    ///
    /// ```
    /// use gencache::eviction::RamBudget;
    ///
    /// let budget = RamBudget::from_megabytes(10).unwrap();
    /// assert_eq!(budget.max_bytes, 10 * 1024 * 1024);
    /// assert_eq!(budget.lower_watermark_bytes, 8_388_608);
    /// ```
    pub fn from_megabytes(max_ram_mb: u64) -> Result<Self, ConfigError> {
        if max_ram_mb == 0 {
            return Err(ConfigError::new("invalid max_ram_mb 0: must be >= 1"));
        }
        let max_bytes = max_ram_mb
            .checked_mul(MB)
            .ok_or_else(|| ConfigError::new(format!("max_ram_mb {max_ram_mb} overflows")))?;
        Ok(Self::from_bytes(max_bytes))
    }

    /// Builds a RAM budget from a byte limit.
    pub fn from_bytes(max_bytes: u64) -> Self {
        Self {
            max_bytes,
            lower_watermark_bytes: (max_bytes as f64 * RAM_LOWER_WATERMARK_RATIO).round() as u64,
        }
    }

    /// The configured limit in whole megabytes.
    pub fn max_ram_mb(&self) -> u64 {
        self.max_bytes / MB
    }
}

/// The active eviction budget of a generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Budget {
    Count(CountBudget),
    Ram(RamBudget),
}

impl Budget {
    /// `true` if `(entries, ram_bytes)` is above the upper watermark.
    #[inline]
    pub fn is_exceeded(&self, entries: usize, ram_bytes: u64) -> bool {
        match self {
            Budget::Count(count) => entries > count.max,
            Budget::Ram(ram) => ram_bytes > ram.max_bytes,
        }
    }

    /// Amount that must be evicted to get back to the cleanup target:
    /// entries for a count budget, bytes for a RAM budget.
    #[inline]
    pub fn excess(&self, entries: usize, ram_bytes: u64) -> u64 {
        match self {
            Budget::Count(count) => entries.saturating_sub(count.acceptable) as u64,
            Budget::Ram(ram) => ram_bytes.saturating_sub(ram.lower_watermark_bytes),
        }
    }

    pub fn is_ram(&self) -> bool {
        matches!(self, Budget::Ram(_))
    }
}

fn scaled(max: usize, ratio: f64) -> usize {
    (max as f64 * ratio) as usize
}

fn adjust_limits(max: &mut usize, min: &mut usize) -> Result<(), ConfigError> {
    if *min == 0 {
        *min = 1;
    }
    if *max <= *min {
        if *max > 1 {
            *min = *max - 1;
        } else {
            *max = min.checked_add(1).ok_or_else(|| {
                ConfigError::new(format!(
                    "invalid min_size {min}: max_size cannot be raised above it"
                ))
            })?;
        }
    }
    Ok(())
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Resolved watermarks always satisfy 1 <= min < max and
        /// min <= acceptable.
        #[cfg_attr(miri, ignore)]
        #[test]
        fn prop_watermarks_are_ordered(
            max in 1usize..100_000,
            min in prop::option::of(0usize..200_000),
            acceptable in prop::option::of(0usize..200_000),
        ) {
            let budget = CountBudget::resolve(max, min, acceptable, None).unwrap();
            prop_assert!(budget.min >= 1);
            prop_assert!(budget.min < budget.max);
            prop_assert!(budget.acceptable >= budget.min);
            prop_assert!(budget.acceptable <= budget.max);
        }
    }
}
