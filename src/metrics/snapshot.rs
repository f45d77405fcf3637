use std::time::Duration;

use crate::metrics::stats::StatsSnapshot;

/// Everything a metrics sink reads from one generation.
///
/// The plain fields describe the generation itself; the `cumulative_*`
/// fields cover every generation of the slot, closed ones included.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CacheMetricsSnapshot {
    pub lookups: u64,
    pub hits: u64,
    pub hit_ratio: f64,
    pub inserts: u64,
    pub evictions: u64,
    pub size: u64,

    pub cleanup_thread: bool,
    pub ram_bytes_used: u64,
    pub max_size: usize,
    /// `None` when the generation runs under an entry-count budget.
    pub max_ram_mb: Option<u64>,
    pub warmup_time: Duration,

    pub cumulative_lookups: u64,
    pub cumulative_hits: u64,
    pub cumulative_hit_ratio: f64,
    pub cumulative_inserts: u64,
    pub cumulative_evictions: u64,

    /// Most recently accessed items as `("item_<key>", "<value>")`, most
    /// recent first. Only filled for detailed snapshots.
    pub items: Vec<(String, String)>,
}

impl CacheMetricsSnapshot {
    /// Fills the counter fields from a generation's own counters and the
    /// slot-wide aggregate.
    pub fn with_counters(mut self, current: &StatsSnapshot, cumulative: &StatsSnapshot) -> Self {
        self.lookups = current.lookups;
        self.hits = current.hits;
        self.hit_ratio = current.hit_ratio();
        self.inserts = current.puts;
        self.evictions = current.evictions;
        self.size = current.current_size;

        self.cumulative_lookups = cumulative.lookups;
        self.cumulative_hits = cumulative.hits;
        self.cumulative_hit_ratio = cumulative.hit_ratio();
        self.cumulative_inserts = cumulative.puts;
        self.cumulative_evictions = cumulative.evictions;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_counters_maps_fields() {
        let current = StatsSnapshot {
            lookups: 10,
            hits: 3,
            puts: 7,
            non_live_puts: 2,
            evictions: 1,
            current_size: 6,
        };
        let cumulative = StatsSnapshot {
            lookups: 40,
            hits: 10,
            puts: 30,
            non_live_puts: 2,
            evictions: 5,
            current_size: 6,
        };
        let snap = CacheMetricsSnapshot::default().with_counters(&current, &cumulative);
        assert_eq!(snap.lookups, 10);
        assert!((snap.hit_ratio - 0.3).abs() < f64::EPSILON);
        assert_eq!(snap.inserts, 7);
        assert_eq!(snap.size, 6);
        assert_eq!(snap.cumulative_lookups, 40);
        assert!((snap.cumulative_hit_ratio - 0.25).abs() < f64::EPSILON);
        assert_eq!(snap.cumulative_inserts, 30);
        assert_eq!(snap.cumulative_evictions, 5);
        assert!(snap.items.is_empty());
    }
}
