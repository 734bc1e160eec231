//! Per-tier counters reported by `/stats/:group`.

use serde::Serialize;

/// Snapshot of one cache tier.
///
/// `hits`, `misses`, `evictions` and `expirations` only ever grow.
/// `total_entries`, `size_bytes` and `capacity_bytes` are filled in when the
/// snapshot is taken.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Entries dropped to stay within the byte budget
    pub evictions: u64,
    /// Entries dropped because their TTL elapsed, on read or by the sweep
    pub expirations: u64,
    pub total_entries: usize,
    pub size_bytes: usize,
    /// 0 when the tier is unbounded
    pub capacity_bytes: usize,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads answered by this tier, hit or miss.
    pub fn lookups(&self) -> u64 {
        self.hits + self.misses
    }

    /// Fraction of lookups that hit, 0.0 before the first lookup.
    pub fn hit_rate(&self) -> f64 {
        match self.lookups() {
            0 => 0.0,
            lookups => self.hits as f64 / lookups as f64,
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_evictions(&mut self, count: usize) {
        self.evictions += count as u64;
    }

    pub fn record_expirations(&mut self, count: usize) {
        self.expirations += count as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate_before_any_lookup() {
        let stats = CacheStats::new();
        assert_eq!(stats.lookups(), 0);
        assert_eq!(stats.hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate_counts_hits_over_lookups() {
        let mut stats = CacheStats::new();
        stats.record_hit();
        stats.record_hit();
        stats.record_hit();
        stats.record_miss();

        assert_eq!(stats.lookups(), 4);
        assert_eq!(stats.hit_rate(), 0.75);
    }

    #[test]
    fn test_batch_counters() {
        let mut stats = CacheStats::new();
        stats.record_evictions(2);
        stats.record_evictions(0);
        stats.record_expirations(3);

        assert_eq!(stats.evictions, 2);
        assert_eq!(stats.expirations, 3);
    }

    #[test]
    fn test_serialized_field_names() {
        let json = serde_json::to_value(CacheStats::new()).unwrap();
        for field in ["hits", "misses", "evictions", "expirations", "total_entries", "size_bytes", "capacity_bytes"] {
            assert!(json.get(field).is_some(), "missing {}", field);
        }
    }
}
