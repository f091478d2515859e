//! Cache statistics
//!
//! Counters are advisory: they inform cache tuning, nothing correctness-
//! critical reads them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::document::DocumentKind;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStatistics {
    pub document_count: usize,
    pub analysis_count: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    /// Sum of all stored ciphertext lengths
    pub total_bytes: u64,
    /// hits / (hits + misses), 0.0 before any lookup
    pub hit_rate: f64,
    pub last_cleanup: Option<DateTime<Utc>>,
    /// Up to three document kinds with the highest access counts
    pub most_accessed_kinds: Vec<DocumentKind>,
}

pub(crate) fn hit_rate(hits: u64, misses: u64) -> f64 {
    let total = hits + misses;
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate() {
        assert_eq!(hit_rate(0, 0), 0.0);
        assert_eq!(hit_rate(3, 1), 0.75);
        assert_eq!(hit_rate(0, 5), 0.0);
    }
}
