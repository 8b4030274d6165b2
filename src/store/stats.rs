//! Record store operation counters.

use std::fmt;

/// Counters for the operations a [`RecordStore`](super::RecordStore) has
/// performed since it was opened.
///
/// # Example
/// ```
/// use slotdb::StoreStats;
///
/// let stats = StoreStats {
///     updates_in_place: 3,
///     relocations: 1,
///     ..StoreStats::default()
/// };
/// assert_eq!(stats.updates(), 4);
/// assert_eq!(stats.relocation_rate(), 0.25);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Records appended by insert or bulk load.
    pub inserts: u64,
    /// Updates that overwrote their slot.
    pub updates_in_place: u64,
    /// Updates that outgrew their slot and moved to end-of-file.
    pub relocations: u64,
    /// Records tombstoned by delete.
    pub deletes: u64,
}

impl StoreStats {
    pub fn updates(&self) -> u64 {
        self.updates_in_place + self.relocations
    }

    /// Fraction of updates that relocated (0.0 to 1.0).
    ///
    /// Every relocation leaves a dead slot behind, so this tracks how fast
    /// the heap file accumulates garbage under updates.
    pub fn relocation_rate(&self) -> f64 {
        let total = self.updates();
        if total == 0 {
            0.0
        } else {
            self.relocations as f64 / total as f64
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

impl fmt::Display for StoreStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Stats {{ inserts: {}, updates: {} ({} in place, {} relocated), deletes: {}, relocation_rate: {:.2}% }}",
            self.inserts,
            self.updates(),
            self.updates_in_place,
            self.relocations,
            self.deletes,
            self.relocation_rate() * 100.0
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let stats = StoreStats::default();
        assert_eq!(stats.updates(), 0);
        assert_eq!(stats.relocation_rate(), 0.0);
    }

    #[test]
    fn test_reset() {
        let mut stats = StoreStats {
            inserts: 5,
            deletes: 2,
            ..StoreStats::default()
        };
        stats.reset();
        assert_eq!(stats, StoreStats::default());
    }

    #[test]
    fn test_display() {
        let stats = StoreStats {
            inserts: 10,
            updates_in_place: 3,
            relocations: 1,
            deletes: 2,
        };
        let display = format!("{}", stats);

        assert!(display.contains("inserts: 10"));
        assert!(display.contains("updates: 4 (3 in place, 1 relocated)"));
        assert!(display.contains("25.00%"));
    }
}
