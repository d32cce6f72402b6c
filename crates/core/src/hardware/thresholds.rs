//! Busy heuristic for GPU scheduling decisions.
//!
//! A device is considered busy when its utilization is above
//! `utilization_percent` or its memory use is above `memory_percent` of
//! its total memory. The defaults (50% / 80%) are a rule of thumb, not a
//! guarantee that new work will fit.

use serde::{Deserialize, Serialize};

/// Default utilization threshold above which a GPU counts as busy.
pub const DEFAULT_BUSY_UTILIZATION_PERCENT: u32 = 50;

/// Default memory-use threshold (percent of total) above which a GPU counts as busy.
pub const DEFAULT_BUSY_MEMORY_PERCENT: u32 = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusyThresholds {
    pub utilization_percent: u32,
    pub memory_percent: u32,
}

impl Default for BusyThresholds {
    fn default() -> Self {
        Self {
            utilization_percent: DEFAULT_BUSY_UTILIZATION_PERCENT,
            memory_percent: DEFAULT_BUSY_MEMORY_PERCENT,
        }
    }
}

impl BusyThresholds {
    /// Both comparisons are strict: sitting exactly on a threshold is not busy.
    pub fn is_busy(&self, memory_used_mb: u64, memory_total_mb: u64, utilization_percent: u32) -> bool {
        let over_utilization = utilization_percent > self.utilization_percent;
        // Integer form of `used > total * pct / 100`.
        let over_memory = u128::from(memory_used_mb) * 100
            > u128::from(memory_total_mb) * u128::from(self.memory_percent);
        over_utilization || over_memory
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn high_utilization_is_busy() {
        assert!(BusyThresholds::default().is_busy(20_000, 32_000, 65));
    }

    #[test]
    fn idle_device_is_free() {
        assert!(!BusyThresholds::default().is_busy(1_000, 24_000, 5));
    }

    #[test]
    fn high_memory_alone_is_busy() {
        // 20_000 / 24_000 = 83%
        assert!(BusyThresholds::default().is_busy(20_000, 24_000, 0));
    }

    #[test]
    fn exact_thresholds_are_not_busy() {
        let t = BusyThresholds::default();
        assert!(!t.is_busy(0, 24_000, 50));
        assert!(!t.is_busy(8_000, 10_000, 0));
    }

    #[test]
    fn custom_thresholds_apply() {
        let t = BusyThresholds {
            utilization_percent: 90,
            memory_percent: 95,
        };
        assert!(!t.is_busy(20_000, 24_000, 65));
        assert!(t.is_busy(23_000, 24_000, 10));
    }

    #[test]
    fn zero_total_memory_with_usage_is_busy() {
        assert!(BusyThresholds::default().is_busy(1, 0, 0));
        assert!(!BusyThresholds::default().is_busy(0, 0, 0));
    }
}
