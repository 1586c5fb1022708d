//! Collector configuration: thresholds, ratios, and the worker tick period.

use std::time::Duration;

/// Default young-generation byte threshold (4 MiB).
pub const DEFAULT_YOUNG_THRESHOLD: usize = 4 * 1024 * 1024;
/// Default old-generation byte threshold (16 MiB).
pub const DEFAULT_OLD_THRESHOLD: usize = 16 * 1024 * 1024;
/// Default young-generation occupancy ratio that triggers a minor cycle.
pub const DEFAULT_YOUNG_RATIO: f64 = 0.6;
/// Default old-generation occupancy ratio that triggers a major cycle.
pub const DEFAULT_OLD_RATIO: f64 = 0.8;
/// Default wall-clock interval between background worker wake-ups.
pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_millis(1000);

/// Policy knobs consulted by [`crate::scheduler::Scheduler::maybe_autocollect`].
///
/// Ratios are accepted unchecked: an out-of-range value just makes the
/// policy degenerate to "always collect" or "never collect", which is
/// harmless since nothing here is safety-critical.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    /// Byte threshold used in the young-generation fullness check.
    pub young_threshold: usize,
    /// Byte threshold used in the old-generation fullness check.
    pub old_threshold: usize,
    /// Occupancy ratio applied to `young_threshold`.
    pub young_ratio: f64,
    /// Occupancy ratio applied to `old_threshold`.
    pub old_ratio: f64,
    /// Interval between background worker wake-ups.
    pub tick_period: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            young_threshold: DEFAULT_YOUNG_THRESHOLD,
            old_threshold: DEFAULT_OLD_THRESHOLD,
            young_ratio: DEFAULT_YOUNG_RATIO,
            old_ratio: DEFAULT_OLD_RATIO,
            tick_period: DEFAULT_TICK_PERIOD,
        }
    }
}
