//! Tumbling window assignment

use super::types::{AggregationError, WindowId};
use crate::feed::Tick;

/// Maps ticks to fixed-length, non-overlapping event-time windows
#[derive(Debug, Clone, Copy)]
pub struct WindowAssigner {
    sample_period: i64,
}

impl WindowAssigner {
    /// Create an assigner for windows of `sample_period` milliseconds
    pub fn new(sample_period: i64) -> Result<Self, AggregationError> {
        if sample_period <= 0 {
            return Err(AggregationError::NonPositiveSamplePeriod(sample_period));
        }
        Ok(Self { sample_period })
    }

    /// Window length in milliseconds
    pub fn sample_period(&self) -> i64 {
        self.sample_period
    }

    /// Start of the window containing `event_time`
    ///
    /// `None` when the window boundary is not representable in `i64`.
    pub fn window_start(&self, event_time: i64) -> Option<i64> {
        // Floor division so that negative times land in the window below.
        event_time
            .div_euclid(self.sample_period)
            .checked_mul(self.sample_period)
    }

    /// End of the window starting at `start`
    pub fn window_end(&self, start: i64) -> Option<i64> {
        start.checked_add(self.sample_period)
    }

    /// Assign a tick to its window, or `None` if its bounds overflow
    pub fn assign(&self, tick: &Tick) -> Option<WindowId> {
        let start = self.window_start(tick.event_time)?;
        let end = self.window_end(start)?;
        Some(WindowId {
            symbol: tick.symbol.clone(),
            start,
            end,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_positive_period() {
        assert_eq!(
            WindowAssigner::new(0).unwrap_err(),
            AggregationError::NonPositiveSamplePeriod(0)
        );
        assert!(WindowAssigner::new(-5).is_err());
    }

    #[test]
    fn test_assign_aligns_to_period() {
        let assigner = WindowAssigner::new(1000).unwrap();
        let id = assigner.assign(&Tick::new("BTCUSDT", 1_234, 1.0, 2.0)).unwrap();
        assert_eq!(id.symbol, "BTCUSDT");
        assert_eq!(id.start, 1_000);
        assert_eq!(id.end, 2_000);
    }

    #[test]
    fn test_boundary_belongs_to_next_window() {
        let assigner = WindowAssigner::new(1000).unwrap();
        assert_eq!(assigner.window_start(999), Some(0));
        assert_eq!(assigner.window_start(1000), Some(1000));
    }

    #[test]
    fn test_negative_event_time() {
        let assigner = WindowAssigner::new(1000).unwrap();
        assert_eq!(assigner.window_start(-1), Some(-1000));
        assert_eq!(assigner.window_start(-1000), Some(-1000));
    }

    #[test]
    fn test_every_tick_has_exactly_one_window() {
        let assigner = WindowAssigner::new(250).unwrap();
        for t in -1_000..1_000 {
            let id = assigner.assign(&Tick::new("ETHUSDT", t, 0.0, 0.0)).unwrap();
            assert!(id.start <= t && t < id.end);
            assert_eq!(id.end - id.start, 250);
        }
    }

    #[test]
    fn test_symbol_is_part_of_id() {
        let assigner = WindowAssigner::new(1000).unwrap();
        let a = assigner.assign(&Tick::new("A", 10, 0.0, 0.0)).unwrap();
        let b = assigner.assign(&Tick::new("B", 10, 0.0, 0.0)).unwrap();
        assert_eq!(a.start, b.start);
        assert_ne!(a, b);
    }

    #[test]
    fn test_extreme_event_times_have_no_window() {
        let assigner = WindowAssigner::new(1000).unwrap();
        assert!(assigner.assign(&Tick::new("A", i64::MAX, 0.0, 0.0)).is_none());
        assert!(assigner.assign(&Tick::new("A", i64::MIN, 0.0, 0.0)).is_none());

        let last = assigner.assign(&Tick::new("A", i64::MAX - 1_000_000, 0.0, 0.0));
        assert!(last.is_some());
    }
}
