//! Event-time watermark under bounded lateness

/// Tracks `max_seen - allowed_lateness` for one partition
///
/// Before the first observation the watermark sits at `i64::MIN`, the
/// "unbounded past". It only ever moves forward: an out-of-order tick can
/// not pull the maximum back.
#[derive(Debug, Clone)]
pub struct WatermarkTracker {
    allowed_lateness: i64,
    max_seen: Option<i64>,
}

impl WatermarkTracker {
    /// Create a tracker; `allowed_lateness` is in milliseconds
    pub fn new(allowed_lateness: i64) -> Self {
        Self {
            allowed_lateness,
            max_seen: None,
        }
    }

    /// Rebuild a tracker from a previously observed maximum
    pub fn with_max_seen(allowed_lateness: i64, max_seen: Option<i64>) -> Self {
        Self {
            allowed_lateness,
            max_seen,
        }
    }

    /// Observe an event time and return the (possibly advanced) watermark
    pub fn observe(&mut self, event_time: i64) -> i64 {
        self.max_seen = Some(match self.max_seen {
            Some(max) => max.max(event_time),
            None => event_time,
        });
        self.current()
    }

    /// Current watermark
    pub fn current(&self) -> i64 {
        match self.max_seen {
            Some(max) => max.saturating_sub(self.allowed_lateness),
            None => i64::MIN,
        }
    }

    /// Whether an event time is behind the current watermark
    pub fn is_late(&self, event_time: i64) -> bool {
        event_time < self.current()
    }

    /// Largest event time observed so far
    pub fn max_seen(&self) -> Option<i64> {
        self.max_seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_watermark_is_unbounded_past() {
        let tracker = WatermarkTracker::new(3000);
        assert_eq!(tracker.current(), i64::MIN);
        assert!(tracker.max_seen().is_none());
        assert!(!tracker.is_late(i64::MIN));
    }

    #[test]
    fn test_watermark_trails_max_by_lateness() {
        let mut tracker = WatermarkTracker::new(3000);
        assert_eq!(tracker.observe(10_000), 7_000);
        assert_eq!(tracker.observe(12_500), 9_500);
    }

    #[test]
    fn test_watermark_never_decreases() {
        let mut tracker = WatermarkTracker::new(3000);
        let times = [5_000, 9_000, 2_000, 8_999, 9_000, 15_000, 1_000, 14_000];
        let mut max = i64::MIN;
        let mut previous = i64::MIN;

        for t in times {
            max = max.max(t);
            let w = tracker.observe(t);
            assert_eq!(w, max - 3000);
            assert!(w >= previous);
            previous = w;
        }
    }

    #[test]
    fn test_late_tick_detection() {
        let mut tracker = WatermarkTracker::new(1000);
        tracker.observe(10_000);
        assert!(tracker.is_late(8_999));
        assert!(!tracker.is_late(9_000));
        assert!(!tracker.is_late(9_500));
    }

    #[test]
    fn test_zero_lateness() {
        let mut tracker = WatermarkTracker::new(0);
        assert_eq!(tracker.observe(42), 42);
    }

    #[test]
    fn test_with_max_seen_restores_state() {
        let tracker = WatermarkTracker::with_max_seen(500, Some(2_000));
        assert_eq!(tracker.current(), 1_500);
        assert_eq!(tracker.max_seen(), Some(2_000));
    }

    #[test]
    fn test_saturating_near_min() {
        let mut tracker = WatermarkTracker::new(3000);
        assert_eq!(tracker.observe(i64::MIN + 10), i64::MIN);
    }
}
