//! Exponential time-decay aggregation
//!
//! Folds the ticks of one window into a decayed running sum of bid and ask
//! prices and keeps the maximum each sum reaches:
//!
//! ```text
//! factor   = 2 ^ ((prev.event_time - cur.event_time) / half_life)
//! sum_ask  = sum_ask * factor + cur.ask_price
//! sum_bid  = sum_bid * factor + cur.bid_price
//! best_ask = max(best_ask, sum_ask)
//! best_bid = max(best_bid, sum_bid)
//! ```
//!
//! The first tick only seeds the time reference. The exponent is kept exactly
//! as written: a pair whose event times go backwards (possible because buffers
//! keep arrival order) yields a factor above one.

use super::types::{AggregationError, FoldOrder};
use crate::feed::Tick;

/// Decayed best bid/ask of one window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecayedQuote {
    pub best_bid: f64,
    pub best_ask: f64,
}

/// Computes the decayed maxima over an ordered tick sequence
#[derive(Debug, Clone, Copy)]
pub struct DecayAggregator {
    half_life: f64,
    fold_order: FoldOrder,
}

impl DecayAggregator {
    /// Create an aggregator; `half_life` is in milliseconds and must be positive
    pub fn new(half_life: i64, fold_order: FoldOrder) -> Result<Self, AggregationError> {
        if half_life <= 0 {
            return Err(AggregationError::NonPositiveHalfLife(half_life));
        }
        Ok(Self {
            half_life: half_life as f64,
            fold_order,
        })
    }

    /// Configured fold order
    pub fn fold_order(&self) -> FoldOrder {
        self.fold_order
    }

    /// Aggregate a window's buffer, honouring the configured fold order
    ///
    /// Returns `None` for an empty buffer.
    pub fn aggregate(&self, ticks: &[Tick]) -> Option<DecayedQuote> {
        match self.fold_order {
            FoldOrder::Arrival => self.fold(ticks.iter()),
            FoldOrder::EventTime => {
                let mut sorted: Vec<&Tick> = ticks.iter().collect();
                sorted.sort_by_key(|t| t.event_time);
                self.fold(sorted.into_iter())
            }
        }
    }

    fn fold<'a>(&self, mut ticks: impl Iterator<Item = &'a Tick>) -> Option<DecayedQuote> {
        let mut prev = ticks.next()?;

        let mut sum_bid = 0.0_f64;
        let mut sum_ask = 0.0_f64;
        let mut best_bid = 0.0_f64;
        let mut best_ask = 0.0_f64;

        for cur in ticks {
            let factor = self.decay_factor(prev.event_time, cur.event_time);
            sum_ask = sum_ask * factor + cur.ask_price;
            sum_bid = sum_bid * factor + cur.bid_price;
            best_ask = best_ask.max(sum_ask);
            best_bid = best_bid.max(sum_bid);
            prev = cur;
        }

        Some(DecayedQuote { best_bid, best_ask })
    }

    /// `2 ^ ((prev - cur) / half_life)`
    pub fn decay_factor(&self, prev_time: i64, cur_time: i64) -> f64 {
        let delta = (prev_time - cur_time) as f64;
        (delta / self.half_life).exp2()
    }
}
