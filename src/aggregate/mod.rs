//! Windowed decay aggregation
//!
//! Watermark tracking, tumbling window assignment and the decay fold that
//! turns a window's ticks into one [`AggregateRecord`].

mod decay;
mod types;
mod watermark;
mod window;

pub use decay::{DecayAggregator, DecayedQuote};
pub use types::{AggregateRecord, AggregationError, FoldOrder, WindowId};
pub use watermark::WatermarkTracker;
pub use window::WindowAssigner;
