//! Pipeline module
//!
//! Window lifecycle, the async source-to-sink loop and checkpoints.

mod checkpoint;
mod driver;
mod runner;

pub use checkpoint::{
    CheckpointError, CheckpointStore, DriverSnapshot, PartitionSnapshot, WindowSnapshot,
};
pub use driver::{DriverStats, PipelineDriver};
pub use runner::{Pipeline, PipelineReport, StopReason};
